use crate::domain::comments::{Comment, PostMeta};
use crate::domain::harvest::{HarvestMeta, HarvestResponse, HarvestResult, Source};
use crate::normalize::disambiguate_synthetic_ids;

/// Assembles the single output contract shared by every data source.
/// Comments normalized page by page may repeat synthetic ids across pages,
/// so ids are made unique over the whole harvest here.
pub fn compose(mut comments: Vec<Comment>, post: PostMeta) -> HarvestResult {
    disambiguate_synthetic_ids(&mut comments);
    HarvestResult { comments, post }
}

impl HarvestResponse {
    pub fn new(result: HarvestResult, source: Source) -> Self {
        let total_comments = result.comments.len();
        Self {
            result,
            meta: HarvestMeta {
                source,
                total_comments,
                media_id: None,
                media_type: None,
            },
        }
    }

    pub fn with_media(mut self, media_id: impl Into<String>, media_type: Option<String>) -> Self {
        self.meta.media_id = Some(media_id.into());
        self.meta.media_type = media_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            username: format!("user_{id}"),
            text: "hi".to_string(),
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            avatar_url: None,
        }
    }

    #[test]
    fn compose_preserves_comment_order() {
        let result = compose(vec![comment("b"), comment("a")], PostMeta::default());
        let ids: Vec<&str> = result.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn compose_keeps_synthetic_ids_unique() {
        let anonymous = |id: &str| Comment {
            id: id.to_string(),
            ..comment("x")
        };
        let result = compose(
            vec![anonymous("anon-aa"), anonymous("anon-aa-2"), anonymous("anon-aa"), anonymous("anon-aa-2")],
            PostMeta::default(),
        );
        let ids: Vec<&str> = result.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["anon-aa", "anon-aa-2", "anon-aa-3", "anon-aa-2-2"]);
    }

    #[test]
    fn response_serializes_flat_contract() {
        let post = PostMeta {
            caption: Some("caption".to_string()),
            ..PostMeta::default()
        };
        let response = HarvestResponse::new(compose(vec![comment("1")], post), Source::Scraped);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "comments": [{
                    "id": "1",
                    "username": "user_1",
                    "text": "hi",
                    "timestamp": "2024-01-01T00:00:00.000Z",
                    "avatarUrl": null
                }],
                "post": {
                    "caption": "caption",
                    "imageUrl": null,
                    "ownerUsername": null,
                    "ownerAvatarUrl": null,
                    "createdAt": null
                },
                "meta": {"source": "scraped", "totalComments": 1}
            })
        );
    }

    #[test]
    fn media_details_are_reported_for_authenticated_source() {
        let response = HarvestResponse::new(compose(Vec::new(), PostMeta::default()), Source::Authenticated)
            .with_media("1789", Some("IMAGE".to_string()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["meta"]["source"], "authenticated");
        assert_eq!(value["meta"]["totalComments"], 0);
        assert_eq!(value["meta"]["mediaId"], "1789");
        assert_eq!(value["meta"]["mediaType"], "IMAGE");
    }
}
