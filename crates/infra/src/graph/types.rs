use reqwest::Url;
use serde::Deserialize;

use harvest_core::domain::comments::PostMeta;

/// One page of a Graph API edge.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging {
    pub cursors: Option<Cursors>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Cursors {
    pub after: Option<String>,
}

impl<T> Page<T> {
    /// The `after` cursor, present only while the upstream advertises a next page.
    pub fn next_cursor(&self) -> Option<String> {
        let paging = self.paging.as_ref()?;
        let next = paging.next.as_deref().filter(|next| !next.is_empty())?;
        paging
            .cursors
            .as_ref()
            .and_then(|cursors| cursors.after.clone())
            .filter(|after| !after.is_empty())
            .or_else(|| after_param(next))
    }
}

/// Decoded `after` query value of a `paging.next` link.
fn after_param(next_url: &str) -> Option<String> {
    let url = Url::parse(next_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "after")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaNode {
    pub id: String,
    pub caption: Option<String>,
    pub timestamp: Option<String>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub permalink: Option<String>,
    pub media_type: Option<String>,
}

/// A post on the authenticated account, resolved fresh for every harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub media_id: String,
    pub permalink: Option<String>,
    pub caption: Option<String>,
    pub timestamp: Option<String>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub media_type: Option<String>,
}

impl From<MediaNode> for MediaRef {
    fn from(node: MediaNode) -> Self {
        Self {
            media_id: node.id,
            permalink: node.permalink,
            caption: node.caption,
            timestamp: node.timestamp,
            media_url: node.media_url,
            thumbnail_url: node.thumbnail_url,
            media_type: node.media_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnerProfile {
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl MediaRef {
    pub fn post_meta(&self, owner: Option<&OwnerProfile>) -> PostMeta {
        PostMeta {
            caption: non_empty(self.caption.as_deref()),
            image_url: non_empty(self.media_url.as_deref())
                .or_else(|| non_empty(self.thumbnail_url.as_deref())),
            owner_username: owner.and_then(|owner| non_empty(owner.username.as_deref())),
            owner_avatar_url: owner
                .and_then(|owner| non_empty(owner.profile_picture_url.as_deref())),
            created_at: non_empty(self.timestamp.as_deref()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}
