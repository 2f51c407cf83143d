use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, ApifyConfig};
use harvest_core::compose::compose;
use harvest_core::domain::harvest::{ErrorKind, HarvestResponse, Source};
use harvest_core::error::CoreError;
use harvest_core::mock::mock_result;
use harvest_core::normalize::{normalize_meta, normalize_thread};
use harvest_core::types::post_url::PostUrl;
use harvest_infra::apify::{ApifyClient, ApifyError, ScrapeSettings, ScrapeTarget};
use harvest_infra::graph::{GraphClient, GraphError};
use harvest_infra::transport::Transport;

#[derive(Debug, Clone, Default)]
pub struct HarvestRequest {
    pub post_url: Option<String>,
    pub account_id: Option<String>,
    pub access_token: Option<String>,
    pub mock: bool,
}

/// Where a request's comments come from, decided once up front.
#[derive(Debug, Clone)]
pub enum DataSource {
    Authenticated {
        post: PostUrl,
        account_id: String,
        access_token: String,
    },
    Scraped {
        post: PostUrl,
        settings: ScrapeSettings,
    },
    Mock,
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("{0}")]
    MalformedInput(String),
    #[error("{0}")]
    MissingCredentials(String),
    #[error("{0}")]
    Configuration(String),
    #[error("post {0} not found in the account's recent media")]
    NotFound(String),
    #[error("access token rejected: {message}")]
    TokenExpired {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },
    #[error("upstream failure: {message}")]
    Upstream {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },
}

impl HarvestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarvestError::MalformedInput(_) => ErrorKind::MalformedInput,
            HarvestError::MissingCredentials(_) | HarvestError::Configuration(_) => {
                ErrorKind::ConfigurationError
            }
            HarvestError::NotFound(_) => ErrorKind::NotFound,
            HarvestError::TokenExpired { .. } => ErrorKind::TokenExpired,
            HarvestError::Upstream { .. } => ErrorKind::UpstreamFailure,
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            HarvestError::TokenExpired { status, .. } | HarvestError::Upstream { status, .. } => {
                *status
            }
            _ => None,
        }
    }

    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            HarvestError::TokenExpired { body, .. } | HarvestError::Upstream { body, .. } => {
                body.as_deref()
            }
            _ => None,
        }
    }
}

impl From<CoreError> for HarvestError {
    fn from(err: CoreError) -> Self {
        HarvestError::MalformedInput(err.to_string())
    }
}

impl From<GraphError> for HarvestError {
    fn from(err: GraphError) -> Self {
        let status = err.status();
        let body = err.body().map(str::to_string);
        if err.is_auth_failure() {
            return HarvestError::TokenExpired {
                message: err.to_string(),
                status,
                body,
            };
        }
        HarvestError::Upstream {
            message: err.to_string(),
            status,
            body,
        }
    }
}

impl From<ApifyError> for HarvestError {
    fn from(err: ApifyError) -> Self {
        HarvestError::Upstream {
            message: err.to_string(),
            status: err.status(),
            body: err.body().map(str::to_string),
        }
    }
}

pub fn select_source(
    request: &HarvestRequest,
    config: &AppConfig,
) -> Result<DataSource, HarvestError> {
    if request.mock || config.mock {
        return Ok(DataSource::Mock);
    }
    let post = PostUrl::parse(request.post_url.as_deref().unwrap_or_default())?;
    let account_id = non_blank(request.account_id.as_deref());
    let access_token = non_blank(request.access_token.as_deref());
    match (account_id, access_token) {
        (Some(account_id), Some(access_token)) => Ok(DataSource::Authenticated {
            post,
            account_id,
            access_token,
        }),
        (Some(_), None) => Err(HarvestError::MissingCredentials(
            "access_token is required with account_id".to_string(),
        )),
        (None, Some(_)) => Err(HarvestError::MissingCredentials(
            "account_id is required with access_token".to_string(),
        )),
        (None, None) => Ok(DataSource::Scraped {
            post,
            settings: scrape_settings(&config.apify)?,
        }),
    }
}

/// Harvests one post. Each call is independent: nothing is cached between
/// calls and no upstream call is retried.
pub async fn run<T: Transport>(
    transport: T,
    config: &AppConfig,
    request: HarvestRequest,
) -> Result<HarvestResponse, HarvestError> {
    match select_source(&request, config)? {
        DataSource::Mock => {
            info!("mock mode, skipping upstream calls");
            Ok(HarvestResponse::new(mock_result(), Source::Mock))
        }
        DataSource::Authenticated {
            post,
            account_id,
            access_token,
        } => {
            let client = GraphClient::new(
                transport,
                config.graph_base_url.clone(),
                config.page_limits,
            );
            harvest_authenticated(&client, &post, &account_id, &access_token).await
        }
        DataSource::Scraped { post, settings } => {
            let client = ApifyClient::new(transport, settings);
            harvest_scraped(&client, &post).await
        }
    }
}

async fn harvest_authenticated<T: Transport>(
    client: &GraphClient<T>,
    post: &PostUrl,
    account_id: &str,
    access_token: &str,
) -> Result<HarvestResponse, HarvestError> {
    info!(shortcode = post.shortcode(), "resolving media");
    let media = client
        .resolve_media(account_id, access_token, post)
        .await?
        .ok_or_else(|| HarvestError::NotFound(post.shortcode().to_string()))?;
    let harvest = client.harvest_comments(&media.media_id, access_token).await?;
    let owner = match client.fetch_profile(account_id, access_token).await {
        Ok(profile) => Some(profile),
        Err(err) => {
            warn!(error = %err, "owner profile unavailable");
            None
        }
    };
    let post_meta = media.post_meta(owner.as_ref());
    let result = compose(harvest.comments, post_meta);
    Ok(HarvestResponse::new(result, Source::Authenticated)
        .with_media(media.media_id, media.media_type))
}

async fn harvest_scraped<T: Transport>(
    client: &ApifyClient<T>,
    post: &PostUrl,
) -> Result<HarvestResponse, HarvestError> {
    let dataset = client.scrape_and_fetch(post.as_str()).await?;
    let comments = normalize_thread(&dataset.raw_comments);
    let post_meta = dataset
        .raw_post
        .as_ref()
        .map(normalize_meta)
        .unwrap_or_default();
    info!(
        raw = dataset.raw_comments.len(),
        count = comments.len(),
        "scraped comments normalized"
    );
    Ok(HarvestResponse::new(
        compose(comments, post_meta),
        Source::Scraped,
    ))
}

fn scrape_settings(config: &ApifyConfig) -> Result<ScrapeSettings, HarvestError> {
    let token = config.token.clone().ok_or_else(|| {
        HarvestError::Configuration("HARVEST_APIFY_TOKEN is not configured".to_string())
    })?;
    let target = ScrapeTarget::from_config(config.task_id.as_deref(), config.actor.as_deref())
        .ok_or_else(|| {
            HarvestError::Configuration(
                "HARVEST_APIFY_ACTOR or HARVEST_APIFY_TASK_ID is required".to_string(),
            )
        })?;
    Ok(ScrapeSettings {
        base_url: config.base_url.clone(),
        token,
        target,
        wait_secs: config.wait_secs,
        results_limit: config.results_limit,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;
    use harvest_infra::transport::{RawResponse, TransportError, UpstreamRequest};

    const POST_URL: &str = "https://www.instagram.com/p/Giveaway1/";

    #[derive(Default)]
    struct Replay {
        responses: Mutex<VecDeque<RawResponse>>,
        urls: Mutex<Vec<String>>,
    }

    impl Replay {
        fn new(responses: Vec<Value>) -> Self {
            Self::with_raw(
                responses
                    .into_iter()
                    .map(|body| RawResponse::new(200, body.to_string()))
                    .collect(),
            )
        }

        fn with_raw(responses: Vec<RawResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl Transport for Replay {
        async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, TransportError> {
            self.urls.lock().unwrap().push(request.url);
            let next = self.responses.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| RawResponse::new(599, "unexpected call")))
        }
    }

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn scrape_config() -> AppConfig {
        config(&[
            ("HARVEST_APIFY_TOKEN", "apify-token"),
            ("HARVEST_APIFY_ACTOR", "apify/instagram-comment-scraper"),
            ("HARVEST_APIFY_BASE_URL", "https://apify.test/v2"),
        ])
    }

    fn auth_request() -> HarvestRequest {
        HarvestRequest {
            post_url: Some(POST_URL.to_string()),
            account_id: Some("1784".to_string()),
            access_token: Some("token".to_string()),
            mock: false,
        }
    }

    fn media_page() -> Value {
        json!({
            "data": [{
                "id": "media-1",
                "permalink": POST_URL,
                "caption": "Win a prize!",
                "timestamp": "2024-03-01T12:00:00+0000",
                "media_url": "https://cdn/post.jpg",
                "media_type": "IMAGE"
            }]
        })
    }

    #[test]
    fn mock_flag_wins_over_everything() {
        let request = HarvestRequest {
            mock: true,
            ..auth_request()
        };
        assert!(matches!(
            select_source(&request, &config(&[])),
            Ok(DataSource::Mock)
        ));
        let forced = config(&[("HARVEST_MOCK", "1")]);
        assert!(matches!(
            select_source(&HarvestRequest::default(), &forced),
            Ok(DataSource::Mock)
        ));
    }

    #[test]
    fn credentials_select_authenticated_source() {
        let source = select_source(&auth_request(), &config(&[])).unwrap();
        let DataSource::Authenticated { post, account_id, .. } = source else {
            panic!("expected authenticated source");
        };
        assert_eq!(post.shortcode(), "Giveaway1");
        assert_eq!(account_id, "1784");
    }

    #[test]
    fn partial_credentials_are_rejected() {
        let request = HarvestRequest {
            access_token: Some("  ".to_string()),
            ..auth_request()
        };
        let err = select_source(&request, &scrape_config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn scrape_source_requires_apify_config() {
        let request = HarvestRequest {
            post_url: Some(POST_URL.to_string()),
            ..HarvestRequest::default()
        };
        let err = select_source(&request, &config(&[])).unwrap_err();
        assert!(matches!(err, HarvestError::Configuration(_)));
        assert!(matches!(
            select_source(&request, &scrape_config()),
            Ok(DataSource::Scraped { .. })
        ));
    }

    #[test]
    fn malformed_url_is_reported() {
        let request = HarvestRequest {
            post_url: Some("https://example.com/nothing".to_string()),
            ..auth_request()
        };
        let err = select_source(&request, &config(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        let missing = select_source(&HarvestRequest::default(), &scrape_config()).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MalformedInput);
    }

    #[tokio::test]
    async fn mock_mode_makes_no_upstream_calls() {
        let transport = Replay::default();
        let request = HarvestRequest {
            mock: true,
            ..HarvestRequest::default()
        };
        let response = run(&transport, &config(&[]), request).await.unwrap();
        assert!(!response.result.comments.is_empty());
        assert!(response.result.post.caption.is_some());
        assert_eq!(response.meta.source, Source::Mock);
        assert!(transport.urls().is_empty());
    }

    #[tokio::test]
    async fn authenticated_harvest_end_to_end() {
        let transport = Replay::new(vec![
            media_page(),
            json!({
                "data": [{
                    "id": "c1",
                    "username": "fan",
                    "text": "me!",
                    "timestamp": "2024-03-01T12:05:00+0000",
                    "replies": {"data": [
                        {"id": "c1r1", "username": "brand", "text": "good luck", "timestamp": "2024-03-01T12:06:00+0000"},
                        {"id": "c1r2", "username": "fan2", "text": "+1", "timestamp": "2024-03-01T12:07:00+0000"}
                    ]}
                }]
            }),
            json!({"id": "1784", "username": "brand", "profile_picture_url": "https://cdn/brand.jpg"}),
        ]);
        let response = run(&transport, &config(&[]), auth_request()).await.unwrap();
        let ids: Vec<&str> = response
            .result
            .comments
            .iter()
            .map(|comment| comment.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c1r1", "c1r2"]);
        assert_eq!(response.result.post.caption.as_deref(), Some("Win a prize!"));
        assert_eq!(response.result.post.image_url.as_deref(), Some("https://cdn/post.jpg"));
        assert_eq!(response.result.post.owner_username.as_deref(), Some("brand"));
        assert_eq!(response.meta.source, Source::Authenticated);
        assert_eq!(response.meta.total_comments, 3);
        assert_eq!(response.meta.media_id.as_deref(), Some("media-1"));
        assert_eq!(response.meta.media_type.as_deref(), Some("IMAGE"));
        assert_eq!(
            transport.urls(),
            vec![
                "https://graph.facebook.com/v21.0/1784/media".to_string(),
                "https://graph.facebook.com/v21.0/media-1/comments".to_string(),
                "https://graph.facebook.com/v21.0/1784".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_profile_does_not_fail_harvest() {
        let transport = Replay::with_raw(vec![
            RawResponse::new(200, media_page().to_string()),
            RawResponse::new(200, json!({"data": []}).to_string()),
            RawResponse::new(500, "profile down"),
        ]);
        let response = run(&transport, &config(&[]), auth_request()).await.unwrap();
        assert!(response.result.comments.is_empty());
        assert_eq!(response.result.post.owner_username, None);
        assert_eq!(response.result.post.owner_avatar_url, None);
    }

    #[tokio::test]
    async fn unmatched_post_is_not_found() {
        let transport = Replay::new(vec![json!({
            "data": [{"id": "other", "permalink": "https://www.instagram.com/p/Other/"}]
        })]);
        let err = run(&transport, &config(&[]), auth_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn rejected_token_is_reported_as_expired() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;
        let transport = Replay::with_raw(vec![RawResponse::new(400, body)]);
        let err = run(&transport, &config(&[]), auth_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenExpired);
        assert_eq!(err.upstream_status(), Some(400));
        assert_eq!(err.upstream_body(), Some(body));
    }

    #[tokio::test]
    async fn scraped_harvest_end_to_end() {
        let transport = Replay::new(vec![
            json!({"data": {"id": "run1", "status": "SUCCEEDED", "defaultDatasetId": "ds1"}}),
            json!([{
                "shortCode": "Giveaway1",
                "postCaption": "SORTEO",
                "displayUrl": "https://cdn/scraped.jpg",
                "ownerUsername": "brand",
                "latestComments": [
                    {"id": "s1", "ownerUsername": "fan", "text": "yo", "timestamp": 1_700_000_000,
                     "ownerProfilePicUrl": "https://cdn/fan.jpg",
                     "replies": [{"id": "s1r1", "owner": {"username": "fan2"}, "text": "gl"}]},
                    {"text": "no author"},
                    {"id": "s2", "ownerUsername": "brand", "ownerProfilePicUrl": "https://cdn/brand.jpg", "text": "thanks"}
                ]
            }]),
        ]);
        let request = HarvestRequest {
            post_url: Some(POST_URL.to_string()),
            ..HarvestRequest::default()
        };
        let response = run(&transport, &scrape_config(), request).await.unwrap();
        let comments = &response.result.comments;
        let ids: Vec<&str> = comments.iter().map(|comment| comment.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s1r1", "s2"]);
        assert_eq!(comments[0].timestamp, "2023-11-14T22:13:20.000Z");
        assert_eq!(comments[0].avatar_url.as_deref(), Some("https://cdn/fan.jpg"));
        assert_eq!(comments[1].username, "fan2");
        assert_eq!(response.result.post.caption.as_deref(), Some("SORTEO"));
        assert_eq!(
            response.result.post.owner_avatar_url.as_deref(),
            Some("https://cdn/brand.jpg")
        );
        assert_eq!(response.meta.source, Source::Scraped);
        assert_eq!(
            transport.urls(),
            vec![
                "https://apify.test/v2/acts/apify~instagram-comment-scraper/runs".to_string(),
                "https://apify.test/v2/datasets/ds1/items".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn scrape_failure_carries_upstream_detail() {
        let transport = Replay::with_raw(vec![RawResponse::new(401, "bad token")]);
        let request = HarvestRequest {
            post_url: Some(POST_URL.to_string()),
            ..HarvestRequest::default()
        };
        let err = run(&transport, &scrape_config(), request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
        assert_eq!(err.upstream_status(), Some(401));
        assert_eq!(err.upstream_body(), Some("bad token"));
    }
}
