use serde::Serialize;

use crate::domain::comments::{Comment, PostMeta};

/// Comments keep upstream arrival order: each reply directly follows its
/// parent and nothing is re-sorted by time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestResult {
    pub comments: Vec<Comment>,
    pub post: PostMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Authenticated,
    Scraped,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestMeta {
    pub source: Source,
    pub total_comments: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestResponse {
    #[serde(flatten)]
    pub result: HarvestResult,
    pub meta: HarvestMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    UpstreamFailure,
    ConfigurationError,
    MalformedInput,
    TokenExpired,
}
