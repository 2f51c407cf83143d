use serde::{Deserialize, Serialize};

/// A single comment or reply, in the shape every ingestion path converges on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub username: String,
    pub text: String,
    pub timestamp: String,
    /// `None` tells the consumer to fall back to a local placeholder.
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMeta {
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub owner_username: Option<String>,
    pub owner_avatar_url: Option<String>,
    pub created_at: Option<String>,
}
