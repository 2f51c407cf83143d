use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input accepted by the Instagram comment/post scraper actors.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeInput {
    #[serde(rename = "directUrls")]
    pub direct_urls: Vec<String>,
    #[serde(rename = "postUrls")]
    pub post_urls: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfig {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
}

impl ScrapeInput {
    pub fn for_post(post_url: &str, results_limit: u32) -> Self {
        Self {
            direct_urls: vec![post_url.to_string()],
            post_urls: vec![post_url.to_string()],
            results_limit,
            proxy: ProxyConfig {
                use_apify_proxy: true,
            },
        }
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: Option<String>,
}

/// Raw dataset split into comment records and the row carrying post metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedDataset {
    pub raw_comments: Vec<Value>,
    pub raw_post: Option<Value>,
}

const POST_ROW_MARKERS: [&str; 4] = ["latestComments", "shortCode", "displayUrl", "commentsCount"];

/// Post metadata always rides on the first row. Post-scraper rows nest the
/// comments under `latestComments`; comment-scraper rows are comments.
pub fn split_dataset(items: Vec<Value>) -> ScrapedDataset {
    let Some(first) = items.first().cloned() else {
        return ScrapedDataset::default();
    };
    let is_post_row = POST_ROW_MARKERS.iter().any(|key| first.get(*key).is_some());
    let raw_comments = if is_post_row {
        first
            .get("latestComments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    } else {
        items
    };
    ScrapedDataset {
        raw_comments,
        raw_post: Some(first),
    }
}
