//! Instagram Graph API client: media resolution, comment harvesting and the
//! account owner's profile.

mod types;

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::{RawResponse, Transport, TransportError, UpstreamRequest};
use harvest_core::domain::comments::Comment;
use harvest_core::normalize::normalize_thread;
use harvest_core::types::post_url::PostUrl;
use types::{MediaNode, Page};

pub use types::{MediaRef, OwnerProfile};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v21.0";
pub const MEDIA_PAGE_SIZE: usize = 50;
/// 20 pages of 50 covers the most recent ~1000 posts of an account.
pub const MEDIA_MAX_PAGES: usize = 20;
pub const COMMENT_PAGE_SIZE: usize = 50;
/// 400 pages of 50 caps a single harvest at ~20,000 comments.
pub const COMMENT_MAX_PAGES: usize = 400;

const MEDIA_FIELDS: &str = "id,caption,timestamp,media_url,thumbnail_url,permalink,media_type";
const COMMENT_FIELDS: &str = "id,text,timestamp,username,replies{id,text,timestamp,username}";
const PROFILE_FIELDS: &str = "id,username,profile_picture_url";
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
const AUTH_FAILURE_MARKERS: [&str; 2] = ["OAuthException", "Invalid OAuth"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStage {
    MediaList,
    Comments,
    Profile,
}

impl fmt::Display for GraphStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GraphStage::MediaList => "media list",
            GraphStage::Comments => "comments fetch",
            GraphStage::Profile => "profile fetch",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("{stage} failed ({status}): {body}")]
    Upstream {
        stage: GraphStage,
        status: u16,
        body: String,
    },
    #[error("invalid {stage} payload: {message}")]
    InvalidResponse { stage: GraphStage, message: String },
}

impl GraphError {
    fn upstream(stage: GraphStage, response: RawResponse) -> Self {
        GraphError::Upstream {
            stage,
            status: response.status,
            body: response.body,
        }
    }

    /// True when the upstream rejected the access token itself.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            GraphError::Upstream { body, .. } => {
                AUTH_FAILURE_MARKERS.iter().any(|marker| body.contains(marker))
            }
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            GraphError::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub media_page_size: usize,
    pub media_max_pages: usize,
    pub comment_page_size: usize,
    pub comment_max_pages: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            media_page_size: MEDIA_PAGE_SIZE,
            media_max_pages: MEDIA_MAX_PAGES,
            comment_page_size: COMMENT_PAGE_SIZE,
            comment_max_pages: COMMENT_MAX_PAGES,
        }
    }
}

/// Why comment pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStop {
    /// The upstream advertised no further page.
    Exhausted,
    /// HTTP 429; everything collected so far is returned as a partial result.
    RateLimited,
    PageCeiling,
}

#[derive(Debug, Clone)]
pub struct CommentHarvest {
    pub comments: Vec<Comment>,
    pub pages: usize,
    pub stop: HarvestStop,
}

#[derive(Debug, Clone)]
pub struct GraphClient<T> {
    transport: T,
    base_url: String,
    limits: PageLimits,
}

impl<T: Transport> GraphClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, limits: PageLimits) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limits,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Walks the account's media, newest first, until a permalink matches the
    /// post. Gives up with `None` once the page ceiling is reached. Any
    /// failing page aborts the walk, since a skipped page could hide the match.
    pub async fn resolve_media(
        &self,
        account_id: &str,
        access_token: &str,
        post: &PostUrl,
    ) -> Result<Option<MediaRef>, GraphError> {
        let url = self.edge_url(account_id, "media");
        let mut after: Option<String> = None;
        for page_number in 1..=self.limits.media_max_pages {
            let request = page_request(
                &url,
                MEDIA_FIELDS,
                self.limits.media_page_size,
                access_token,
                after.as_deref(),
            );
            let response = self.transport.send(request).await?;
            if !response.is_success() {
                return Err(GraphError::upstream(GraphStage::MediaList, response));
            }
            let page: Page<MediaNode> = parse(GraphStage::MediaList, &response)?;
            debug!(
                page = page_number,
                items = page.data.len(),
                shortcode = post.shortcode(),
                "media page fetched"
            );
            let next = page.next_cursor();
            let found = page.data.into_iter().find(|media| {
                media
                    .permalink
                    .as_deref()
                    .is_some_and(|permalink| post.matches_permalink(permalink))
            });
            if let Some(media) = found {
                info!(media_id = %media.id, page = page_number, "media resolved");
                return Ok(Some(media.into()));
            }
            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        info!(shortcode = post.shortcode(), "media not found within search window");
        Ok(None)
    }

    /// Pages through a media's comments, emitting each reply right after its
    /// parent. A 429 ends the walk with a partial, successful result.
    pub async fn harvest_comments(
        &self,
        media_id: &str,
        access_token: &str,
    ) -> Result<CommentHarvest, GraphError> {
        let url = self.edge_url(media_id, "comments");
        let mut comments = Vec::new();
        let mut after: Option<String> = None;
        let mut pages = 0;
        let stop = loop {
            if pages >= self.limits.comment_max_pages {
                warn!(media_id, pages, "comment page ceiling reached");
                break HarvestStop::PageCeiling;
            }
            debug!(media_id, page = pages + 1, "fetching comments page");
            let request = page_request(
                &url,
                COMMENT_FIELDS,
                self.limits.comment_page_size,
                access_token,
                after.as_deref(),
            );
            let response = self.transport.send(request).await?;
            if response.status == STATUS_TOO_MANY_REQUESTS {
                warn!(
                    media_id,
                    pages,
                    collected = comments.len(),
                    "rate limit hit, returning partial comments"
                );
                break HarvestStop::RateLimited;
            }
            if !response.is_success() {
                return Err(GraphError::upstream(GraphStage::Comments, response));
            }
            let page: Page<Value> = parse(GraphStage::Comments, &response)?;
            pages += 1;
            comments.extend(normalize_thread(&page.data));
            match page.next_cursor() {
                Some(cursor) => after = Some(cursor),
                None => break HarvestStop::Exhausted,
            }
        };
        info!(media_id, count = comments.len(), pages, ?stop, "comments harvested");
        Ok(CommentHarvest {
            comments,
            pages,
            stop,
        })
    }

    pub async fn fetch_profile(
        &self,
        account_id: &str,
        access_token: &str,
    ) -> Result<OwnerProfile, GraphError> {
        let request = UpstreamRequest::get(format!("{}/{account_id}", self.base_url))
            .query("fields", PROFILE_FIELDS)
            .query("access_token", access_token);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(GraphError::upstream(GraphStage::Profile, response));
        }
        parse(GraphStage::Profile, &response)
    }

    fn edge_url(&self, node_id: &str, edge: &str) -> String {
        format!("{}/{node_id}/{edge}", self.base_url)
    }
}

fn page_request(
    url: &str,
    fields: &str,
    limit: usize,
    access_token: &str,
    after: Option<&str>,
) -> UpstreamRequest {
    let request = UpstreamRequest::get(url)
        .query("fields", fields)
        .query("limit", limit)
        .query("access_token", access_token);
    match after {
        Some(cursor) => request.query("after", cursor),
        None => request,
    }
}

fn parse<D: DeserializeOwned>(stage: GraphStage, response: &RawResponse) -> Result<D, GraphError> {
    response.json().map_err(|err| GraphError::InvalidResponse {
        stage,
        message: err.to_string(),
    })
}
