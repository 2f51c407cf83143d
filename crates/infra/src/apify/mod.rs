//! Apify scrape-job client used when no authenticated session is available.
//!
//! One synchronous run per request: submit the actor (or saved task) run
//! with a server-side wait budget, then pull the run's default dataset.
//! Neither phase is retried.

mod types;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::transport::{RawResponse, Transport, TransportError, UpstreamRequest};
use types::ApiResponse;

pub use types::{ProxyConfig, RunData, ScrapeInput, ScrapedDataset, split_dataset};

pub const DEFAULT_APIFY_BASE_URL: &str = "https://api.apify.com/v2";
pub const DEFAULT_WAIT_SECS: u64 = 50;
pub const DEFAULT_RESULTS_LIMIT: u32 = 300;

const RUN_SUCCEEDED: &str = "SUCCEEDED";
const RUN_TERMINAL_FAILURES: [&str; 3] = ["FAILED", "ABORTED", "TIMED-OUT"];

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("scrape run submission failed ({status}): {body}")]
    Submit { status: u16, body: String },
    #[error("scrape run finished with status {0}")]
    RunFailed(String),
    #[error("scrape run returned no dataset id")]
    MissingDataset,
    #[error("dataset retrieval failed ({status}): {body}")]
    Dataset { status: u16, body: String },
    #[error("invalid {0} payload: {1}")]
    InvalidResponse(&'static str, String),
}

impl ApifyError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApifyError::Submit { status, .. } | ApifyError::Dataset { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            ApifyError::Submit { body, .. } | ApifyError::Dataset { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// What to run. A saved task wins over a bare actor when both are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeTarget {
    Task(String),
    Actor(String),
}

impl ScrapeTarget {
    pub fn from_config(task_id: Option<&str>, actor: Option<&str>) -> Option<Self> {
        task_id
            .map(|id| ScrapeTarget::Task(id.to_string()))
            .or_else(|| actor.map(|id| ScrapeTarget::Actor(id.to_string())))
    }

    fn runs_path(&self) -> String {
        match self {
            ScrapeTarget::Task(id) => format!("actor-tasks/{}/runs", path_id(id)),
            ScrapeTarget::Actor(id) => format!("acts/{}/runs", path_id(id)),
        }
    }
}

/// Apify addresses `owner/name` ids as `owner~name` in URL paths.
fn path_id(id: &str) -> String {
    id.trim().replace('/', "~")
}

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: String,
    pub token: String,
    pub target: ScrapeTarget,
    pub wait_secs: u64,
    pub results_limit: u32,
}

#[derive(Debug, Clone)]
pub struct ApifyClient<T> {
    transport: T,
    settings: ScrapeSettings,
}

impl<T: Transport> ApifyClient<T> {
    pub fn new(transport: T, settings: ScrapeSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs the scrape job for `post_url` and returns its dataset split into
    /// comment records and the post metadata row.
    pub async fn scrape_and_fetch(&self, post_url: &str) -> Result<ScrapedDataset, ApifyError> {
        info!(scrape_target = ?self.settings.target, "starting scrape run");
        let run = self.run_sync(post_url).await?;
        let dataset_id = run
            .default_dataset_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ApifyError::MissingDataset)?;
        info!(run_id = %run.id, dataset_id = %dataset_id, "scrape run finished, fetching dataset");
        let items = self.dataset_items(&dataset_id).await?;
        info!(count = items.len(), "dataset items fetched");
        Ok(split_dataset(items))
    }

    async fn run_sync(&self, post_url: &str) -> Result<RunData, ApifyError> {
        let input = ScrapeInput::for_post(post_url, self.settings.results_limit);
        let body = serde_json::to_value(&input)
            .map_err(|err| ApifyError::InvalidResponse("scrape input", err.to_string()))?;
        let url = format!("{}/{}", self.base_url(), self.settings.target.runs_path());
        let request = UpstreamRequest::post_json(url, body)
            .query("waitForFinish", self.settings.wait_secs)
            .bearer(&self.settings.token);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "scrape run submission rejected");
            return Err(submit_error(response));
        }
        let run: ApiResponse<RunData> = response
            .json()
            .map_err(|err| ApifyError::InvalidResponse("run", err.to_string()))?;
        let run = run.data;
        if RUN_TERMINAL_FAILURES.contains(&run.status.as_str()) {
            return Err(ApifyError::RunFailed(run.status));
        }
        if run.status != RUN_SUCCEEDED {
            warn!(
                run_id = %run.id,
                status = %run.status,
                wait_secs = self.settings.wait_secs,
                "scrape run still in progress after wait budget, dataset may be partial"
            );
        }
        Ok(run)
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>, ApifyError> {
        let url = format!("{}/datasets/{dataset_id}/items", self.base_url());
        let request = UpstreamRequest::get(url)
            .query("clean", "true")
            .query("format", "json")
            .bearer(&self.settings.token);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(status = response.status, dataset_id, "dataset retrieval rejected");
            return Err(ApifyError::Dataset {
                status: response.status,
                body: response.body,
            });
        }
        response
            .json()
            .map_err(|err| ApifyError::InvalidResponse("dataset", err.to_string()))
    }

    fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }
}

fn submit_error(response: RawResponse) -> ApifyError {
    ApifyError::Submit {
        status: response.status,
        body: response.body,
    }
}
