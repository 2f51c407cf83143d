use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use harvest_infra::apify::{DEFAULT_APIFY_BASE_URL, DEFAULT_RESULTS_LIMIT, DEFAULT_WAIT_SECS};
use harvest_infra::graph::{
    COMMENT_MAX_PAGES, COMMENT_PAGE_SIZE, DEFAULT_GRAPH_BASE_URL, MEDIA_MAX_PAGES,
    MEDIA_PAGE_SIZE, PageLimits,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub request_timeout: Duration,
    pub graph_base_url: String,
    pub page_limits: PageLimits,
    pub apify: ApifyConfig,
    pub mock: bool,
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ApifyConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub actor: Option<String>,
    pub task_id: Option<String>,
    pub wait_secs: u64,
    pub results_limit: u32,
}

impl ApifyConfig {
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && (self.actor.is_some() || self.task_id.is_some())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidSocket(String),
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let http_addr_raw = env.string("HARVEST_HTTP_ADDR", "127.0.0.1:8080");
        let http_addr = http_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidSocket(http_addr_raw.clone()))?;
        let request_timeout_secs = env.number("HARVEST_REQUEST_TIMEOUT_SECS", 90u64)?;
        let wait_secs = env.number("HARVEST_APIFY_WAIT_SECS", DEFAULT_WAIT_SECS)?;
        if request_timeout_secs <= wait_secs {
            return Err(ConfigError::InvalidValue(
                "HARVEST_REQUEST_TIMEOUT_SECS",
                format!("{request_timeout_secs} must exceed the scrape wait of {wait_secs}"),
            ));
        }
        let page_limits = PageLimits {
            media_page_size: env.positive("HARVEST_MEDIA_PAGE_SIZE", MEDIA_PAGE_SIZE)?,
            media_max_pages: env.positive("HARVEST_MEDIA_MAX_PAGES", MEDIA_MAX_PAGES)?,
            comment_page_size: env.positive("HARVEST_COMMENT_PAGE_SIZE", COMMENT_PAGE_SIZE)?,
            comment_max_pages: env.positive("HARVEST_COMMENT_MAX_PAGES", COMMENT_MAX_PAGES)?,
        };
        let apify = ApifyConfig {
            base_url: env.string("HARVEST_APIFY_BASE_URL", DEFAULT_APIFY_BASE_URL),
            token: env.optional("HARVEST_APIFY_TOKEN"),
            actor: env.optional("HARVEST_APIFY_ACTOR"),
            task_id: env.optional("HARVEST_APIFY_TASK_ID"),
            wait_secs,
            results_limit: env.number("HARVEST_APIFY_RESULTS_LIMIT", DEFAULT_RESULTS_LIMIT)?,
        };
        let cors_allow_origins = env
            .optional("HARVEST_CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            http_addr,
            request_timeout: Duration::from_secs(request_timeout_secs),
            graph_base_url: env.string("HARVEST_GRAPH_BASE_URL", DEFAULT_GRAPH_BASE_URL),
            page_limits,
            apify,
            mock: env.optional("HARVEST_MOCK").is_some_and(|value| is_truthy(&value)),
            cors_allow_origins,
        })
    }
}

pub fn is_truthy(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed == "1" || trimmed.eq_ignore_ascii_case("true")
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &'static str, default: &'static str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        let value = (self.lookup)(key)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn number<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(key, raw)),
            None => Ok(default),
        }
    }

    fn positive(&self, key: &'static str, default: usize) -> Result<usize, ConfigError> {
        let value = self.number(key, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidValue(key, "must be at least 1".to_string()));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.graph_base_url, DEFAULT_GRAPH_BASE_URL);
        assert_eq!(config.page_limits, PageLimits::default());
        assert_eq!(config.apify.wait_secs, 50);
        assert_eq!(config.apify.results_limit, 300);
        assert!(!config.apify.is_configured());
        assert!(!config.mock);
        assert!(config.cors_allow_origins.is_empty());
    }

    #[test]
    fn apify_requires_token_and_target() {
        let config = config_from(&[("HARVEST_APIFY_TOKEN", "t")]).unwrap();
        assert!(!config.apify.is_configured());
        let config = config_from(&[("HARVEST_APIFY_TOKEN", "t"), ("HARVEST_APIFY_TASK_ID", "task")])
            .unwrap();
        assert!(config.apify.is_configured());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("HARVEST_APIFY_TOKEN", "   "), ("HARVEST_MOCK", "")]).unwrap();
        assert_eq!(config.apify.token, None);
        assert!(!config.mock);
    }

    #[test]
    fn mock_flag_and_cors_list() {
        let config = config_from(&[
            ("HARVEST_MOCK", "TRUE"),
            ("HARVEST_CORS_ALLOW_ORIGINS", "https://a.example, ,https://b.example"),
        ])
        .unwrap();
        assert!(config.mock);
        assert_eq!(
            config.cors_allow_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("HARVEST_HTTP_ADDR", "nope")]),
            Err(ConfigError::InvalidSocket(_))
        ));
        assert!(matches!(
            config_from(&[("HARVEST_COMMENT_MAX_PAGES", "many")]),
            Err(ConfigError::InvalidNumber("HARVEST_COMMENT_MAX_PAGES", _))
        ));
        assert!(matches!(
            config_from(&[("HARVEST_MEDIA_MAX_PAGES", "0")]),
            Err(ConfigError::InvalidValue("HARVEST_MEDIA_MAX_PAGES", _))
        ));
        assert!(matches!(
            config_from(&[("HARVEST_REQUEST_TIMEOUT_SECS", "30")]),
            Err(ConfigError::InvalidValue("HARVEST_REQUEST_TIMEOUT_SECS", _))
        ));
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" true "));
        assert!(is_truthy("True"));
        assert!(!is_truthy("yes"));
        assert!(!is_truthy("0"));
    }
}
