use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

static RE_SHORTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"instagram\.com/(?:p|reel|tv)/([A-Za-z0-9_-]+)").expect("shortcode regex")
});

const PERMALINK_BASE: &str = "https://www.instagram.com";

/// A public post URL together with the shortcode embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUrl {
    url: String,
    shortcode: String,
}

impl PostUrl {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::MissingPostUrl);
        }
        let shortcode = RE_SHORTCODE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| CoreError::InvalidPostUrl(trimmed.to_string()))?;
        Ok(Self {
            url: trimmed.to_string(),
            shortcode,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn shortcode(&self) -> &str {
        &self.shortcode
    }

    /// Upstream permalinks are not perfectly predictable, so after the exact
    /// post and reel forms a plain `/{shortcode}/` containment check is used.
    pub fn matches_permalink(&self, permalink: &str) -> bool {
        if permalink.is_empty() {
            return false;
        }
        let post_form = format!("{PERMALINK_BASE}/p/{}/", self.shortcode);
        let reel_form = format!("{PERMALINK_BASE}/reel/{}/", self.shortcode);
        permalink == post_form
            || permalink == reel_form
            || permalink.contains(&format!("/{}/", self.shortcode))
    }
}
