use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("missing post url")]
    MissingPostUrl,
    #[error("could not extract shortcode from url: {0}")]
    InvalidPostUrl(String),
}
