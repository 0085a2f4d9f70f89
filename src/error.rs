#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid startup configuration.
    ///
    /// Fatal: construction refuses to proceed rather than fall back to a
    /// placeholder endpoint or key.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Structured rejection from the MID API.
    ///
    /// `message` is raw service text. It must pass through
    /// [`normalize`](crate::message::normalize) before reaching a user.
    #[error("{operation} failed: {message}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },
}
