use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url: {0}")]
    Url(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed event stream: {0}")]
    Protocol(String),
}
