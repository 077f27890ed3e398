use thiserror::Error;

pub type Result<T> = std::result::Result<T, OandaError>;

pub const NO_STREAM_RESPONSE: &str = "request does not contain a stream response";

#[derive(Debug, Error)]
pub enum OandaError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stream terminated: {0}")]
    StreamTerminated(String),

    #[error("No Api token set for private api")]
    NoApiKeySet,

    #[error("Request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Cannot deserialize response from {0}")]
    CannotDeserializeResponse(String),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    UrlEncoding(#[from] serde_urlencoded::ser::Error),

    #[error(transparent)]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    HttpRequest(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OandaError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        OandaError::InvalidArgument(message.into())
    }

    pub(crate) fn no_stream_response() -> Self {
        OandaError::InvalidState(NO_STREAM_RESPONSE.to_string())
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, OandaError::StreamTerminated(_))
    }
}
