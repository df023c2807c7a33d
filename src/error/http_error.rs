use thiserror::Error;

use crate::response::Response;

/// The original error raised by a backend, preserved for inspection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Ureq(Box<ureq::Error>),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        Self::Ureq(Box::new(e))
    }
}

/// Uniform wrapper around HTTP failures from any backend.
///
/// Transport failures keep the backend's own error as `source`; error
/// statuses with no registered handler carry the raw [`Response`] so
/// callers can still inspect headers and body.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with an error status and no handler was
    /// registered for it.
    #[error("HTTP status {status} returned for {url}")]
    Status {
        status: u16,
        url: String,
        response: Response,
    },

    /// The backend failed before or while reading a response.
    #[error("transport error: {source}")]
    Transport {
        #[source]
        source: TransportError,
        response: Option<Response>,
    },
}

impl HttpError {
    pub(crate) fn transport(source: impl Into<TransportError>) -> Self {
        Self::Transport {
            source: source.into(),
            response: None,
        }
    }

    /// The response status code, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { response, .. } => response.as_ref().map(Response::status),
        }
    }

    /// The raw response, when one was received.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Status { response, .. } => Some(response),
            Self::Transport { response, .. } => response.as_ref(),
        }
    }
}
