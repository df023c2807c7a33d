use thiserror::Error;

use crate::backend::BackendKind;

/// Errors caused by invalid declarations or invalid call arguments.
///
/// These indicate programming mistakes. They are raised either when an API
/// group is built or at the first dispatch that exposes the problem, and
/// are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("operation `{operation}` has no endpoint; declare one on the group or pass it to the client")]
    MissingEndpoint { operation: String },

    #[error("unknown backend `{0}`")]
    UnknownBackend(String),

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("duplicate operation `{operation}` in API group `{group}`")]
    DuplicateOperation { group: String, operation: String },

    #[error("operation name cannot be empty in API group `{group}`")]
    EmptyOperationName { group: String },

    #[error("path placeholder `{{{placeholder}}}` of `{operation}` has no bound argument")]
    MissingPathArgument {
        operation: String,
        placeholder: String,
    },

    #[error("malformed path template `{path}`: {reason}")]
    InvalidPathTemplate { path: String, reason: String },

    #[error("operation `{operation}` mixes a body with form or multipart bindings")]
    ConflictingBody { operation: String },

    #[error("invalid status code {0}; expected 100-599")]
    InvalidStatusCode(u16),

    #[error("invalid endpoint URL `{url}`: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("argument `{argument}` of `{operation}` cannot be rendered as text")]
    UnrenderableArgument {
        operation: String,
        argument: String,
    },

    #[error("backend `{backend}` does not support {capability}")]
    Unsupported {
        backend: BackendKind,
        capability: &'static str,
    },

    #[error("session uses backend `{session}` but the call requested `{requested}`")]
    SessionBackendMismatch {
        session: BackendKind,
        requested: BackendKind,
    },
}
