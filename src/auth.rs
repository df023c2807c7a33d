//! Authentication applied during request assembly.
//!
//! Auth is resolved like any other metadata kind (per-call override, then
//! client, then group) and written into the request descriptor as headers
//! or query parameters, so both backends behave identically.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Credentials attached to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// HTTP Basic auth; becomes an `Authorization: Basic ...` header.
    Basic { username: String, password: String },
    /// Bearer token; becomes an `Authorization: Bearer ...` header.
    Bearer(String),
    /// An API key carried in a custom header.
    HeaderKey { header: String, key: String },
    /// An API key appended as a query parameter.
    QueryKey { param: String, key: String },
}

impl Auth {
    /// Convenience constructor for Basic auth.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Convenience constructor for a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// The header this auth contributes, if any.
    pub(crate) fn header(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                Some(("authorization", format!("Basic {encoded}")))
            }
            Self::Bearer(token) => Some(("authorization", format!("Bearer {token}"))),
            Self::HeaderKey { .. } | Self::QueryKey { .. } => None,
        }
    }

    /// The custom header pair this auth contributes, if any.
    pub(crate) fn custom_header(&self) -> Option<(&str, &str)> {
        match self {
            Self::HeaderKey { header, key } => Some((header.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// The query pair this auth contributes, if any.
    pub(crate) fn query(&self) -> Option<(&str, &str)> {
        match self {
            Self::QueryKey { param, key } => Some((param.as_str(), key.as_str())),
            _ => None,
        }
    }
}
