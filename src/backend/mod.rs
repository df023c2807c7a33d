//! Backend adapters wrapping the supported HTTP transport libraries.
//!
//! Each adapter exposes the same small capability set: perform a one-shot
//! request and act as a reusable session. Capabilities a backend lacks
//! (asynchronous dispatch, multipart encoding) are reported as
//! [`ConfigError::Unsupported`](crate::ConfigError::Unsupported) before any
//! I/O happens, never silently downgraded.

mod reqwest;
mod ureq;

pub(crate) use self::reqwest::{ReqwestAsyncTransport, ReqwestTransport};
pub(crate) use self::ureq::UreqTransport;

use strum::{Display, EnumIter, EnumString};

/// Identifier of an HTTP transport backend.
///
/// Parses from the lowercase crate name, so configuration values read
/// naturally:
///
/// ```rust
/// use declarest::BackendKind;
///
/// let kind: BackendKind = "reqwest".parse().unwrap();
/// assert!(kind.supports_async());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// The `ureq` agent; synchronous only. The default.
    #[default]
    Ureq,
    /// The `reqwest` client; synchronous and asynchronous.
    Reqwest,
}

impl BackendKind {
    /// Parses a backend name, mapping unknown names to a
    /// [`ConfigError`](crate::ConfigError).
    pub fn parse(name: &str) -> Result<Self, crate::ConfigError> {
        name.parse()
            .map_err(|_| crate::ConfigError::UnknownBackend(name.to_string()))
    }

    /// Whether the backend can perform asynchronous requests.
    pub fn supports_async(self) -> bool {
        matches!(self, Self::Reqwest)
    }

    /// Whether the backend can encode multipart payloads.
    pub fn supports_multipart(self) -> bool {
        matches!(self, Self::Reqwest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;

    #[test]
    fn parses_known_backends() {
        assert_eq!(BackendKind::parse("ureq").unwrap(), BackendKind::Ureq);
        assert_eq!(BackendKind::parse("reqwest").unwrap(), BackendKind::Reqwest);
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let err = BackendKind::parse("hyper").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "hyper"));
    }

    #[test]
    fn capability_matrix() {
        assert!(!BackendKind::Ureq.supports_async());
        assert!(!BackendKind::Ureq.supports_multipart());
        assert!(BackendKind::Reqwest.supports_async());
        assert!(BackendKind::Reqwest.supports_multipart());
    }

    #[test]
    fn default_matches_requests_equivalent() {
        assert_eq!(BackendKind::default(), BackendKind::Ureq);
        assert_eq!(BackendKind::Ureq.to_string(), "ureq");
    }
}
