//! Reusable transport sessions.
//!
//! A session pins one backend session object (connection pool) for a
//! sequence of calls. Lifecycle is scoped: a session lives until
//! [`Session::close`] consumes it or it goes out of scope, and the type
//! system makes a closed session unusable. The underlying backend session
//! is exposed for advanced customization.

use url::Url;

use crate::api::parse_endpoint;
use crate::backend::{BackendKind, ReqwestAsyncTransport, ReqwestTransport, UreqTransport};
use crate::client::{Call, Client, Exec};
use crate::error::{ConfigError, Error};
use crate::request::RequestDescriptor;
use crate::response::Response;

enum SessionTransport {
    Ureq(UreqTransport),
    Reqwest(ReqwestTransport),
}

/// The backend's own session object, for customization the declarative
/// layer does not model (certificates, proxies, ...).
pub enum BackendSession<'s> {
    /// The `ureq` agent behind a ureq session.
    Ureq(&'s ureq::Agent),
    /// The blocking `reqwest` client behind a reqwest session.
    Reqwest(&'s reqwest::blocking::Client),
}

/// A synchronous session bound to one client and one backend.
pub struct Session<'c> {
    client: &'c Client,
    backend: BackendKind,
    transport: SessionTransport,
    endpoint: Option<Url>,
}

impl<'c> Session<'c> {
    pub(crate) fn open(client: &'c Client, backend: BackendKind) -> Result<Self, Error> {
        let transport = match backend {
            BackendKind::Ureq => SessionTransport::Ureq(UreqTransport::new()),
            BackendKind::Reqwest => SessionTransport::Reqwest(ReqwestTransport::new()?),
        };
        Ok(Self {
            client,
            backend,
            transport,
            endpoint: None,
        })
    }

    /// The backend this session is pinned to.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Overrides the endpoint for every call made through this session.
    pub fn with_endpoint(mut self, url: &str) -> Result<Self, Error> {
        self.endpoint = Some(parse_endpoint(url)?);
        Ok(self)
    }

    /// The underlying backend session object.
    pub fn backend_session(&self) -> BackendSession<'_> {
        match &self.transport {
            SessionTransport::Ureq(transport) => BackendSession::Ureq(transport.agent()),
            SessionTransport::Reqwest(transport) => BackendSession::Reqwest(transport.client()),
        }
    }

    /// Starts a call executing through this session.
    pub fn invoke(&self, operation: impl Into<String>) -> Call<'_> {
        Call::new(Exec::Session(self), operation)
    }

    /// Closes the session, releasing the backend session object.
    ///
    /// Consumes the session; dropping it has the same effect.
    pub fn close(self) {}

    pub(crate) fn client(&self) -> &'c Client {
        self.client
    }

    pub(crate) fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    pub(crate) fn send(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        match &self.transport {
            SessionTransport::Ureq(transport) => transport.send(request),
            SessionTransport::Reqwest(transport) => transport.send(request),
        }
    }
}

/// An asynchronous session bound to one client.
///
/// Only backends with asynchronous support can open one; requesting an
/// async session on a synchronous-only backend is a configuration error,
/// never a silent fallback.
pub struct AsyncSession<'c> {
    client: &'c Client,
    backend: BackendKind,
    transport: ReqwestAsyncTransport,
}

impl std::fmt::Debug for AsyncSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSession")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl<'c> AsyncSession<'c> {
    pub(crate) fn open(client: &'c Client, backend: BackendKind) -> Result<Self, Error> {
        if !backend.supports_async() {
            return Err(ConfigError::Unsupported {
                backend,
                capability: "asynchronous sessions",
            }
            .into());
        }
        Ok(Self {
            client,
            backend,
            transport: ReqwestAsyncTransport::new()?,
        })
    }

    /// The backend this session is pinned to.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// The underlying async client.
    pub fn backend_session(&self) -> &reqwest::Client {
        self.transport.client()
    }

    /// Starts a call executing through this session.
    pub fn invoke(&self, operation: impl Into<String>) -> Call<'_> {
        Call::new(Exec::AsyncSession(self), operation)
    }

    /// Closes the session, releasing the backend session object.
    pub fn close(self) {}

    pub(crate) fn client(&self) -> &'c Client {
        self.client
    }

    pub(crate) async fn send(&self, request: &RequestDescriptor) -> Result<Response, Error> {
        self.transport.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Api, Operation};

    fn api() -> Api {
        Api::builder("things")
            .endpoint("https://things.example.com")
            .operation(Operation::get("fetch", "things/{id}"))
            .build()
            .unwrap()
    }

    #[test]
    fn session_uses_client_default_backend() {
        let client = Client::new(&api());
        let session = client.session().unwrap();
        assert_eq!(session.backend(), BackendKind::Ureq);
        assert!(matches!(session.backend_session(), BackendSession::Ureq(_)));
    }

    #[test]
    fn async_session_requires_async_backend() {
        let client = Client::new(&api());
        let err = client.async_session().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Unsupported {
                backend: BackendKind::Ureq,
                ..
            })
        ));
    }

    #[test]
    fn session_endpoint_overrides_declared_endpoint() {
        let client = Client::new(&api());
        let session = client
            .session()
            .unwrap()
            .with_endpoint("https://session.example.com")
            .unwrap();
        let descriptor = session
            .invoke("fetch")
            .arg("id", 7)
            .descriptor()
            .unwrap();
        assert_eq!(
            descriptor.url().as_str(),
            "https://session.example.com/things/7"
        );
    }

    #[test]
    fn conflicting_call_backend_rejected_on_session() {
        let client = Client::new(&api());
        let session = client.session().unwrap();
        let err = session
            .invoke("fetch")
            .arg("id", 7)
            .backend(BackendKind::Reqwest)
            .descriptor()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::SessionBackendMismatch { .. })
        ));
    }
}
