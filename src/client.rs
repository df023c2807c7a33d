//! Client composition and call dispatch.
//!
//! A [`Client`] merges one or more [`Api`] groups into a single invocation
//! surface and carries instance-level overrides (endpoint, backend, auth,
//! timeout). Calls are built with [`Call`]: bind arguments, optionally
//! override any declared aspect for this one call, then dispatch with
//! [`Call::send`] or [`Call::send_async`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::{instrument, Span};
use url::Url;

use crate::api::{parse_endpoint, Api};
use crate::args::ArgValue;
use crate::auth::Auth;
use crate::backend::{BackendKind, ReqwestAsyncTransport, ReqwestTransport, UreqTransport};
use crate::error::{ConfigError, Error};
use crate::metadata::{Handler, StatusRule};
use crate::request::{assemble, CallContext, CallOverrides, RequestDescriptor};
use crate::resolve::{linearize, resolve};
use crate::response::{map_response, Response, ResponseValue};
use crate::session::{AsyncSession, Session};

/// A client composed from one or more API groups.
pub struct Client {
    order: Vec<Api>,
    endpoint: Option<Url>,
    backend: Option<BackendKind>,
    auth: Option<Auth>,
    timeout: Option<Duration>,
    transports: Transports,
}

/// Lazily constructed one-shot transports, one per backend, reused across
/// calls that do not run inside a session.
#[derive(Default)]
struct Transports {
    ureq: OnceLock<UreqTransport>,
    reqwest_blocking: OnceLock<ReqwestTransport>,
    reqwest_async: OnceLock<ReqwestAsyncTransport>,
}

impl Client {
    /// Creates a client over a single group with no instance overrides.
    pub fn new(api: &Api) -> Self {
        Self {
            order: linearize(std::slice::from_ref(api)),
            endpoint: None,
            backend: None,
            auth: None,
            timeout: None,
            transports: Transports::default(),
        }
    }

    /// Starts a client builder for composing groups and setting overrides.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The instance-level endpoint override, if set.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// The backend used when neither the call nor the operation selects
    /// one explicitly.
    pub fn default_backend(&self) -> BackendKind {
        self.backend
            .or_else(|| {
                self.order
                    .iter()
                    .find_map(|group| group.inner.defaults.backend)
            })
            .unwrap_or_default()
    }

    /// Replaces the instance endpoint.
    pub fn set_endpoint(&mut self, url: &str) -> Result<(), Error> {
        self.endpoint = Some(parse_endpoint(url)?);
        Ok(())
    }

    /// Replaces the instance backend.
    pub fn set_backend(&mut self, kind: BackendKind) {
        self.backend = Some(kind);
    }

    /// Replaces the instance auth.
    pub fn set_auth(&mut self, auth: Auth) {
        self.auth = Some(auth);
    }

    /// Starts a call to a named operation.
    pub fn invoke(&self, operation: impl Into<String>) -> Call<'_> {
        Call::new(Exec::Client(self), operation)
    }

    /// Opens a reusable synchronous session on the client's default
    /// backend.
    pub fn session(&self) -> Result<Session<'_>, Error> {
        Session::open(self, self.default_backend())
    }

    /// Opens a reusable synchronous session on a specific backend.
    pub fn session_with(&self, backend: BackendKind) -> Result<Session<'_>, Error> {
        Session::open(self, backend)
    }

    /// Opens a reusable asynchronous session.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when the effective backend has
    /// no asynchronous support.
    pub fn async_session(&self) -> Result<AsyncSession<'_>, Error> {
        AsyncSession::open(self, self.default_backend())
    }

    pub(crate) fn groups(&self) -> &[Api] {
        &self.order
    }

    pub(crate) fn instance_auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }

    pub(crate) fn ureq(&self) -> &UreqTransport {
        self.transports.ureq.get_or_init(UreqTransport::new)
    }

    pub(crate) fn reqwest_blocking(&self) -> Result<&ReqwestTransport, Error> {
        if let Some(transport) = self.transports.reqwest_blocking.get() {
            return Ok(transport);
        }
        let built = ReqwestTransport::new()?;
        Ok(self.transports.reqwest_blocking.get_or_init(|| built))
    }

    pub(crate) fn reqwest_async(&self) -> Result<&ReqwestAsyncTransport, Error> {
        if let Some(transport) = self.transports.reqwest_async.get() {
            return Ok(transport);
        }
        let built = ReqwestAsyncTransport::new()?;
        Ok(self.transports.reqwest_async.get_or_init(|| built))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field(
                "groups",
                &self.order.iter().map(Api::name).collect::<Vec<_>>(),
            )
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for a composed [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    groups: Vec<Api>,
    endpoint: Option<String>,
    backend: Option<BackendKind>,
    auth: Option<Auth>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Adds a group to the composition. Earlier groups win name lookups.
    pub fn api(mut self, api: &Api) -> Self {
        self.groups.push(api.clone());
        self
    }

    /// Sets the instance endpoint, overriding declared endpoints.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the instance backend, overriding declared backends.
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    /// Sets the instance auth.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the instance default timeout, used when neither the call nor
    /// the declarations specify one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<Client, Error> {
        let endpoint = self.endpoint.as_deref().map(parse_endpoint).transpose()?;
        Ok(Client {
            order: linearize(&self.groups),
            endpoint,
            backend: self.backend,
            auth: self.auth,
            timeout: self.timeout,
            transports: Transports::default(),
        })
    }
}

/// Where a call executes.
#[derive(Clone, Copy)]
pub(crate) enum Exec<'a> {
    Client(&'a Client),
    Session(&'a Session<'a>),
    AsyncSession(&'a AsyncSession<'a>),
}

impl<'a> Exec<'a> {
    fn client(&self) -> &'a Client {
        match *self {
            Self::Client(client) => client,
            Self::Session(session) => session.client(),
            Self::AsyncSession(session) => session.client(),
        }
    }
}

/// One invocation of a declared operation.
///
/// Any aspect declared on the operation or its groups can be overridden
/// for this single call before dispatching.
pub struct Call<'a> {
    exec: Exec<'a>,
    operation: String,
    args: BTreeMap<String, ArgValue>,
    overrides: CallOverrides,
    handlers: Vec<(StatusRule, Handler)>,
    timeout: Option<Duration>,
    stream: Option<bool>,
    backend: Option<BackendKind>,
    auth: Option<Auth>,
    endpoint: Option<String>,
}

struct Prepared<'a> {
    exec: Exec<'a>,
    backend: BackendKind,
    descriptor: RequestDescriptor,
    handlers: Vec<(StatusRule, Handler)>,
    stream: bool,
}

impl<'a> Call<'a> {
    pub(crate) fn new(exec: Exec<'a>, operation: impl Into<String>) -> Self {
        Self {
            exec,
            operation: operation.into(),
            args: BTreeMap::new(),
            overrides: CallOverrides::default(),
            handlers: Vec::new(),
            timeout: None,
            stream: None,
            backend: None,
            auth: None,
            endpoint: None,
        }
    }

    /// Binds a named argument for this call.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Overrides or adds one query parameter by wire name.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.overrides.query.push((name.into(), value.into()));
        self
    }

    /// Overrides or adds one header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.headers.push((name.into(), value.into()));
        self
    }

    /// Overrides or adds one form field by wire name.
    pub fn form(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.overrides.form.push((name.into(), value.into()));
        self
    }

    /// Overrides or adds one multipart part by wire name.
    pub fn part(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.overrides.parts.push((name.into(), value.into()));
        self
    }

    /// Overrides the request body.
    pub fn body(mut self, value: impl Into<ArgValue>) -> Self {
        self.overrides.body = Some(value.into());
        self
    }

    /// Overrides the `accept` header.
    pub fn accept(mut self, value: impl Into<String>) -> Self {
        self.overrides.accept = Some(value.into());
        self
    }

    /// Overrides the `content-type` header.
    pub fn content(mut self, value: impl Into<String>) -> Self {
        self.overrides.content = Some(value.into());
        self
    }

    /// Registers a status handler for this call only.
    pub fn on<S, F>(mut self, status: S, handler: F) -> Self
    where
        S: Into<StatusRule>,
        F: Fn(Response) -> Result<ResponseValue, Error> + Send + Sync + 'static,
    {
        self.handlers.push((status.into(), Arc::new(handler)));
        self
    }

    /// Overrides the timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the stream flag for this call.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Overrides the backend for this call.
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    /// Overrides the auth for this call.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Overrides the endpoint for this call.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Resolves metadata, applies overrides and assembles the request.
    fn prepare(self) -> Result<Prepared<'a>, Error> {
        let client = self.exec.client();
        let resolved = resolve(client.groups(), &self.operation)?;

        for (rule, _) in &self.handlers {
            if let StatusRule::Code(code) = rule {
                if !(100..=599).contains(code) {
                    return Err(ConfigError::InvalidStatusCode(*code).into());
                }
            }
        }

        // Backend: call > client > declaration > default; a session pins
        // the backend and rejects a conflicting per-call choice.
        let declared = self
            .backend
            .or(client.backend)
            .or(resolved.backend)
            .unwrap_or_default();
        let backend = match self.exec {
            Exec::Session(session) => {
                if let Some(requested) = self.backend {
                    if requested != session.backend() {
                        return Err(ConfigError::SessionBackendMismatch {
                            session: session.backend(),
                            requested,
                        }
                        .into());
                    }
                }
                session.backend()
            }
            Exec::AsyncSession(session) => {
                if let Some(requested) = self.backend {
                    if requested != session.backend() {
                        return Err(ConfigError::SessionBackendMismatch {
                            session: session.backend(),
                            requested,
                        }
                        .into());
                    }
                }
                session.backend()
            }
            Exec::Client(_) => declared,
        };

        // Endpoint: call > session > client > declarations.
        let call_endpoint = self.endpoint.as_deref().map(parse_endpoint).transpose()?;
        let session_endpoint = match self.exec {
            Exec::Session(session) => session.endpoint().cloned(),
            _ => None,
        };
        let endpoint = call_endpoint
            .or(session_endpoint)
            .or_else(|| client.endpoint.clone())
            .or_else(|| resolved.endpoint.clone())
            .ok_or_else(|| ConfigError::MissingEndpoint {
                operation: self.operation.clone(),
            })?;

        let auth = self
            .auth
            .or_else(|| client.instance_auth().cloned())
            .or_else(|| resolved.auth.clone());
        let timeout = self.timeout.or(resolved.timeout).or(client.timeout);
        let stream = self.stream.or(resolved.stream).unwrap_or(false);

        let mut handlers = resolved.handlers.clone();
        handlers.extend(self.handlers);

        let descriptor = assemble(&CallContext {
            operation: &resolved.spec,
            group_headers: &resolved.headers,
            endpoint: &endpoint,
            auth: auth.as_ref(),
            timeout,
            stream,
            args: &self.args,
            overrides: &self.overrides,
        })?;

        Ok(Prepared {
            exec: self.exec,
            backend,
            descriptor,
            handlers,
            stream,
        })
    }

    /// Assembles the request without dispatching it.
    ///
    /// Useful for inspecting exactly what would go on the wire.
    pub fn descriptor(self) -> Result<RequestDescriptor, Error> {
        Ok(self.prepare()?.descriptor)
    }

    /// Dispatches the call synchronously and maps the response.
    #[instrument(
        name = "api_request",
        skip(self),
        fields(
            operation = %self.operation,
            http.method = tracing::field::Empty,
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
        )
    )]
    pub fn send(self) -> Result<ResponseValue, Error> {
        let prepared = self.prepare()?;
        let span = Span::current();
        span.record(
            "http.method",
            prepared.descriptor.method().to_string().as_str(),
        );
        span.record("http.url", prepared.descriptor.url().as_str());

        let response = match prepared.exec {
            Exec::Client(client) => match prepared.backend {
                BackendKind::Ureq => client.ureq().send(&prepared.descriptor)?,
                BackendKind::Reqwest => client.reqwest_blocking()?.send(&prepared.descriptor)?,
            },
            Exec::Session(session) => session.send(&prepared.descriptor)?,
            Exec::AsyncSession(_) => {
                return Err(ConfigError::Unsupported {
                    backend: prepared.backend,
                    capability: "synchronous dispatch on an asynchronous session",
                }
                .into())
            }
        };

        span.record("http.status_code", response.status());
        map_response(&prepared.handlers, response, prepared.stream)
    }

    /// Dispatches the call asynchronously and maps the response.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::Unsupported`] when the effective backend has
    /// no asynchronous support; the call never silently falls back to the
    /// synchronous path.
    #[instrument(
        name = "api_request",
        skip(self),
        fields(
            operation = %self.operation,
            http.method = tracing::field::Empty,
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
        )
    )]
    pub async fn send_async(self) -> Result<ResponseValue, Error> {
        let prepared = self.prepare()?;
        let span = Span::current();
        span.record(
            "http.method",
            prepared.descriptor.method().to_string().as_str(),
        );
        span.record("http.url", prepared.descriptor.url().as_str());

        let response = match prepared.exec {
            Exec::Client(client) => {
                if !prepared.backend.supports_async() {
                    return Err(ConfigError::Unsupported {
                        backend: prepared.backend,
                        capability: "asynchronous requests",
                    }
                    .into());
                }
                client.reqwest_async()?.send(&prepared.descriptor).await?
            }
            Exec::AsyncSession(session) => session.send(&prepared.descriptor).await?,
            Exec::Session(_) => {
                return Err(ConfigError::Unsupported {
                    backend: prepared.backend,
                    capability: "asynchronous dispatch on a synchronous session",
                }
                .into())
            }
        };

        span.record("http.status_code", response.status());
        map_response(&prepared.handlers, response, prepared.stream)
    }
}

impl fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("operation", &self.operation)
            .field("args", &self.args.keys().collect::<Vec<_>>())
            .field("backend", &self.backend)
            .finish()
    }
}
