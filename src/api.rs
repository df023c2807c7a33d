//! The registration API.
//!
//! An [`Api`] is a group of operations sharing defaults: the Rust analogue
//! of one declaratively annotated API class. Groups are assembled with
//! builders; every registration is validated eagerly when [`ApiBuilder::build`]
//! runs, so a malformed declaration fails before any client exists.
//!
//! ## Examples
//!
//! ```rust
//! use declarest::{Api, Operation};
//!
//! let dogs = Api::builder("dog_ceo")
//!     .endpoint("https://dog.ceo/api")
//!     .operation(Operation::get("list_subbreeds", "breed/{name}/list").query("limit"))
//!     .build()
//!     .unwrap();
//! assert_eq!(dogs.name(), "dog_ceo");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

use crate::args::ArgValue;
use crate::auth::Auth;
use crate::backend::BackendKind;
use crate::error::{ConfigError, Error};
use crate::metadata::{
    Binding, BodyBinding, BodySerializer, GroupDefaults, Handler, HeaderSpec, OperationSpec,
    StatusRule,
};
use crate::method::HttpMethod;
use crate::request::{check_path_template, Body};
use crate::response::{Response, ResponseValue};

/// A built, immutable group of REST operations with shared defaults.
///
/// Groups compose: a group can inherit others, and a
/// [`Client`](crate::Client) can merge several groups into one surface.
#[derive(Clone)]
pub struct Api {
    pub(crate) inner: Arc<ApiInner>,
}

pub(crate) struct ApiInner {
    pub name: String,
    pub defaults: GroupDefaults,
    pub operations: BTreeMap<String, Arc<OperationSpec>>,
    pub parents: Vec<Api>,
}

impl Api {
    /// Starts a new group.
    pub fn builder(name: impl Into<String>) -> ApiBuilder {
        ApiBuilder::new(name)
    }

    /// Group name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The operation declared directly on this group, if any.
    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.inner.operations.get(name).map(Arc::as_ref)
    }

    pub(crate) fn same_group(&self, other: &Api) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("name", &self.inner.name)
            .field("operations", &self.inner.operations.keys().collect::<Vec<_>>())
            .field(
                "parents",
                &self.inner.parents.iter().map(Api::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for an [`Api`] group.
pub struct ApiBuilder {
    name: String,
    endpoint: Option<String>,
    backend: Option<BackendKind>,
    timeout: Option<Duration>,
    stream: Option<bool>,
    headers: Vec<(String, String)>,
    handlers: Vec<(StatusRule, Handler)>,
    auth: Option<Auth>,
    parents: Vec<Api>,
    operations: Vec<Operation>,
}

impl ApiBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            backend: None,
            timeout: None,
            stream: None,
            headers: Vec::new(),
            handlers: Vec::new(),
            auth: None,
            parents: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Declares the group's endpoint URL.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Declares the group's default backend.
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    /// Declares the group's default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Declares the group-wide stream flag.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Adds a group-wide header. Repeating a key joins the values with
    /// `", "` in registration order.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sugar for the `accept` header.
    pub fn accept(self, value: impl Into<String>) -> Self {
        self.header("accept", value)
    }

    /// Sugar for the `content-type` header.
    pub fn content(self, value: impl Into<String>) -> Self {
        self.header("content-type", value)
    }

    /// Registers a group-wide status handler.
    pub fn on<S, F>(mut self, status: S, handler: F) -> Self
    where
        S: Into<StatusRule>,
        F: Fn(Response) -> Result<ResponseValue, Error> + Send + Sync + 'static,
    {
        self.handlers.push((status.into(), Arc::new(handler)));
        self
    }

    /// Declares the group's auth.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Inherits another group's operations and defaults. Resolution walks
    /// this group first, then inherited groups in registration order.
    pub fn inherit(mut self, parent: &Api) -> Self {
        self.parents.push(parent.clone());
        self
    }

    /// Adds an operation to the group.
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Validates every registration and produces the immutable group.
    ///
    /// ## Errors
    ///
    /// Returns a [`ConfigError`] for malformed declarations: empty or
    /// duplicate operation names, invalid path templates, invalid status
    /// codes, unparsable endpoint URLs, invalid header names or values, and
    /// operations mixing a body with form or multipart bindings.
    pub fn build(self) -> Result<Api, Error> {
        let endpoint = self.endpoint.as_deref().map(parse_endpoint).transpose()?;
        for (name, value) in &self.headers {
            check_header(name, value)?;
        }
        for (rule, _) in &self.handlers {
            check_status(*rule)?;
        }

        let mut operations = BTreeMap::new();
        for op in self.operations {
            let spec = op.build(&self.name)?;
            let name = spec.name().to_string();
            if operations.insert(name.clone(), Arc::new(spec)).is_some() {
                return Err(ConfigError::DuplicateOperation {
                    group: self.name,
                    operation: name,
                }
                .into());
            }
        }

        Ok(Api {
            inner: Arc::new(ApiInner {
                name: self.name,
                defaults: GroupDefaults {
                    endpoint,
                    backend: self.backend,
                    timeout: self.timeout,
                    stream: self.stream,
                    headers: self.headers,
                    handlers: self.handlers,
                    auth: self.auth,
                },
                operations,
                parents: self.parents,
            }),
        })
    }
}

/// Builder for one operation: a named verb + path template plus bindings.
///
/// Construct through a verb constructor ([`Operation::get`],
/// [`Operation::post`], ...), which fixes exactly one HTTP method per
/// operation, then chain binding registrations.
pub struct Operation {
    method: HttpMethod,
    name: String,
    path: String,
    queries: Vec<Binding>,
    headers: Vec<HeaderSpec>,
    forms: Vec<Binding>,
    parts: Vec<Binding>,
    body: Option<BodyBinding>,
    handlers: Vec<(StatusRule, Handler)>,
    endpoint: Option<String>,
    timeout: Option<Duration>,
    stream: Option<bool>,
    backend: Option<BackendKind>,
}

impl Operation {
    /// Starts an operation with an explicit verb.
    pub fn new(method: HttpMethod, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            name: name.into(),
            path: path.into(),
            queries: Vec::new(),
            headers: Vec::new(),
            forms: Vec::new(),
            parts: Vec::new(),
            body: None,
            handlers: Vec::new(),
            endpoint: None,
            timeout: None,
            stream: None,
            backend: None,
        }
    }

    /// Starts a GET operation.
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, name, path)
    }

    /// Starts a POST operation.
    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, name, path)
    }

    /// Starts a PUT operation.
    pub fn put(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, name, path)
    }

    /// Starts a PATCH operation.
    pub fn patch(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, name, path)
    }

    /// Starts a DELETE operation.
    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, name, path)
    }

    /// Starts a HEAD operation.
    pub fn head(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, name, path)
    }

    /// Starts an OPTIONS operation.
    pub fn options(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Options, name, path)
    }

    /// Binds a call argument to a query parameter of the same name.
    pub fn query(self, arg: impl Into<String>) -> Self {
        self.query_binding(arg, None, None)
    }

    /// Binds a call argument to a query parameter with a different wire name.
    pub fn query_as(self, arg: impl Into<String>, wire: impl Into<String>) -> Self {
        self.query_binding(arg, Some(wire.into()), None)
    }

    /// Binds a call argument to a query parameter with a default value.
    pub fn query_default(self, arg: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        self.query_binding(arg, None, Some(default.into()))
    }

    fn query_binding(
        mut self,
        arg: impl Into<String>,
        wire: Option<String>,
        default: Option<ArgValue>,
    ) -> Self {
        let mut binding = Binding::new(arg, wire);
        binding.default = default;
        self.queries.push(binding);
        self
    }

    /// Adds a literal header. Repeating a key joins the values with `", "`
    /// in registration order.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderSpec::Value {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Binds a call argument to a header of the same name.
    pub fn header_arg(mut self, arg: impl Into<String>) -> Self {
        self.headers.push(HeaderSpec::Arg(Binding::new(arg, None)));
        self
    }

    /// Binds a call argument to a header with a different wire name.
    pub fn header_arg_as(mut self, arg: impl Into<String>, wire: impl Into<String>) -> Self {
        self.headers
            .push(HeaderSpec::Arg(Binding::new(arg, Some(wire.into()))));
        self
    }

    /// Sugar for the `accept` header.
    pub fn accept(self, value: impl Into<String>) -> Self {
        self.header("accept", value)
    }

    /// Sugar for the `content-type` header.
    pub fn content(self, value: impl Into<String>) -> Self {
        self.header("content-type", value)
    }

    /// Binds a call argument to a form field of the same name.
    pub fn form(self, arg: impl Into<String>) -> Self {
        self.form_binding(arg, None, None)
    }

    /// Binds a call argument to a form field with a different wire name.
    pub fn form_as(self, arg: impl Into<String>, wire: impl Into<String>) -> Self {
        self.form_binding(arg, Some(wire.into()), None)
    }

    /// Binds a call argument to a form field with a default value.
    pub fn form_default(self, arg: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        self.form_binding(arg, None, Some(default.into()))
    }

    fn form_binding(
        mut self,
        arg: impl Into<String>,
        wire: Option<String>,
        default: Option<ArgValue>,
    ) -> Self {
        let mut binding = Binding::new(arg, wire);
        binding.default = default;
        self.forms.push(binding);
        self
    }

    /// Binds a call argument to a multipart part of the same name.
    pub fn part(mut self, arg: impl Into<String>) -> Self {
        self.parts.push(Binding::new(arg, None));
        self
    }

    /// Binds a call argument to a multipart part with a different wire name.
    pub fn part_as(mut self, arg: impl Into<String>, wire: impl Into<String>) -> Self {
        self.parts.push(Binding::new(arg, Some(wire.into())));
        self
    }

    /// Binds a call argument to the request body.
    pub fn body(mut self, arg: impl Into<String>) -> Self {
        self.body = Some(BodyBinding {
            arg: arg.into(),
            serializer: None,
        });
        self
    }

    /// Binds a call argument to the request body through a serializer.
    pub fn body_with<F>(mut self, arg: impl Into<String>, serializer: F) -> Self
    where
        F: Fn(ArgValue) -> Result<Body, Error> + Send + Sync + 'static,
    {
        self.body = Some(BodyBinding {
            arg: arg.into(),
            serializer: Some(Arc::new(serializer) as BodySerializer),
        });
        self
    }

    /// Registers a status handler. Exact codes beat the
    /// [`StatusRule::Any`] wildcard; re-registering a rule shadows the
    /// earlier handler.
    pub fn on<S, F>(mut self, status: S, handler: F) -> Self
    where
        S: Into<StatusRule>,
        F: Fn(Response) -> Result<ResponseValue, Error> + Send + Sync + 'static,
    {
        self.handlers.push((status.into(), Arc::new(handler)));
        self
    }

    /// Declares an operation-specific endpoint, overriding group endpoints.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Declares an operation-specific timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requests the raw response instead of the default parse policy.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Declares an operation-specific backend.
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    fn build(self, group: &str) -> Result<OperationSpec, Error> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyOperationName {
                group: group.to_string(),
            }
            .into());
        }
        check_path_template(&self.path)?;
        for (rule, _) in &self.handlers {
            check_status(*rule)?;
        }
        for spec in &self.headers {
            match spec {
                HeaderSpec::Value { name, value } => check_header(name, value)?,
                HeaderSpec::Arg(binding) => check_header(&binding.wire, "")?,
            }
        }
        if self.body.is_some() && (!self.forms.is_empty() || !self.parts.is_empty()) {
            return Err(ConfigError::ConflictingBody {
                operation: self.name,
            }
            .into());
        }
        let endpoint = self.endpoint.as_deref().map(parse_endpoint).transpose()?;

        Ok(OperationSpec {
            name: self.name,
            method: self.method,
            path: self.path,
            queries: self.queries,
            headers: self.headers,
            forms: self.forms,
            parts: self.parts,
            body: self.body,
            handlers: self.handlers,
            endpoint,
            timeout: self.timeout,
            stream: self.stream,
            backend: self.backend,
        })
    }
}

pub(crate) fn parse_endpoint(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|source| {
        ConfigError::InvalidEndpoint {
            url: url.to_string(),
            source,
        }
        .into()
    })
}

fn check_status(rule: StatusRule) -> Result<(), ConfigError> {
    if let StatusRule::Code(code) = rule {
        if !(100..=599).contains(&code) {
            return Err(ConfigError::InvalidStatusCode(code));
        }
    }
    Ok(())
}

fn check_header(name: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::try_from(name).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    HeaderValue::try_from(value).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_group() {
        let api = Api::builder("dogs")
            .endpoint("https://dog.ceo/api")
            .operation(Operation::get("list", "breed/{name}/list"))
            .build()
            .unwrap();
        assert_eq!(api.name(), "dogs");
        let op = api.operation("list").unwrap();
        assert_eq!(op.method(), HttpMethod::Get);
        assert_eq!(op.path(), "breed/{name}/list");
    }

    #[test]
    fn duplicate_operation_names_rejected() {
        let err = Api::builder("dogs")
            .operation(Operation::get("list", "a"))
            .operation(Operation::get("list", "b"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::DuplicateOperation { operation, .. })
                if operation == "list"
        ));
    }

    #[test]
    fn invalid_status_code_rejected_at_build() {
        let err = Api::builder("dogs")
            .operation(
                Operation::get("list", "a").on(999, |_| Ok(ResponseValue::Empty)),
            )
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidStatusCode(999))
        ));
    }

    #[test]
    fn body_with_form_bindings_rejected() {
        let err = Api::builder("dogs")
            .operation(Operation::post("save", "a").body("payload").form("field"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::ConflictingBody { operation }) if operation == "save"
        ));
    }

    #[test]
    fn malformed_endpoint_rejected() {
        let err = Api::builder("dogs")
            .endpoint("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn malformed_path_template_rejected() {
        let err = Api::builder("dogs")
            .operation(Operation::get("list", "breed/{oops"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidPathTemplate { .. })
        ));
    }

    #[test]
    fn invalid_header_name_rejected() {
        let err = Api::builder("dogs")
            .header("bad header", "v")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn empty_operation_name_rejected() {
        let err = Api::builder("dogs")
            .operation(Operation::get("", "a"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::EmptyOperationName { group }) if group == "dogs"
        ));
    }
}
