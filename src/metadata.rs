//! The metadata store populated by the registration API.
//!
//! Everything here is recorded at declaration time and immutable once the
//! owning [`Api`](crate::Api) group is built. Registration order is
//! preserved: same-kind entries targeting the same wire name accumulate in
//! the order they were declared, which drives header comma-joining and
//! handler-table shadowing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::args::ArgValue;
use crate::auth::Auth;
use crate::backend::BackendKind;
use crate::error::Error;
use crate::method::HttpMethod;
use crate::request::Body;
use crate::response::{Response, ResponseValue};

/// A response handler registered with `on`.
pub type Handler = Arc<dyn Fn(Response) -> Result<ResponseValue, Error> + Send + Sync>;

/// A body serializer registered with `body_with`.
pub type BodySerializer = Arc<dyn Fn(ArgValue) -> Result<Body, Error> + Send + Sync>;

/// Status selector keying a handler table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusRule {
    /// Matches one exact status code.
    Code(u16),
    /// Matches any status not matched exactly.
    Any,
}

impl From<u16> for StatusRule {
    fn from(code: u16) -> Self {
        Self::Code(code)
    }
}

/// Looks up the handler for a status code.
///
/// Exact matches win over the `Any` wildcard; within each rule the latest
/// registration shadows earlier ones.
pub(crate) fn lookup_handler(
    handlers: &[(StatusRule, Handler)],
    status: u16,
) -> Option<&Handler> {
    handlers
        .iter()
        .rev()
        .find(|(rule, _)| *rule == StatusRule::Code(status))
        .or_else(|| handlers.iter().rev().find(|(rule, _)| *rule == StatusRule::Any))
        .map(|(_, handler)| handler)
}

/// Maps one call argument into a query, form or multipart slot.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    /// Name of the call argument the value comes from.
    pub arg: String,
    /// Name the value travels under on the wire.
    pub wire: String,
    /// Value used when the argument is not passed.
    pub default: Option<ArgValue>,
}

impl Binding {
    pub(crate) fn new(arg: impl Into<String>, wire: Option<String>) -> Self {
        let arg = arg.into();
        let wire = wire.unwrap_or_else(|| arg.clone());
        Self {
            arg,
            wire,
            default: None,
        }
    }
}

/// One entry in an operation's header list, in registration order.
#[derive(Debug, Clone)]
pub(crate) enum HeaderSpec {
    /// A literal header value.
    Value { name: String, value: String },
    /// A header fed from a call argument; `wire` is the header name.
    Arg(Binding),
}

/// The body slot of an operation.
#[derive(Clone)]
pub(crate) struct BodyBinding {
    pub arg: String,
    pub serializer: Option<BodySerializer>,
}

impl fmt::Debug for BodyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyBinding")
            .field("arg", &self.arg)
            .field("serializer", &self.serializer.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Resolved, immutable request template for one operation.
#[derive(Clone)]
pub struct OperationSpec {
    pub(crate) name: String,
    pub(crate) method: HttpMethod,
    pub(crate) path: String,
    pub(crate) queries: Vec<Binding>,
    pub(crate) headers: Vec<HeaderSpec>,
    pub(crate) forms: Vec<Binding>,
    pub(crate) parts: Vec<Binding>,
    pub(crate) body: Option<BodyBinding>,
    pub(crate) handlers: Vec<(StatusRule, Handler)>,
    pub(crate) endpoint: Option<Url>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) stream: Option<bool>,
    pub(crate) backend: Option<BackendKind>,
}

impl OperationSpec {
    /// Operation name used for invocation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared HTTP verb.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Endpoint-relative path template with `{name}` placeholders.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<OperationSpec {} {} '{}'>", self.name, self.method, self.path)
    }
}

/// Group-wide defaults attached to an [`Api`](crate::Api).
#[derive(Clone, Default)]
pub(crate) struct GroupDefaults {
    pub endpoint: Option<Url>,
    pub backend: Option<BackendKind>,
    pub timeout: Option<Duration>,
    pub stream: Option<bool>,
    /// Static headers only; argument-fed headers are operation-level.
    pub headers: Vec<(String, String)>,
    pub handlers: Vec<(StatusRule, Handler)>,
    pub auth: Option<Auth>,
}

impl fmt::Debug for GroupDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDefaults")
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .field("stream", &self.stream)
            .field("headers", &self.headers)
            .field("handlers", &self.handlers.len())
            .field("auth", &self.auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(tag: &'static str) -> Handler {
        Arc::new(move |_resp| Ok(ResponseValue::Text(tag.to_string())))
    }

    fn run(h: &Handler) -> String {
        let resp = Response::new(200, Vec::new(), bytes::Bytes::new());
        match h(resp).unwrap() {
            ResponseValue::Text(t) => t,
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn exact_match_wins_over_any() {
        let table = vec![
            (StatusRule::Code(200), handler("ok")),
            (StatusRule::Any, handler("any")),
        ];
        assert_eq!(run(lookup_handler(&table, 200).unwrap()), "ok");
        assert_eq!(run(lookup_handler(&table, 404).unwrap()), "any");
    }

    #[test]
    fn later_registration_shadows_earlier() {
        let table = vec![
            (StatusRule::Code(200), handler("group")),
            (StatusRule::Code(200), handler("operation")),
        ];
        assert_eq!(run(lookup_handler(&table, 200).unwrap()), "operation");
    }

    #[test]
    fn no_match_without_any() {
        let table = vec![(StatusRule::Code(200), handler("ok"))];
        assert!(lookup_handler(&table, 500).is_none());
    }

    #[test]
    fn binding_wire_defaults_to_arg() {
        let b = Binding::new("limit", None);
        assert_eq!(b.wire, "limit");
        let b = Binding::new("limit", Some("max".to_string()));
        assert_eq!(b.wire, "max");
    }
}
