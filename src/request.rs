//! Request assembly.
//!
//! Takes the resolved metadata for one operation plus the arguments of one
//! concrete call and produces a [`RequestDescriptor`]: the fully formed
//! request handed to a backend adapter. The descriptor is ephemeral; one is
//! built per call and dropped once dispatched.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;
use url::form_urlencoded;
use url::Url;

use crate::args::ArgValue;
use crate::auth::Auth;
use crate::error::{ConfigError, Error};
use crate::metadata::{Binding, HeaderSpec, OperationSpec};
use crate::method::HttpMethod;

/// A request body after serialization.
#[derive(Debug, Clone)]
pub enum Body {
    /// Serialized as JSON on the wire.
    Json(serde_json::Value),
    /// Sent verbatim as UTF-8 text.
    Text(String),
    /// Sent verbatim as bytes.
    Bytes(Bytes),
}

impl Body {
    /// The wire form of the body.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Json(v) => v.to_string().into_bytes(),
            Self::Text(t) => t.clone().into_bytes(),
            Self::Bytes(b) => b.to_vec(),
        }
    }
}

/// One part of a multipart payload.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part name on the wire.
    pub name: String,
    /// File name, present for file parts.
    pub filename: Option<String>,
    /// MIME type, present for file parts.
    pub content_type: Option<String>,
    /// Part content.
    pub data: Bytes,
}

/// The payload slot of a request.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No payload.
    #[default]
    None,
    /// A single body.
    Body(Body),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// Multipart parts.
    Multipart(Vec<Part>),
}

impl Payload {
    pub(crate) fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    pub(crate) fn is_form(&self) -> bool {
        matches!(self, Self::Form(_))
    }
}

/// A fully assembled request, ready for a backend adapter.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub(crate) method: HttpMethod,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) payload: Payload,
    pub(crate) timeout: Option<Duration>,
    pub(crate) stream: bool,
}

impl RequestDescriptor {
    /// HTTP verb of the request.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Resolved URL without query parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Merged, case-insensitive headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Query parameters in wire order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The request payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Effective timeout forwarded to the backend.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the raw response should bypass the default parse policy.
    pub fn stream(&self) -> bool {
        self.stream
    }

    /// The URL with query parameters appended.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        url
    }
}

/// Per-call overrides gathered by the `Call` builder.
///
/// Entries are keyed by wire name and merge over declared bindings: a
/// same-keyed entry replaces the declared value, a new key is added.
#[derive(Debug, Default, Clone)]
pub(crate) struct CallOverrides {
    pub query: Vec<(String, ArgValue)>,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, ArgValue)>,
    pub parts: Vec<(String, ArgValue)>,
    pub body: Option<ArgValue>,
    pub accept: Option<String>,
    pub content: Option<String>,
}

/// Everything request assembly needs for one call.
pub(crate) struct CallContext<'a> {
    pub operation: &'a OperationSpec,
    /// Group-level static headers from the nearest group that declares any.
    pub group_headers: &'a [(String, String)],
    pub endpoint: &'a Url,
    pub auth: Option<&'a Auth>,
    pub timeout: Option<Duration>,
    pub stream: bool,
    pub args: &'a BTreeMap<String, ArgValue>,
    pub overrides: &'a CallOverrides,
}

/// Substitutes `{name}` placeholders in a path template.
fn render_path(
    template: &str,
    operation: &str,
    lookup: &dyn Fn(&str) -> Option<ArgValue>,
) -> Result<String, Error> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| ConfigError::InvalidPathTemplate {
                path: template.to_string(),
                reason: "unclosed `{` placeholder".to_string(),
            })?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(ConfigError::InvalidPathTemplate {
                path: template.to_string(),
                reason: "empty or nested placeholder".to_string(),
            }
            .into());
        }

        let value = lookup(name).ok_or_else(|| ConfigError::MissingPathArgument {
            operation: operation.to_string(),
            placeholder: name.to_string(),
        })?;
        let text = value
            .as_text()
            .ok_or_else(|| ConfigError::UnrenderableArgument {
                operation: operation.to_string(),
                argument: name.to_string(),
            })?;
        out.push_str(&text);
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    if out.contains('}') {
        return Err(ConfigError::InvalidPathTemplate {
            path: template.to_string(),
            reason: "unmatched `}`".to_string(),
        }
        .into());
    }
    Ok(out)
}

/// Validates a path template without substituting anything.
pub(crate) fn check_path_template(template: &str) -> Result<(), ConfigError> {
    match render_path(template, "", &|_| Some(ArgValue::Str(String::new()))) {
        Ok(_) => Ok(()),
        Err(Error::Config(e)) => Err(e),
        // lookup never fails and nothing else can go wrong here
        Err(_) => Ok(()),
    }
}

/// An ordered header accumulator with case-insensitive keys.
#[derive(Default)]
struct HeaderAcc(Vec<(String, String)>);

impl HeaderAcc {
    /// Appends per the same-scope accumulation rule: a repeated key joins
    /// its values with `", "` in registration order.
    fn append(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        match self.0.iter_mut().find(|(n, _)| *n == key) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => self.0.push((key, value.to_string())),
        }
    }

    /// Replaces any existing value for the key.
    fn set(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        self.0.retain(|(n, _)| *n != key);
        self.0.push((key, value.to_string()));
    }

    fn contains(&self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        self.0.iter().any(|(n, _)| *n == key)
    }

    fn into_header_map(self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::with_capacity(self.0.len());
        for (name, value) in self.0 {
            let header = HeaderName::try_from(name.as_str()).map_err(|e| {
                ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let value =
                HeaderValue::try_from(value.as_str()).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            map.insert(header, value);
        }
        Ok(map)
    }
}

/// Builds the request descriptor for one call.
pub(crate) fn assemble(ctx: &CallContext<'_>) -> Result<RequestDescriptor, Error> {
    let op = ctx.operation;

    // Declared binding defaults participate in argument lookup, so a path
    // placeholder can be satisfied by a defaulted binding.
    let declared_default = |name: &str| -> Option<ArgValue> {
        op.queries
            .iter()
            .chain(op.forms.iter())
            .chain(op.parts.iter())
            .find(|b| b.arg == name)
            .and_then(|b| b.default.clone())
            .or_else(|| {
                op.headers.iter().find_map(|h| match h {
                    HeaderSpec::Arg(b) if b.arg == name => b.default.clone(),
                    _ => None,
                })
            })
    };
    let arg_value =
        |name: &str| -> Option<ArgValue> { ctx.args.get(name).cloned().or_else(|| declared_default(name)) };

    // 1. Path substitution.
    let rendered = render_path(&op.path, &op.name, &arg_value)?;
    let url = join_endpoint(ctx.endpoint, &rendered)?;

    // 2. Query parameters: declared bindings, then per-call overrides.
    let mut query = Vec::new();
    for binding in &op.queries {
        if let Some(text) = resolve_text(binding, &op.name, ctx.args)? {
            query.push((binding.wire.clone(), text));
        }
    }
    merge_pairs(&mut query, &ctx.overrides.query, &op.name)?;
    if let Some((param, key)) = ctx.auth.and_then(Auth::query) {
        query.push((param.to_string(), key.to_string()));
    }

    // 3. Headers: group scope, overridden per key by operation scope,
    //    overridden per key by per-call values.
    let mut group_headers = HeaderAcc::default();
    for (name, value) in ctx.group_headers {
        group_headers.append(name, value);
    }

    let mut op_headers = HeaderAcc::default();
    for spec in &op.headers {
        match spec {
            HeaderSpec::Value { name, value } => op_headers.append(name, value),
            HeaderSpec::Arg(binding) => {
                if let Some(text) = resolve_text(binding, &op.name, ctx.args)? {
                    op_headers.append(&binding.wire, &text);
                }
            }
        }
    }

    let mut headers = group_headers;
    for (name, value) in op_headers.0 {
        headers.set(&name, &value);
    }
    for (name, value) in &ctx.overrides.headers {
        headers.set(name, value);
    }
    if let Some(accept) = &ctx.overrides.accept {
        headers.set("accept", accept);
    }
    if let Some(content) = &ctx.overrides.content {
        headers.set("content-type", content);
    }

    // 4. Payload: form fields, multipart parts, body.
    let mut form = Vec::new();
    for binding in &op.forms {
        if let Some(text) = resolve_text(binding, &op.name, ctx.args)? {
            form.push((binding.wire.clone(), text));
        }
    }
    merge_pairs(&mut form, &ctx.overrides.form, &op.name)?;

    let mut parts = Vec::new();
    for binding in &op.parts {
        if let Some(value) = ctx.args.get(&binding.arg).cloned().or(binding.default.clone()) {
            parts.push(to_part(&binding.wire, value));
        }
    }
    for (name, value) in &ctx.overrides.parts {
        parts.retain(|p: &Part| p.name != *name);
        parts.push(to_part(name, value.clone()));
    }

    let body_value = ctx
        .overrides
        .body
        .clone()
        .or_else(|| op.body.as_ref().and_then(|b| ctx.args.get(&b.arg).cloned()));

    if body_value.is_some() && (!form.is_empty() || !parts.is_empty()) {
        return Err(ConfigError::ConflictingBody {
            operation: op.name.clone(),
        }
        .into());
    }

    let payload = if !parts.is_empty() {
        // Form fields alongside multipart parts travel as text parts.
        for (name, value) in form {
            parts.push(Part {
                name,
                filename: None,
                content_type: None,
                data: Bytes::from(value.into_bytes()),
            });
        }
        Payload::Multipart(parts)
    } else if !form.is_empty() {
        Payload::Form(form)
    } else if let Some(value) = body_value {
        let body = match op.body.as_ref().and_then(|b| b.serializer.clone()) {
            Some(serializer) => serializer(value)?,
            None => default_body(value),
        };
        Payload::Body(body)
    } else {
        Payload::None
    };

    // 5. Content negotiation defaults.
    if !headers.contains("content-type") {
        if payload.is_form() {
            headers.set("content-type", "application/x-www-form-urlencoded");
        } else if !payload.is_multipart() {
            headers.set("content-type", "application/json");
        }
    }
    if !headers.contains("accept") {
        headers.set("accept", "application/json");
    }

    // 6. Auth headers.
    if let Some(auth) = ctx.auth {
        if let Some((name, value)) = auth.header() {
            headers.set(name, &value);
        }
        if let Some((name, value)) = auth.custom_header() {
            headers.set(name, value);
        }
    }

    let descriptor = RequestDescriptor {
        method: op.method,
        url,
        headers: headers.into_header_map()?,
        query,
        payload,
        timeout: ctx.timeout,
        stream: ctx.stream,
    };
    eprintln!("DEBUG-HDRS {:?}", descriptor.headers);
    debug!(method = %descriptor.method, url = %descriptor.url, "assembled request");
    Ok(descriptor)
}

/// Resolves a binding to its textual value: passed argument, else declared
/// default, else nothing.
fn resolve_text(
    binding: &Binding,
    operation: &str,
    args: &BTreeMap<String, ArgValue>,
) -> Result<Option<String>, Error> {
    let value = match args.get(&binding.arg).or(binding.default.as_ref()) {
        Some(v) => v,
        None => return Ok(None),
    };
    let text = value
        .as_text()
        .ok_or_else(|| ConfigError::UnrenderableArgument {
            operation: operation.to_string(),
            argument: binding.arg.clone(),
        })?;
    Ok(Some(text))
}

/// Merges per-call pairs over declared pairs: same wire name replaces, new
/// names append.
fn merge_pairs(
    pairs: &mut Vec<(String, String)>,
    overrides: &[(String, ArgValue)],
    operation: &str,
) -> Result<(), Error> {
    for (name, value) in overrides {
        let text = value
            .as_text()
            .ok_or_else(|| ConfigError::UnrenderableArgument {
                operation: operation.to_string(),
                argument: name.clone(),
            })?;
        pairs.retain(|(n, _)| n != name);
        pairs.push((name.clone(), text));
    }
    Ok(())
}

fn to_part(name: &str, value: ArgValue) -> Part {
    match value {
        ArgValue::File {
            filename,
            content,
            content_type,
        } => Part {
            name: name.to_string(),
            filename: Some(filename),
            content_type: Some(content_type),
            data: content,
        },
        ArgValue::Bytes(data) => Part {
            name: name.to_string(),
            filename: None,
            content_type: None,
            data,
        },
        other => Part {
            name: name.to_string(),
            filename: None,
            content_type: None,
            data: Bytes::from(other.as_text().unwrap_or_default().into_bytes()),
        },
    }
}

/// Identity-style body conversion used when no serializer is registered.
fn default_body(value: ArgValue) -> Body {
    match value {
        ArgValue::Json(v) => Body::Json(v),
        ArgValue::Str(s) => Body::Text(s),
        ArgValue::Bytes(b) => Body::Bytes(b),
        ArgValue::File { content, .. } => Body::Bytes(content),
        ArgValue::Int(i) => Body::Json(serde_json::Value::from(i)),
        ArgValue::Float(f) => Body::Json(serde_json::Value::from(f)),
        ArgValue::Bool(b) => Body::Json(serde_json::Value::from(b)),
    }
}

/// Joins an endpoint with a rendered path, urljoin-style: the endpoint is
/// treated as a directory and the path as relative to it.
fn join_endpoint(endpoint: &Url, path: &str) -> Result<Url, Error> {
    let mut base = endpoint.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(path).map_err(|source| {
        ConfigError::InvalidEndpoint {
            url: path.to_string(),
            source,
        }
        .into()
    })
}

/// Encodes form pairs as `application/x-www-form-urlencoded`.
pub(crate) fn encode_form(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}
