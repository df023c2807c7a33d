//! Call-argument values bound into requests.
//!
//! An [`ArgValue`] is the value side of a named call argument. The request
//! builder renders it into whatever slot the operation's bindings assign it
//! to: a path segment, a query parameter, a header, a form field, a
//! multipart part or the request body.

use bytes::Bytes;

/// A value passed for a named call argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// A plain string value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A structured JSON value, typically used for bodies.
    Json(serde_json::Value),
    /// Raw bytes, typically used for bodies or multipart parts.
    Bytes(Bytes),
    /// A named file part for multipart requests.
    File {
        /// File name reported in the part headers.
        filename: String,
        /// Part content.
        content: Bytes,
        /// MIME type of the part.
        content_type: String,
    },
}

impl ArgValue {
    /// Creates a file part value for a multipart binding.
    pub fn file(
        filename: impl Into<String>,
        content: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        Self::File {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }

    /// Renders the value as text for path, query, header and form slots.
    ///
    /// File parts have no textual form and return `None`.
    pub(crate) fn as_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Json(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Json(v) => Some(v.to_string()),
            Self::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Self::File { .. } => None,
        }
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Bytes> for ArgValue {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}
