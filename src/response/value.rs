use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::Response;
use crate::error::Error;

/// The result of a dispatched call after response mapping.
///
/// Status handlers may produce any variant; the default policy produces
/// [`Json`](Self::Json), [`Bytes`](Self::Bytes), [`Text`](Self::Text) or
/// [`Empty`](Self::Empty) depending on the response content type.
#[derive(Debug, Clone)]
pub enum ResponseValue {
    /// A parsed JSON body.
    Json(serde_json::Value),
    /// A textual body.
    Text(String),
    /// A binary body.
    Bytes(Bytes),
    /// The raw response, untouched by any parsing policy.
    Raw(Response),
    /// No body.
    Empty,
}

impl ResponseValue {
    /// The parsed JSON value, if this is a JSON result.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The text content, if this is a textual result.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The binary content, if this is a bytes result.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The raw response, if one was carried through.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Raw(r) => Some(r),
            _ => None,
        }
    }

    /// Whether the call produced no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Deserializes the carried value into `T`.
    ///
    /// Works for JSON, text and bytes variants; raw and empty results
    /// cannot be decoded.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        use serde::de::Error as _;

        match self {
            Self::Json(v) => Ok(serde_json::from_value(v.clone()).map_err(Error::Decode)?),
            Self::Text(t) => Ok(serde_json::from_str(t)?),
            Self::Bytes(b) => Ok(serde_json::from_slice(b)?),
            Self::Raw(_) | Self::Empty => Err(Error::Decode(serde_json::Error::custom(
                "response value carries no decodable body",
            ))),
        }
    }
}

/// Content types treated as JSON by the default policy.
fn is_json(content_type: &str) -> bool {
    content_type == "application/json" || content_type.ends_with("+json")
}

/// Content types treated as binary by the default policy.
fn is_binary(content_type: &str) -> bool {
    content_type == "application/octet-stream"
        || content_type.starts_with("image/")
        || content_type.starts_with("audio/")
        || content_type.starts_with("video/")
}

/// Default response policy applied when no handler matched.
pub(crate) fn default_policy(response: Response) -> Result<ResponseValue, Error> {
    if response.bytes().is_empty() {
        return Ok(ResponseValue::Empty);
    }

    match response.content_type() {
        Some(ct) if is_json(ct) => Ok(ResponseValue::Json(response.json_value()?)),
        Some(ct) if is_binary(ct) => Ok(ResponseValue::Bytes(response.bytes().clone())),
        _ => Ok(ResponseValue::Text(response.text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_from_json_variant() {
        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct Pet {
            id: u64,
        }

        let value = ResponseValue::Json(serde_json::json!({"id": 7}));
        assert_eq!(value.decode::<Pet>().unwrap(), Pet { id: 7 });
    }

    #[test]
    fn decode_from_text_variant() {
        let value = ResponseValue::Text(r#"{"id": 7}"#.to_string());
        let parsed: serde_json::Value = value.decode().unwrap();
        assert_eq!(parsed["id"], 7);
    }

    #[test]
    fn empty_cannot_be_decoded() {
        let err = ResponseValue::Empty.decode::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn json_suffix_content_types_are_json() {
        assert!(is_json("application/json"));
        assert!(is_json("application/problem+json"));
        assert!(!is_json("text/plain"));
    }
}
