use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// A buffered HTTP response, independent of the backend that produced it.
///
/// Handlers registered with `on` receive this type. Header names are stored
/// lowercased; lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    url: String,
}

impl Response {
    pub(crate) fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            url: String::new(),
        }
    }

    pub(crate) fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All response headers, names lowercased, in wire order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value for `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `content-type` value with any parameters stripped.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    /// The raw body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// The body decoded as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parses the body as a JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value, Error> {
        self.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = Response::new(
            200,
            vec![("x-request-id".to_string(), "abc".to_string())],
            Bytes::new(),
        );
        assert_eq!(resp.header("X-Request-Id"), Some("abc"));
        assert_eq!(resp.header("missing"), None);
    }

    #[test]
    fn content_type_strips_parameters() {
        let resp = Response::new(
            200,
            vec![(
                "content-type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            Bytes::new(),
        );
        assert_eq!(resp.content_type(), Some("application/json"));
    }

    #[test]
    fn json_deserializes_into_typed_value() {
        #[derive(serde::Deserialize)]
        struct Breed {
            name: String,
        }

        let resp = Response::new(200, Vec::new(), Bytes::from_static(br#"{"name":"hound"}"#));
        let breed: Breed = resp.json().unwrap();
        assert_eq!(breed.name, "hound");
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let resp = Response::new(200, Vec::new(), Bytes::from_static(b"not json"));
        let err = resp.json_value().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
