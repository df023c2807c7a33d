//! Response handling.
//!
//! A backend adapter reduces whatever its library returned to a raw
//! [`Response`]. The response mapper then picks a registered status handler
//! (exact code first, then the `Any` wildcard) or falls back to the default
//! policy: JSON bodies parse to [`ResponseValue::Json`], binary content
//! types yield [`ResponseValue::Bytes`], anything else comes back as text,
//! and unhandled error statuses raise the wrapped HTTP error.

mod raw;
mod value;

pub use raw::Response;
pub use value::ResponseValue;

use crate::error::{Error, HttpError};
use crate::metadata::{lookup_handler, Handler, StatusRule};

/// Applies the handler table to a raw response.
pub(crate) fn map_response(
    handlers: &[(StatusRule, Handler)],
    response: Response,
    stream: bool,
) -> Result<ResponseValue, Error> {
    if let Some(handler) = lookup_handler(handlers, response.status()) {
        return handler(response);
    }

    // A streamed call without a handler hands the raw response back.
    if stream {
        return Ok(ResponseValue::Raw(response));
    }

    if !response.is_success() {
        return Err(HttpError::Status {
            status: response.status(),
            url: response.url().to_string(),
            response,
        }
        .into());
    }

    value::default_policy(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::metadata::StatusRule;

    fn json_response(status: u16, body: &str) -> Response {
        Response::new(
            status,
            vec![("content-type".to_string(), "application/json".to_string())],
            Bytes::copy_from_slice(body.as_bytes()),
        )
    }

    #[test]
    fn exact_handler_runs_for_matching_status() {
        let handlers: Vec<(StatusRule, Handler)> = vec![
            (
                StatusRule::Code(200),
                Arc::new(|r: Response| Ok(ResponseValue::Json(r.json_value()?))),
            ),
            (
                StatusRule::Any,
                Arc::new(|_| Ok(ResponseValue::Text("fallback".into()))),
            ),
        ];

        let ok = map_response(&handlers, json_response(200, r#"{"a":1}"#), false).unwrap();
        assert_eq!(ok.as_json().unwrap()["a"], 1);

        let other = map_response(&handlers, json_response(404, "{}"), false).unwrap();
        assert_eq!(other.as_text(), Some("fallback"));
    }

    #[test]
    fn unhandled_error_status_raises_wrapped_error() {
        let handlers: Vec<(StatusRule, Handler)> = vec![(
            StatusRule::Code(200),
            Arc::new(|_| Ok(ResponseValue::Empty)),
        )];

        let err = map_response(&handlers, json_response(500, "boom"), false).unwrap_err();
        match err {
            Error::Http(http) => {
                assert_eq!(http.status(), Some(500));
                assert!(http.response().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_policy_parses_json() {
        let value = map_response(&[], json_response(200, r#"{"ok":true}"#), false).unwrap();
        assert_eq!(value.as_json().unwrap()["ok"], true);
    }

    #[test]
    fn default_policy_returns_text_for_plain_bodies() {
        let resp = Response::new(
            200,
            vec![("content-type".to_string(), "text/plain".to_string())],
            Bytes::from_static(b"hello"),
        );
        let value = map_response(&[], resp, false).unwrap();
        assert_eq!(value.as_text(), Some("hello"));
    }

    #[test]
    fn default_policy_returns_bytes_for_binary_bodies() {
        let resp = Response::new(
            200,
            vec![(
                "content-type".to_string(),
                "application/octet-stream".to_string(),
            )],
            Bytes::from_static(&[0, 1, 2]),
        );
        let value = map_response(&[], resp, false).unwrap();
        assert_eq!(value.as_bytes().unwrap().as_ref(), &[0, 1, 2]);
    }

    #[test]
    fn empty_body_maps_to_empty() {
        let resp = Response::new(204, Vec::new(), Bytes::new());
        let value = map_response(&[], resp, false).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn stream_returns_raw_response_without_handler() {
        let value = map_response(&[], json_response(200, r#"{"a":1}"#), true).unwrap();
        match value {
            ResponseValue::Raw(resp) => assert_eq!(resp.status(), 200),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
