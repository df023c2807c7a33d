//! Adapter for the `ureq` backend.
//!
//! Synchronous only. Status codes are surfaced as data, never as transport
//! errors, so the response mapper owns all status interpretation.

use bytes::Bytes;

use super::BackendKind;
use crate::error::{ConfigError, Error, HttpError};
use crate::method::HttpMethod;
use crate::request::{encode_form, Payload, RequestDescriptor};
use crate::response::Response;

pub(crate) struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub(crate) fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// The underlying agent, for advanced per-session customization.
    pub(crate) fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    pub(crate) fn send(&self, req: &RequestDescriptor) -> Result<Response, Error> {
        let url = req.full_url();

        let body: Option<Vec<u8>> = match req.payload() {
            Payload::None => None,
            Payload::Body(b) => Some(b.to_bytes()),
            Payload::Form(pairs) => Some(encode_form(pairs).into_bytes()),
            Payload::Multipart(_) => {
                return Err(ConfigError::Unsupported {
                    backend: BackendKind::Ureq,
                    capability: "multipart payloads",
                }
                .into())
            }
        };

        let result = match req.method() {
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                let mut rb = match req.method() {
                    HttpMethod::Post => self.agent.post(url.as_str()),
                    HttpMethod::Put => self.agent.put(url.as_str()),
                    _ => self.agent.patch(url.as_str()),
                };
                for (name, value) in req.headers() {
                    rb = rb.header(name.as_str(), value.to_str().unwrap_or_default());
                }
                if let Some(timeout) = req.timeout() {
                    rb = rb.config().timeout_global(Some(timeout)).build();
                }
                match body {
                    Some(bytes) => rb.send(&bytes[..]),
                    None => rb.send_empty(),
                }
            }
            _ => {
                let mut rb = match req.method() {
                    HttpMethod::Get => self.agent.get(url.as_str()),
                    HttpMethod::Delete => self.agent.delete(url.as_str()),
                    HttpMethod::Head => self.agent.head(url.as_str()),
                    _ => self.agent.options(url.as_str()),
                };
                for (name, value) in req.headers() {
                    rb = rb.header(name.as_str(), value.to_str().unwrap_or_default());
                }
                if let Some(timeout) = req.timeout() {
                    rb = rb.config().timeout_global(Some(timeout)).build();
                }
                match body {
                    // Verbs without a natural body still honor one when a
                    // binding supplied it.
                    Some(bytes) => rb.force_send_body().send(&bytes[..]),
                    None => rb.call(),
                }
            }
        };

        let mut response = result.map_err(HttpError::transport)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(HttpError::transport)?;

        Ok(Response::new(status, headers, Bytes::from(body)).with_url(url))
    }
}
