//! Adapters for the `reqwest` backend.
//!
//! `reqwest` covers both execution modes: [`ReqwestTransport`] wraps the
//! blocking client, [`ReqwestAsyncTransport`] the asynchronous one. Both
//! reduce responses to the backend-independent [`Response`] type.

use crate::error::{Error, HttpError};
use crate::request::{encode_form, Part, Payload, RequestDescriptor};
use crate::response::Response;

fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

pub(crate) struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub(crate) fn new() -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(HttpError::transport)?;
        Ok(Self { client })
    }

    /// The underlying blocking client, for advanced customization.
    pub(crate) fn client(&self) -> &reqwest::blocking::Client {
        &self.client
    }

    pub(crate) fn send(&self, req: &RequestDescriptor) -> Result<Response, Error> {
        let mut rb = self
            .client
            .request(req.method().to_reqwest(), req.url().clone())
            .headers(req.headers().clone());
        if !req.query().is_empty() {
            rb = rb.query(req.query());
        }
        rb = match req.payload() {
            Payload::None => rb,
            Payload::Body(body) => rb.body(body.to_bytes()),
            // The descriptor's content-type already reflects any explicit
            // override, so forms go out as pre-encoded bytes.
            Payload::Form(pairs) => rb.body(encode_form(pairs)),
            Payload::Multipart(parts) => rb.multipart(blocking_form(parts)?),
        };
        if let Some(timeout) = req.timeout() {
            rb = rb.timeout(timeout);
        }

        let response = rb.send().map_err(HttpError::transport)?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = header_pairs(response.headers());
        let body = response.bytes().map_err(HttpError::transport)?;
        Ok(Response::new(status, headers, body).with_url(url))
    }
}

fn blocking_form(parts: &[Part]) -> Result<reqwest::blocking::multipart::Form, Error> {
    let mut form = reqwest::blocking::multipart::Form::new();
    for part in parts {
        let mut p = reqwest::blocking::multipart::Part::bytes(part.data.to_vec());
        if let Some(filename) = &part.filename {
            p = p.file_name(filename.clone());
        }
        if let Some(content_type) = &part.content_type {
            p = p.mime_str(content_type).map_err(HttpError::transport)?;
        }
        form = form.part(part.name.clone(), p);
    }
    Ok(form)
}

pub(crate) struct ReqwestAsyncTransport {
    client: reqwest::Client,
}

impl ReqwestAsyncTransport {
    pub(crate) fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(HttpError::transport)?;
        Ok(Self { client })
    }

    /// The underlying async client, for advanced customization.
    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) async fn send(&self, req: &RequestDescriptor) -> Result<Response, Error> {
        let mut rb = self
            .client
            .request(req.method().to_reqwest(), req.url().clone())
            .headers(req.headers().clone());
        if !req.query().is_empty() {
            rb = rb.query(req.query());
        }
        rb = match req.payload() {
            Payload::None => rb,
            Payload::Body(body) => rb.body(body.to_bytes()),
            Payload::Form(pairs) => rb.body(encode_form(pairs)),
            Payload::Multipart(parts) => rb.multipart(async_form(parts)?),
        };
        if let Some(timeout) = req.timeout() {
            rb = rb.timeout(timeout);
        }

        let response = rb.send().await.map_err(HttpError::transport)?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = header_pairs(response.headers());
        let body = response.bytes().await.map_err(HttpError::transport)?;
        Ok(Response::new(status, headers, body).with_url(url))
    }
}

fn async_form(parts: &[Part]) -> Result<reqwest::multipart::Form, Error> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        let mut p = reqwest::multipart::Part::bytes(part.data.to_vec());
        if let Some(filename) = &part.filename {
            p = p.file_name(filename.clone());
        }
        if let Some(content_type) = &part.content_type {
            p = p.mime_str(content_type).map_err(HttpError::transport)?;
        }
        form = form.part(part.name.clone(), p);
    }
    Ok(form)
}
