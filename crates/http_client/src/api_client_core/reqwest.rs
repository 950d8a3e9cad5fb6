// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use tracing::debug;

use super::RawResponse;
use crate::error::HttpError;

/// Bodies of failed responses are cut to this many bytes in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct ApiClientCore {
    client: reqwest::Client, // cheaply cloneable (Arc<...> internally), see docs
}

impl ApiClientCore {
    /// Construct a client without a cookie store, so that no session state
    /// survives between requests made under different principals.
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::ClientBuilder::new()
            .build()
            .map_err(|e| HttpError::RequestError {
                ctx: "building http client".to_owned(),
                status: None,
                source: Box::new(e),
            })?;
        Ok(Self { client })
    }

    /// Get or post a given body to a given url with a given content type, and optional extra headers.
    /// The whole response body is read before this returns.
    pub(crate) async fn raw_request(
        &self,
        url: &str,
        body: Option<Bytes>,
        content_type: &'static str,
        header_iter: &[(String, String)],
        expected_content_type: Option<&'static str>,
    ) -> Result<RawResponse, HttpError> {
        let mut rb = match body {
            Some(b) => self
                .client
                .post(url)
                .body(b)
                .header(CONTENT_TYPE, content_type),
            None => self.client.get(url),
        };

        for (key, value) in header_iter {
            rb = rb.header(key, value)
        }

        debug!("http_client: requesting {url}");

        let response = rb.send().await.map_err(|e| HttpError::RequestError {
            ctx: format!("requesting {url}"),
            status: None,
            source: Box::new(e),
        })?;

        let status = response.status();
        debug!("http_client: response from {url:?}: {status}");

        let content_type_err = expected_content_type
            .and_then(|expected| check_content_type(response.headers(), expected).err());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HttpError::RequestError {
                ctx: format!("reading response body from {url}"),
                status: Some(status.as_u16()),
                source: Box::new(e),
            })?;

        let failure = if status.is_client_error() || status.is_server_error() {
            Some(format!("{status}: {}", truncated_text(&bytes)))
        } else {
            content_type_err.map(|err| format!("{status}: {err}: {}", truncated_text(&bytes)))
        };

        match failure {
            Some(msg) => Err(HttpError::RequestError {
                ctx: format!("requesting {url}"),
                status: Some(status.as_u16()),
                source: msg.into(),
            }),
            None => Ok(RawResponse {
                status: status.as_u16(),
                body: bytes,
            }),
        }
    }
}

fn check_content_type(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let actual = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    // ignore parameters such as `; charset=utf-8`
    let mime = actual.split(';').next().unwrap_or_default().trim();
    if mime.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(format!("expected content type {expected:?}, got {actual:?}"))
    }
}

fn truncated_text(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_ERROR_BODY);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
