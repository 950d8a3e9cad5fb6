// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::sync::Arc;

use crate::api_client_core::{ApiClientCore, ApiClientCoreImpl, RawResponse};
use crate::error::HttpError;

const JSON_MIME_TYPE: &str = "application/json";
const FORM_MIME_TYPE: &str = "application/x-www-form-urlencoded";

/// Helper for querying the API under test and its token issuer
#[derive(Clone)]
pub struct BaseApiClient {
    // 99% of the time this is going to be ApiClientCoreImpl, but it's overrideable for mocking purposes
    core: Arc<dyn ApiClientCore + Send + Sync>,
}

impl<Core: ApiClientCore + Send + Sync + 'static> From<Core> for BaseApiClient {
    fn from(core: Core) -> Self {
        Self {
            core: Arc::new(core),
        }
    }
}

impl BaseApiClient {
    /// Construct a client backed by reqwest.
    pub fn new() -> Result<Self, HttpError> {
        Ok(ApiClientCoreImpl::new()?.into())
    }

    /// Plain GET. The body is read completely before returning. Returns error for >=400 status.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<RawResponse, HttpError> {
        self.core.raw_request(url, None, "", headers, None).await
    }

    /// Get JSON. Returns error for >=400 status.
    pub async fn json_get<O: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<O, HttpError> {
        let response = self
            .core
            .raw_request(url, None, "", headers, Some(JSON_MIME_TYPE))
            .await?;
        decode_json(url, response)
    }

    /// Post a urlencoded form, get JSON. Returns error for >=400 status.
    pub async fn form_json_post<O: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(String, String)],
    ) -> Result<O, HttpError> {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let response = self
            .core
            .raw_request(
                url,
                Some(body.into()),
                FORM_MIME_TYPE,
                headers,
                Some(JSON_MIME_TYPE),
            )
            .await?;
        decode_json(url, response)
    }
}

impl fmt::Debug for BaseApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseApiClient").finish_non_exhaustive()
    }
}

fn decode_json<O: serde::de::DeserializeOwned>(
    url: &str,
    response: RawResponse,
) -> Result<O, HttpError> {
    serde_json::from_slice(&response.body).map_err(|e| {
        let error_text = format_serde_error_from_bytes(response.body.to_vec(), e);
        HttpError::DecodeError {
            decoding: format!("json from {url}"),
            source: error_text.into(),
        }
    })
}

fn format_serde_error_from_bytes(
    bytes: Vec<u8>,
    e: impl Into<format_serde_error::ErrorTypes>,
) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => format_serde_error::SerdeError::new(text, e).to_string(),
        Err(err) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::FutureExt;
    use serde::Deserialize;

    use super::*;
    use crate::test_utils::ApiClientCoreMock;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Token {
        access_token: String,
    }

    #[tokio::test]
    async fn form_post_encodes_pairs() {
        let seen = Arc::new(Mutex::new(None));
        let seen_by_mock = seen.clone();
        let client = BaseApiClient::from(ApiClientCoreMock::from(
            move |_url: String, body: Option<bytes::Bytes>, _headers| {
                *seen_by_mock.lock().unwrap() = body;
                async { Ok(RawResponse::ok(r#"{"access_token":"abc"}"#)) }.boxed()
            },
        ));

        let token: Token = client
            .form_json_post(
                "http://uaa.example.com/oauth/token",
                &[("grant_type", "password"), ("username", "a b&c")],
                &[],
            )
            .await
            .unwrap();

        assert_eq!(token.access_token, "abc");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(&body[..], b"grant_type=password&username=a+b%26c");
    }

    #[tokio::test]
    async fn json_decode_errors_name_the_url() {
        let client = BaseApiClient::from(ApiClientCoreMock::from(|_url: String, _body, _headers| {
            async { Ok(RawResponse::ok("not json")) }.boxed()
        }));

        let err = client
            .json_get::<Token>("http://api.example.com/v3/service_plans", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::DecodeError { .. }));
        assert!(err.to_string().contains("/v3/service_plans"));
    }

    #[tokio::test]
    async fn headers_reach_the_core() {
        let client = BaseApiClient::from(ApiClientCoreMock::from(
            |_url: String, _body, headers: Vec<(String, String)>| {
                async move {
                    assert!(headers.contains(&("Authorization".into(), "bearer t".into())));
                    Ok(RawResponse::ok(""))
                }
                .boxed()
            },
        ));

        let response = client
            .get(
                "http://api.example.com/",
                &[("Authorization".into(), "bearer t".into())],
            )
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }
}
