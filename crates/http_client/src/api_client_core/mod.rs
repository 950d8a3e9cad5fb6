// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[path = "reqwest.rs"]
pub mod implementation;

use bytes::Bytes;

pub use self::implementation::ApiClientCore as ApiClientCoreImpl;
use crate::error::HttpError;

/// A successful (< 400) response with its body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait ApiClientCore {
    /// Get (no body) or post (with body) to `url`. Statuses >= 400 are returned as
    /// [`HttpError::RequestError`] carrying the status. If `expected_content_type`
    /// is given, a mismatching response is an error too.
    async fn raw_request(
        &self,
        url: &str,
        body: Option<Bytes>,
        content_type: &'static str,
        headers: &[(String, String)],
        expected_content_type: Option<&'static str>,
    ) -> Result<RawResponse, HttpError>;
}

#[async_trait::async_trait]
impl ApiClientCore for ApiClientCoreImpl {
    async fn raw_request(
        &self,
        url: &str,
        body: Option<Bytes>,
        content_type: &'static str,
        headers: &[(String, String)],
        expected_content_type: Option<&'static str>,
    ) -> Result<RawResponse, HttpError> {
        self.raw_request(url, body, content_type, headers, expected_content_type)
            .await
    }
}

pub mod test_utils {
    use super::*;

    use std::pin::Pin;

    type ResultFuture = dyn futures::Future<Output = Result<RawResponse, HttpError>> + Send;
    type Responder = dyn (Fn(String, Option<Bytes>, Vec<(String, String)>) -> Pin<Box<ResultFuture>>)
        + Send
        + Sync;

    /// Mock `ApiClientCore` that holds a closure that can respond to requests with fake responses, or errors.
    ///
    /// ```rust
    /// use futures::FutureExt;
    ///
    /// use http_client::{BaseApiClient, HttpError, RawResponse};
    /// use http_client::test_utils::ApiClientCoreMock;
    ///
    /// let mock = ApiClientCoreMock::from(|url: String, _body, _headers| {
    ///     // note the `async { ... }.boxed()`!
    ///     async {
    ///         if url.contains("coffee") {
    ///             Err(HttpError::RequestError {
    ///                 ctx: url,
    ///                 status: Some(418),
    ///                 source: "i'm a teapot".into(),
    ///             })
    ///         } else {
    ///             tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    ///             Ok(RawResponse::ok("\"earl grey, hot\""))
    ///         }
    ///     }.boxed()
    /// });
    /// let client = BaseApiClient::from(mock);
    ///
    /// // use the mocked client as desired
    /// let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    /// rt.block_on(async {
    ///     client.json_get::<String>("example.com/tea", &[]).await.unwrap();
    ///     client.json_get::<String>("example.com/coffee", &[]).await.unwrap_err();
    /// });
    /// ```
    pub struct ApiClientCoreMock {
        responder: Box<Responder>,
    }

    #[async_trait::async_trait]
    impl ApiClientCore for ApiClientCoreMock {
        async fn raw_request(
            &self,
            url: &str,
            body: Option<Bytes>,
            _content_type: &'static str,
            headers: &[(String, String)],
            _expected_content_type: Option<&'static str>,
        ) -> Result<RawResponse, HttpError> {
            (self.responder)(url.into(), body, headers.into()).await
        }
    }

    impl<
            F: Fn(String, Option<Bytes>, Vec<(String, String)>) -> Pin<Box<ResultFuture>>
                + Send
                + Sync
                + 'static,
        > From<F> for ApiClientCoreMock
    {
        fn from(value: F) -> Self {
            Self {
                responder: Box::new(value),
            }
        }
    }
}
