// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("while {ctx}: {status_wrap}: {source}", status_wrap=StatusWrapper(*status))]
    RequestError {
        ctx: String,
        /// The HTTP status code of the error, or `None` if the request never got a response.
        status: Option<u16>,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("decoding {decoding}: {source}")]
    DecodeError {
        decoding: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl HttpError {
    /// The response status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::RequestError { status, .. } => *status,
            HttpError::DecodeError { .. } => None,
        }
    }

    /// True if the request failed before any response was observed.
    pub fn is_transport(&self) -> bool {
        matches!(self, HttpError::RequestError { status: None, .. })
    }
}

struct StatusWrapper(Option<u16>);

impl std::fmt::Display for StatusWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => f.write_str("no status"),
            Some(status) => write!(f, "status: {status}"),
        }
    }
}
