// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use uuid::Uuid;

/// A unique per-request ID sent as an HTTP header, so a single measured
/// request can be found again in the logs of the server under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub const FIELD: &'static str = "X-Request-ID";

    pub fn new_unique() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new_unique_with_prefix(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Self::new_unique()))
    }

    /// The `(name, value)` pair expected by [`crate::BaseApiClient`] header lists.
    pub fn header(&self) -> (String, String) {
        (Self::FIELD.to_owned(), self.0.clone())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
