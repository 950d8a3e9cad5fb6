// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of trials each benchmark case runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCount(pub usize);

/// `per_page` value used by the page-size stress cases.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize(pub u32);

const DEFAULT_SAMPLE_COUNT: SampleCount = SampleCount(5);

// The API under test rejects anything above this.
const MAX_PAGE_SIZE: PageSize = PageSize(5000);
const DEFAULT_PAGE_SIZE: PageSize = PageSize(500);

impl SampleCount {
    pub fn get_default() -> SampleCount {
        DEFAULT_SAMPLE_COUNT
    }
}

impl PageSize {
    pub fn get_default() -> PageSize {
        DEFAULT_PAGE_SIZE
    }

    pub fn is_valid(&self) -> bool {
        (1..=MAX_PAGE_SIZE.0).contains(&self.0)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role a request is issued as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Admin,
    RegularUser,
}

impl PrincipalKind {
    /// Fragment used in case names, e.g. "as admin".
    pub fn context(&self) -> &'static str {
        match self {
            PrincipalKind::Admin => "as admin",
            PrincipalKind::RegularUser => "as regular user",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrincipalKind::Admin => "admin",
            PrincipalKind::RegularUser => "regular user",
        })
    }
}

/// Which configured timeout a case runs under.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BudgetKind {
    Basic,
    Long,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_bounds() {
        assert!(PageSize::get_default().is_valid());
        assert!(PageSize(5000).is_valid());
        assert!(!PageSize(0).is_valid());
        assert!(!PageSize(5001).is_valid());
    }

    #[test]
    fn principal_kinds_deserialize_from_snake_case() {
        let kind: PrincipalKind = serde_json::from_str("\"regular_user\"").unwrap();
        assert_eq!(kind, PrincipalKind::RegularUser);
        assert_eq!(kind.context(), "as regular user");
    }
}
