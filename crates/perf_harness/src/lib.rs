// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod analyzer;
pub mod catalog;
pub mod error;
pub mod harness;
pub mod shared;
