// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod case;
pub mod executor;
pub mod fixtures;
pub mod identity;
pub mod recorder;
pub mod request;
pub mod suite;
