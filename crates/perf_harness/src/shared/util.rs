// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

/* Utility functions */

pub fn create_results_dir(base: &Path, timestamp: u64) -> std::io::Result<PathBuf> {
    let path = base.join(timestamp.to_string());
    info!("Creating results dir: {}", path.display());
    fs::create_dir_all(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_dir_is_named_by_timestamp() {
        let base = tempfile::tempdir().unwrap();
        let dir = create_results_dir(base.path(), 1_700_000_000).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.file_name().unwrap(), "1700000000");
    }
}
