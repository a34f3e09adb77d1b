//! Locations relative to the executable
//!
//! Downloads and logs are kept next to the program rather than in a user
//! profile directory, so operators find the XML files beside the tool.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory containing the running executable, or the working directory
/// when that cannot be resolved.
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
}

/// Folder the browser downloads into
pub fn output_dir(output_dir_name: &str) -> PathBuf {
    output_dir_under(&executable_dir(), output_dir_name)
}

pub fn output_dir_under(base: &Path, output_dir_name: &str) -> PathBuf {
    base.join(output_dir_name)
}

/// Create the download folder if needed and return its absolute path.
/// Browsers ignore relative download directories.
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        info!("Created output directory: {}", dir.display());
    }
    std::path::absolute(dir).with_context(|| format!("Failed to resolve output directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_dir_is_under_base() {
        let base = Path::new("/opt/fetcher");
        assert_eq!(output_dir_under(base, "downloaded-xml"), PathBuf::from("/opt/fetcher/downloaded-xml"));
    }

    #[test]
    fn test_ensure_output_dir_creates_and_is_idempotent() {
        let base = TempDir::new().unwrap();
        let dir = output_dir_under(base.path(), "xml");

        let first = ensure_output_dir(&dir).unwrap();
        let second = ensure_output_dir(&dir).unwrap();

        assert!(first.is_absolute());
        assert!(dir.is_dir());
        assert_eq!(first, second);
    }
}
