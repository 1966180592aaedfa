//! Utility functions for path sanitization and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Path segment sanitization for archive directory and file names
//! - File system validation for the result directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Everything outside word characters, `-` and `.` gets replaced.
static HOSTILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-.]").unwrap());

/// Convert an arbitrary string into a filesystem-legal path segment.
///
/// Replaces every character outside {word, `-`, `.`} with `_`. Path
/// separators, spaces, colons and the like all collapse to underscores, so
/// the output can never escape its parent directory. Pure and
/// deterministic.
///
/// Distinct inputs can collide on the same output (`"a/b"` and `"a_b"`
/// both map to `"a_b"`); archives accept that risk in exchange for
/// portable names.
///
/// # Arguments
///
/// * `s` - The string to sanitize, typically a feed title, guid, or URL
///   path segment
///
/// # Returns
///
/// A string safe to use as a single path component on any host filesystem.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_segment("Ep 1"), "Ep_1");
/// assert_eq!(sanitize_segment("a/b:c"), "a_b_c");
/// assert_eq!(sanitize_segment("cover.jpg"), "cover.jpg");
/// ```
pub fn sanitize_segment(s: &str) -> String {
    HOSTILE_CHARS.replace_all(s, "_").into_owned()
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Arguments
///
/// * `path` - The directory path to validate
///
/// # Returns
///
/// `Ok(())` if the directory exists and is writable, or an error describing
/// the failure.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join(".__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Result directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
