//! Object path validation.
//!
//! Object paths are `/`-separated keys relative to a bucket root. This module
//! normalizes them and rejects anything that could escape the bucket.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an object path.
///
/// Empty segments and `.` are dropped, `..` pops the previous segment and may
/// never climb above the bucket root. Null bytes and backslashes are
/// rejected outright.
///
/// # Examples
///
/// ```
/// use docshelf_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("user/1700000000000_invoice.pdf").is_ok());
/// assert!(validate_path("a/../file.pdf").is_ok()); // (never leaves bucket root)
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\\b").is_err());
/// // Paths get resolved
/// assert_eq!(validate_path("/user//./scan.png/").unwrap(), "user/scan.png");
/// ```
pub fn validate(path: impl AsRef<str>) -> Result<String> {
    let raw = path.as_ref();
    if raw.contains('\0') || raw.contains('\\') {
        exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
                }
            },
            normal => segments.push(normal),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
        false => Ok(segments.join("/")),
    }
}
