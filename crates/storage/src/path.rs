//! Storage key validation.
//!
//! Keys are generated from user-supplied file names, so every backend runs
//! them through [`validate`] before touching the filesystem or the network.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage key and returns its normalized form.
///
/// A key must stay inside the storage root (`..` may never climb above it),
/// must not contain NUL bytes, and must not normalize to nothing.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use revisit_storage::validate_path;
/// // Valid keys
/// assert!(validate_path("1767225600000_a1b2c3d4_notes.pdf").is_ok());
/// assert!(validate_path("archive/2025/notes.pdf").is_ok());
/// // Invalid keys
/// assert!(validate_path("../notes.pdf").is_err());
/// assert!(validate_path("a\0b.pdf").is_err());
/// assert!(validate_path("./").is_err());
/// // Keys get normalized
/// assert_eq!(
///     validate_path("/archive/./old/../notes.pdf").unwrap(),
///     Path::new("archive/notes.pdf")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            // NUL bytes survive Path::components() on Unix but truncate
            // C-based syscalls.
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(s) => components.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(
            validate("1767225600000_a1b2c3d4_Organic Chemistry.pdf").unwrap(),
            Path::new("1767225600000_a1b2c3d4_Organic Chemistry.pdf")
        );
        assert_eq!(validate("semester-1/notes.pdf").unwrap(), Path::new("semester-1/notes.pdf"));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b/./c.pdf").unwrap(), Path::new("a/b/c.pdf"));
        assert_eq!(validate("/rooted.pdf").unwrap(), Path::new("rooted.pdf"));
        assert_eq!(validate("a/b/..").unwrap(), Path::new("a"));
        assert_eq!(validate("notes.pdf/").unwrap(), Path::new("notes.pdf"));
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_nul_rejected() {
        let err = validate("a\0b").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
    }
}
