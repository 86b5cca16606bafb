//! Storage key generation.
//!
//! Keys look like `<unix millis>_<8 random hex chars>_<file name>`: sortable
//! by upload time, unique even for two uploads of the same file in the same
//! millisecond, and still recognizable when browsing the bucket.

use crate::error::{ErrorKind, Result};
use time::UtcDateTime;

const RANDOM_LEN: usize = 8;

/// The last path component of a user-supplied file name.
///
/// Browsers and some clients send full paths, with either separator.
pub fn basename(filename: &str) -> Result<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename).trim();
    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        exn::bail!(ErrorKind::InvalidFilename(filename.to_string()));
    }
    Ok(name)
}

/// Generate a storage key for `filename` uploaded at `at`.
pub fn storage_key(filename: &str, at: UtcDateTime) -> Result<String> {
    let name = basename(filename)?;
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    let random = uuid::Uuid::new_v4().simple().to_string();
    Ok(format!("{millis}_{}_{name}", &random[..RANDOM_LEN]))
}

/// Whether `key` has the shape [`storage_key()`] generates.
///
/// Anything else in the blob store was not put there by an upload.
pub fn is_storage_key(key: &str) -> bool {
    let mut parts = key.splitn(3, '_');
    let (Some(millis), Some(random), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && random.len() == RANDOM_LEN
        && random.bytes().all(|b| b.is_ascii_hexdigit())
        && basename(name).is_ok_and(|base| base == name)
}
