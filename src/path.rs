//! Path grammar accepted by [`BucketFs`](crate::BucketFs).
//!
//! Paths are unrooted, slash-separated and case-sensitive. `"."` names the
//! bucket root; every other valid path is an exact object key.

use crate::errors::{FsError, FsResult};

/// The path of the bucket root.
pub const ROOT: &str = ".";

/// Reports whether `name` is a valid path.
///
/// Rejects the empty string, leading or trailing slashes, empty segments,
/// and `.` or `..` segments. `"."` on its own is the only exception.
pub fn valid_path(name: &str) -> bool {
    if name == ROOT {
        return true;
    }
    !name.is_empty() && name.split('/').all(|seg| !matches!(seg, "" | "." | ".."))
}

pub(crate) fn ensure_valid(name: &str) -> FsResult<()> {
    if valid_path(name) {
        Ok(())
    } else {
        Err(FsError::InvalidPath(name.to_string()))
    }
}
