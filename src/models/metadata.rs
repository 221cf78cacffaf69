//! Filesystem metadata built from backend attributes.
//!
//! Three constructors cover the three attribute shapes a backend reports:
//! the bucket itself, an object stream opened by exact key, and an object
//! seen during enumeration. They differ on purpose:
//!
//! - an opened file keeps the caller-supplied path as its name and takes its
//!   modification time from the stream's last-modified field;
//! - a listed object is named by the last segment of its key and reports the
//!   later of its creation and deletion times.
//!
//! All times are truncated to whole seconds.

use super::{BucketAttrs, ObjectAttrs, ReaderObjectAttrs};
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;

/// Permission and type bits of a [`FileInfo`].
///
/// Only two values are ever produced: [`FileMode::REGULAR`] (no bits set)
/// and [`FileMode::DIR`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    /// A regular file with no special bits.
    pub const REGULAR: FileMode = FileMode(0);

    /// The directory type bit.
    pub const DIR: FileMode = FileMode(1 << 31);

    pub fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }

    /// The type bits only, with permissions masked off.
    pub fn file_type(self) -> FileMode {
        FileMode(self.0 & Self::DIR.0)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() { 'd' } else { '-' };
        write!(f, "{}---------", kind)
    }
}

/// The backend attributes a [`FileInfo`] was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sys {
    Bucket(BucketAttrs),
    Reader(ReaderObjectAttrs),
    Object(ObjectAttrs),
}

/// Metadata describing the bucket root or one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    size: u64,
    mode: FileMode,
    modified: DateTime<Utc>,
    sys: Sys,
}

impl FileInfo {
    /// Directory metadata for the bucket root.
    ///
    /// Size is always zero: bucket size is not aggregated.
    pub(crate) fn from_bucket(attrs: BucketAttrs) -> Self {
        let name = if attrs.name.is_empty() {
            crate::path::ROOT.to_string()
        } else {
            attrs.name.clone()
        };
        Self {
            name,
            size: 0,
            mode: FileMode::DIR,
            modified: truncate_to_secs(attrs.created),
            sys: Sys::Bucket(attrs),
        }
    }

    /// File metadata for a stream opened at `name`.
    pub(crate) fn from_reader(name: &str, attrs: ReaderObjectAttrs) -> Self {
        Self {
            name: name.to_string(),
            size: attrs.size,
            mode: FileMode::REGULAR,
            modified: truncate_to_secs(attrs.last_modified),
            sys: Sys::Reader(attrs),
        }
    }

    /// File metadata for an object produced by enumeration.
    pub(crate) fn from_listing(attrs: ObjectAttrs) -> Self {
        let modified = match attrs.deleted {
            Some(deleted) if deleted > attrs.created => deleted,
            _ => attrs.created,
        };
        Self {
            name: leaf_name(&attrs.name).to_string(),
            size: attrs.size,
            mode: FileMode::REGULAR,
            modified: truncate_to_secs(modified),
            sys: Sys::Object(attrs),
        }
    }

    /// Base name for listing entries, the path as opened for files, the
    /// bucket name for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in bytes. Always zero for the root.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Modification time, truncated to the second.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// The untranslated backend attributes.
    pub fn sys(&self) -> &Sys {
        &self.sys
    }
}

/// One entry produced by [`BucketDir::read_dir`](crate::BucketDir::read_dir).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry(FileInfo);

impl DirEntry {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    pub fn file_type(&self) -> FileMode {
        self.0.mode().file_type()
    }

    /// Full metadata for this entry. Never requires a backend call.
    pub fn info(&self) -> &FileInfo {
        &self.0
    }

    pub fn into_info(self) -> FileInfo {
        self.0
    }
}

impl From<FileInfo> for DirEntry {
    fn from(info: FileInfo) -> Self {
        Self(info)
    }
}

fn truncate_to_secs(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(0)
}

/// Last non-empty `/`-separated segment of an object key.
///
/// Folder placeholder keys such as `logs/` are named after their final
/// segment (`logs`) so the name is never empty.
fn leaf_name(key: &str) -> &str {
    match key.trim_end_matches('/').rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ if key.is_empty() => crate::path::ROOT,
        _ => key,
    }
}
