//! Attributes of a stored object, in the two shapes a backend hands out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full per-object attributes, as produced by object enumeration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectAttrs {
    /// Name of the bucket holding the object.
    pub bucket: String,

    /// Full object key, e.g. `photos/2025/img.jpg`.
    pub name: String,

    /// Content type (MIME type), if recorded at upload.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size: u64,

    /// MD5 checksum of the payload, hex encoded.
    pub etag: Option<String>,

    /// Storage class (e.g. STANDARD).
    pub storage_class: String,

    /// When the current generation of the object was created.
    pub created: DateTime<Utc>,

    /// When the object metadata was last updated.
    pub updated: DateTime<Utc>,

    /// When the object was (soft-)deleted, if the backend tracks it.
    pub deleted: Option<DateTime<Utc>>,
}

/// The subset of attributes attached to an open object stream.
///
/// Captured once when the stream is opened and never refreshed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReaderObjectAttrs {
    /// Size in bytes of the object being read.
    pub size: u64,

    /// Content type (MIME type), if known.
    pub content_type: Option<String>,

    /// Last modification time of the object.
    pub last_modified: DateTime<Utc>,

    /// MD5 checksum of the payload, hex encoded.
    pub etag: Option<String>,
}
