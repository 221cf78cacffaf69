//! Attributes of a bucket as reported by an object-storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bucket-level attributes returned by [`ObjectStore::bucket_attrs`].
///
/// Buckets act as the root of a [`BucketFs`](crate::BucketFs). Only the name
/// and creation time flow into the root directory's metadata; the remaining
/// fields are reachable through [`FileInfo::sys`](crate::FileInfo::sys).
///
/// [`ObjectStore::bucket_attrs`]: crate::store::ObjectStore::bucket_attrs
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketAttrs {
    /// Globally unique bucket name.
    pub name: String,

    /// Location the bucket is hosted in (e.g. "local", "us-west-2").
    pub location: String,

    /// When this bucket was created. May carry sub-second precision.
    pub created: DateTime<Utc>,

    /// Whether the bucket keeps non-current object generations.
    pub versioning_enabled: bool,
}
