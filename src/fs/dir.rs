//! The bucket root, the only directory a [`BucketFs`](super::BucketFs) has.

use crate::{
    errors::{FsError, FsResult},
    models::{DirEntry, FileInfo},
    path::ROOT,
    store::{Context, ListQuery, ObjectIter, ObjectStore},
};
use std::sync::Arc;
use tracing::debug;

/// Upper bound on the entry buffer reserved up front for one batch.
const MAX_PREALLOC: usize = 1024;

/// Handle on the bucket root.
///
/// Opening it costs nothing; [`stat`](Self::stat) and
/// [`read_dir`](Self::read_dir) each call the backend. Listing keeps one
/// enumeration cursor per handle, so successive `read_dir` calls continue
/// where the previous one stopped.
pub struct BucketDir {
    store: Arc<dyn ObjectStore>,
    ctx: Context,
    bucket: String,
    page_size: usize,
    cursor: Option<ObjectIter>,
}

impl BucketDir {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        ctx: Context,
        bucket: impl Into<String>,
        page_size: Option<usize>,
    ) -> Self {
        Self {
            store,
            ctx,
            bucket: bucket.into(),
            page_size: page_size.unwrap_or(0),
            cursor: None,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Directory metadata built from freshly fetched bucket attributes.
    pub async fn stat(&self) -> FsResult<FileInfo> {
        debug!(bucket = %self.bucket, "stat bucket root");
        let attrs = self
            .store
            .bucket_attrs(&self.ctx, &self.bucket)
            .await
            .map_err(|err| FsError::from_store(ROOT, err))?;
        Ok(FileInfo::from_bucket(attrs))
    }

    /// Next batch of entries, one per object in the bucket.
    ///
    /// With `n > 0` at most `n` entries are returned; otherwise at most the
    /// backend's suggested page size. `Ok(None)` means the listing is over:
    /// an empty batch is always reported that way. If the backend fails
    /// mid-batch, the entries gathered so far are dropped and the error is
    /// returned.
    pub async fn read_dir(&mut self, n: isize) -> FsResult<Option<Vec<DirEntry>>> {
        let cursor = self.cursor.get_or_insert_with(|| {
            let query = ListQuery {
                page_size: self.page_size,
                ..ListQuery::default()
            };
            ObjectIter::new(self.store.clone(), self.ctx.clone(), &self.bucket, query)
        });

        let limit = if n > 0 {
            n as usize
        } else {
            cursor.page_info().max_size
        };
        let mut entries = Vec::with_capacity(limit.min(MAX_PREALLOC));
        while limit == 0 || entries.len() < limit {
            let next = cursor
                .next()
                .await
                .map_err(|err| FsError::from_store(ROOT, err))?;
            match next {
                Some(attrs) => entries.push(DirEntry::from(FileInfo::from_listing(attrs))),
                None => break,
            }
        }
        debug!(bucket = %self.bucket, requested = n, returned = entries.len(), "read_dir");

        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(entries))
    }

    /// The root has no byte content: always `Ok(0)`, never an error. Use
    /// [`FileInfo::is_dir`] to tell it apart from an exhausted file.
    pub async fn read(&mut self, _buf: &mut [u8]) -> FsResult<usize> {
        Ok(0)
    }

    /// Drops the listing cursor. Always succeeds; a later `read_dir` starts
    /// a fresh enumeration.
    pub async fn close(&mut self) -> FsResult<()> {
        self.cursor = None;
        Ok(())
    }
}

impl std::fmt::Debug for BucketDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketDir")
            .field("bucket", &self.bucket)
            .field("page_size", &self.page_size)
            .field("listing", &self.cursor.is_some())
            .finish()
    }
}
