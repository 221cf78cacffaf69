//! The filesystem facade over a single bucket.
//!
//! ```text
//! open(".")          -> Handle::Dir(BucketDir)    no backend call
//! open("b/c")        -> Handle::File(ObjectFile)  stream bound to key "b/c"
//! read_file("b/c")   -> bytes of "b/c"
//! ```
//!
//! Objects are flat keys, so the root is the only directory. A path such as
//! `b/c` is an exact key, never a directory `b` holding `c`.

mod dir;
mod file;

pub use dir::BucketDir;
pub use file::ObjectFile;

use crate::{
    config::FsOptions,
    errors::{FsError, FsResult},
    models::FileInfo,
    path::{ROOT, ensure_valid},
    store::{ObjectReader, ObjectStore},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Upper bound on the buffer reserved from a backend-reported size.
const MAX_PREALLOC: usize = 64 * 1024;

/// Capabilities shared by every open handle.
#[async_trait]
pub trait FsFile: Send {
    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;
    async fn stat(&self) -> FsResult<FileInfo>;
    async fn close(&mut self) -> FsResult<()>;
}

#[async_trait]
impl FsFile for ObjectFile {
    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        ObjectFile::read(self, buf).await
    }

    async fn stat(&self) -> FsResult<FileInfo> {
        Ok(ObjectFile::stat(self))
    }

    async fn close(&mut self) -> FsResult<()> {
        ObjectFile::close(self).await
    }
}

#[async_trait]
impl FsFile for BucketDir {
    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        BucketDir::read(self, buf).await
    }

    async fn stat(&self) -> FsResult<FileInfo> {
        BucketDir::stat(self).await
    }

    async fn close(&mut self) -> FsResult<()> {
        BucketDir::close(self).await
    }
}

/// What [`BucketFs::open`] returns.
#[derive(Debug)]
pub enum Handle {
    File(ObjectFile),
    Dir(BucketDir),
}

impl Handle {
    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut BucketDir> {
        match self {
            Handle::Dir(dir) => Some(dir),
            Handle::File(_) => None,
        }
    }

    pub fn into_file(self) -> Option<ObjectFile> {
        match self {
            Handle::File(file) => Some(file),
            Handle::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<BucketDir> {
        match self {
            Handle::Dir(dir) => Some(dir),
            Handle::File(_) => None,
        }
    }
}

#[async_trait]
impl FsFile for Handle {
    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        match self {
            Handle::File(file) => file.read(buf).await,
            Handle::Dir(dir) => dir.read(buf).await,
        }
    }

    async fn stat(&self) -> FsResult<FileInfo> {
        match self {
            Handle::File(file) => Ok(file.stat()),
            Handle::Dir(dir) => dir.stat().await,
        }
    }

    async fn close(&mut self) -> FsResult<()> {
        match self {
            Handle::File(file) => file.close().await,
            Handle::Dir(dir) => dir.close().await,
        }
    }
}

/// Read-only filesystem view of one bucket.
///
/// Cheap to clone; clones share the backend client.
#[derive(Clone)]
pub struct BucketFs {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    options: FsOptions,
}

impl BucketFs {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self::with_options(store, bucket, FsOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        options: FsOptions,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            options,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Open `path`.
    ///
    /// `"."` yields the root directory without contacting the backend. Any
    /// other valid path is opened as the object with exactly that key.
    pub async fn open(&self, path: &str) -> FsResult<Handle> {
        ensure_valid(path)?;
        if path == ROOT {
            debug!(bucket = %self.bucket, "open bucket root");
            return Ok(Handle::Dir(BucketDir::new(
                self.store.clone(),
                self.options.ctx.clone(),
                &self.bucket,
                self.options.page_size,
            )));
        }
        let reader = self.reader(path).await?;
        Ok(Handle::File(ObjectFile::new(path, reader)))
    }

    /// Read the whole object at `path`. The stream is closed before
    /// returning, also on failure.
    pub async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        ensure_valid(path)?;
        if path == ROOT {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let mut file = ObjectFile::new(path, self.reader(path).await?);
        let hint = usize::try_from(file.stat().size()).unwrap_or(usize::MAX);
        let mut content = Vec::with_capacity(hint.min(MAX_PREALLOC));
        let read = file.read_to_end(&mut content).await;
        let closed = file.close().await;
        read?;
        closed?;
        Ok(content)
    }

    async fn reader(&self, key: &str) -> FsResult<ObjectReader> {
        debug!(bucket = %self.bucket, key, "open object");
        self.store
            .open_reader(&self.options.ctx, &self.bucket, key)
            .await
            .map_err(|err| FsError::from_store(key, err))
    }
}

impl std::fmt::Debug for BucketFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketFs")
            .field("bucket", &self.bucket)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
