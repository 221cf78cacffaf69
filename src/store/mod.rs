//! The object-storage backend contract consumed by [`BucketFs`](crate::BucketFs).
//!
//! A backend offers bucket attributes, object streams opened by exact key,
//! and paginated enumeration. Every call takes a [`Context`] so the caller's
//! cancellation reaches the backend. Retries, authentication and the
//! pagination wire protocol all live behind this trait.

use crate::models::{BucketAttrs, ObjectAttrs, ReaderObjectAttrs};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    future::Future,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll},
};
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Per-call cancellation context threaded into every backend request.
pub type Context = CancellationToken;

/// Page size suggested to callers that do not pick one.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("invalid page token")]
    InvalidPageToken,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// True for the backend's "no such bucket/object" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::BucketNotFound(_) | StoreError::ObjectNotFound { .. }
        )
    }

    pub fn kind(&self) -> io::ErrorKind {
        match self {
            StoreError::BucketNotFound(_) | StoreError::ObjectNotFound { .. } => {
                io::ErrorKind::NotFound
            }
            StoreError::BucketAlreadyExists(_) => io::ErrorKind::AlreadyExists,
            StoreError::InvalidBucketName { .. }
            | StoreError::InvalidObjectKey(_)
            | StoreError::InvalidPageToken => io::ErrorKind::InvalidInput,
            StoreError::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            StoreError::Cancelled => io::ErrorKind::Interrupted,
            StoreError::Io(err) => err.kind(),
            StoreError::Other(_) | StoreError::Sqlx(_) => io::ErrorKind::Other,
        }
    }
}

/// Parameters for one page of object enumeration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only list keys starting with this prefix.
    pub prefix: Option<String>,

    /// List soft-deleted objects instead of live ones.
    pub soft_deleted: bool,

    /// Maximum number of objects in the page. Zero lets the backend choose.
    pub page_size: usize,

    /// Opaque token returned by the previous page.
    pub page_token: Option<String>,
}

/// One page of enumeration results.
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectAttrs>,

    /// `None` once enumeration is exhausted.
    pub next_page_token: Option<String>,
}

/// A byte stream over one object, plus the attributes captured when it was
/// opened.
pub struct ObjectReader {
    pub attrs: ReaderObjectAttrs,
    body: Pin<Box<dyn AsyncRead + Send + Sync>>,
}

impl ObjectReader {
    pub fn new(attrs: ReaderObjectAttrs, body: impl AsyncRead + Send + Sync + 'static) -> Self {
        Self {
            attrs,
            body: Box::pin(body),
        }
    }

    /// Release the underlying stream.
    pub async fn close(self) -> io::Result<()> {
        drop(self.body);
        Ok(())
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.body.as_mut().poll_read(cx, buf)
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

/// An object-storage client bound to no particular bucket.
///
/// Implementations must be safe to share between independent operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch bucket-level attributes.
    async fn bucket_attrs(&self, ctx: &Context, bucket: &str) -> StoreResult<BucketAttrs>;

    /// Open a stream over the object stored at exactly `key`.
    async fn open_reader(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
    ) -> StoreResult<ObjectReader>;

    /// Fetch one page of objects in key order.
    async fn list_objects(
        &self,
        ctx: &Context,
        bucket: &str,
        query: &ListQuery,
    ) -> StoreResult<ObjectPage>;

    /// Page size used when the caller does not ask for one.
    fn default_page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }
}

/// Run `fut`, giving up with [`StoreError::Cancelled`] once `ctx` is
/// cancelled.
pub async fn with_context<T, F>(ctx: &Context, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(StoreError::Cancelled),
        res = fut => res,
    }
}

/// Paging hints for an [`ObjectIter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageInfo {
    /// Objects requested per page. Zero means no limit was suggested.
    pub max_size: usize,
}

/// Pull iterator over every object matching a [`ListQuery`], fetching pages
/// from the backend on demand.
pub struct ObjectIter {
    store: Arc<dyn ObjectStore>,
    ctx: Context,
    bucket: String,
    query: ListQuery,
    page_info: PageInfo,
    buffered: VecDeque<ObjectAttrs>,
    exhausted: bool,
}

impl ObjectIter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        ctx: Context,
        bucket: impl Into<String>,
        query: ListQuery,
    ) -> Self {
        let max_size = if query.page_size > 0 {
            query.page_size
        } else {
            store.default_page_size()
        };
        Self {
            store,
            ctx,
            bucket: bucket.into(),
            query,
            page_info: PageInfo { max_size },
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    /// Next object, or `Ok(None)` once enumeration is done.
    ///
    /// After an error the iterator position is whatever the backend left it
    /// at; the page that failed is requested again on the next call.
    pub async fn next(&mut self) -> StoreResult<Option<ObjectAttrs>> {
        loop {
            if let Some(attrs) = self.buffered.pop_front() {
                return Ok(Some(attrs));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> StoreResult<()> {
        let query = ListQuery {
            page_size: self.page_info.max_size,
            ..self.query.clone()
        };
        let page = self
            .store
            .list_objects(&self.ctx, &self.bucket, &query)
            .await?;
        trace!(
            bucket = %self.bucket,
            objects = page.objects.len(),
            more = page.next_page_token.is_some(),
            "fetched object page"
        );
        self.buffered.extend(page.objects);
        match page.next_page_token {
            Some(token) => self.query.page_token = Some(token),
            None => self.exhausted = true,
        }
        Ok(())
    }
}
