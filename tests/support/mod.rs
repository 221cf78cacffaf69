//! Backend doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bucketfs::{
    BucketAttrs, ObjectAttrs, ReaderObjectAttrs,
    store::{Context, ListQuery, ObjectPage, ObjectReader, ObjectStore, StoreError, StoreResult},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::{
    io::Cursor,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fixed instant with sub-second jitter.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap() + Duration::milliseconds(420)
}

pub struct MockObject {
    pub attrs: ObjectAttrs,
    pub reader_attrs: ReaderObjectAttrs,
    pub content: Vec<u8>,
}

impl MockObject {
    pub fn new(key: &str, content: &[u8]) -> Self {
        Self {
            attrs: ObjectAttrs {
                bucket: String::new(),
                name: key.to_string(),
                content_type: None,
                size: content.len() as u64,
                etag: None,
                storage_class: "STANDARD".into(),
                created: t0(),
                updated: t0(),
                deleted: None,
            },
            reader_attrs: ReaderObjectAttrs {
                size: content.len() as u64,
                content_type: None,
                last_modified: t0(),
                etag: None,
            },
            content: content.to_vec(),
        }
    }
}

/// In-memory backend with scripted contents and failures. Counts every
/// call it receives.
pub struct MockStore {
    bucket: Option<BucketAttrs>,
    objects: Vec<MockObject>,
    default_page_size: usize,
    fail_listing_at: Option<usize>,
    calls: AtomicUsize,
    list_requests: Mutex<Vec<ListQuery>>,
}

impl MockStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: Some(BucketAttrs {
                name: bucket.to_string(),
                location: "local".into(),
                created: t0(),
                versioning_enabled: false,
            }),
            objects: Vec::new(),
            default_page_size: 1000,
            fail_listing_at: None,
            calls: AtomicUsize::new(0),
            list_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn without_bucket() -> Self {
        Self {
            bucket: None,
            ..Self::new("unused")
        }
    }

    pub fn with_object(self, key: &str, content: &[u8]) -> Self {
        self.with_mock_object(MockObject::new(key, content))
    }

    pub fn with_mock_object(mut self, mut object: MockObject) -> Self {
        if let Some(bucket) = &self.bucket {
            object.attrs.bucket = bucket.name.clone();
        }
        self.objects.push(object);
        self.objects.sort_by(|a, b| a.attrs.name.cmp(&b.attrs.name));
        self
    }

    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Fail the listing page that would contain the object at `index`.
    pub fn fail_listing_at(mut self, index: usize) -> Self {
        self.fail_listing_at = Some(index);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn list_requests(&self) -> Vec<ListQuery> {
        self.list_requests.lock().unwrap().clone()
    }

    fn bucket_named(&self, bucket: &str) -> StoreResult<&BucketAttrs> {
        self.bucket
            .as_ref()
            .filter(|b| b.name == bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn bucket_attrs(&self, _ctx: &Context, bucket: &str) -> StoreResult<BucketAttrs> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bucket_named(bucket).cloned()
    }

    async fn open_reader(
        &self,
        _ctx: &Context,
        bucket: &str,
        key: &str,
    ) -> StoreResult<ObjectReader> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bucket_named(bucket)?;
        let object = self
            .objects
            .iter()
            .find(|o| o.attrs.name == key)
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(ObjectReader::new(
            object.reader_attrs.clone(),
            Cursor::new(object.content.clone()),
        ))
    }

    async fn list_objects(
        &self,
        ctx: &Context,
        bucket: &str,
        query: &ListQuery,
    ) -> StoreResult<ObjectPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.list_requests.lock().unwrap().push(query.clone());
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.bucket_named(bucket)?;

        let start = match &query.page_token {
            Some(token) => token.parse::<usize>().map_err(|_| StoreError::InvalidPageToken)?,
            None => 0,
        };
        let size = match query.page_size {
            0 => self.default_page_size,
            n => n,
        };
        let end = (start + size).min(self.objects.len());
        if let Some(index) = self.fail_listing_at {
            if (start..start + size).contains(&index) {
                return Err(StoreError::Other("listing interrupted".into()));
            }
        }

        Ok(ObjectPage {
            objects: self.objects[start.min(end)..end]
                .iter()
                .map(|o| o.attrs.clone())
                .collect(),
            next_page_token: (end < self.objects.len()).then(|| end.to_string()),
        })
    }

    fn default_page_size(&self) -> usize {
        self.default_page_size
    }
}

/// A backend that fails the test if it is ever contacted.
pub struct UnreachableStore;

#[async_trait]
impl ObjectStore for UnreachableStore {
    async fn bucket_attrs(&self, _ctx: &Context, bucket: &str) -> StoreResult<BucketAttrs> {
        panic!("backend contacted: bucket_attrs({bucket})")
    }

    async fn open_reader(
        &self,
        _ctx: &Context,
        bucket: &str,
        key: &str,
    ) -> StoreResult<ObjectReader> {
        panic!("backend contacted: open_reader({bucket}, {key})")
    }

    async fn list_objects(
        &self,
        _ctx: &Context,
        bucket: &str,
        _query: &ListQuery,
    ) -> StoreResult<ObjectPage> {
        panic!("backend contacted: list_objects({bucket})")
    }
}
