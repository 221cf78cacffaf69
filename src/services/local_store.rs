//! src/services/local_store.rs
//!
//! LocalStore — an [`ObjectStore`] backed by SQLite for metadata and local
//! disk for object payloads. Payloads are sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.
//!
//! Besides serving reads to [`BucketFs`](crate::BucketFs), it carries the
//! write side a bucket needs to be populated: bucket creation, streaming
//! uploads and soft deletes.

use crate::{
    config::LocalStoreConfig,
    models::{BucketAttrs, ObjectAttrs, ReaderObjectAttrs},
    store::{
        DEFAULT_PAGE_SIZE, ListQuery, ObjectPage, ObjectReader, ObjectStore, StoreError,
        StoreResult, with_context, Context as StoreContext,
    },
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::{
    FromRow, QueryBuilder, SqlitePool,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const INIT_SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const MAX_OBJECT_KEY_LEN: usize = 1024;
const MAX_PAGE_SIZE: usize = 1000;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const DEFAULT_LOCATION: &str = "local";
const STORAGE_CLASS: &str = "STANDARD";

#[derive(FromRow, Debug)]
struct BucketRow {
    id: Uuid,
    name: String,
    location: String,
    created_at: DateTime<Utc>,
    versioning_enabled: bool,
}

impl From<BucketRow> for BucketAttrs {
    fn from(row: BucketRow) -> Self {
        Self {
            name: row.name,
            location: row.location,
            created: row.created_at,
            versioning_enabled: row.versioning_enabled,
        }
    }
}

#[derive(FromRow, Debug)]
struct ObjectRow {
    key: String,
    content_type: Option<String>,
    size_bytes: i64,
    etag: Option<String>,
    storage_class: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl ObjectRow {
    fn into_attrs(self, bucket: &str) -> ObjectAttrs {
        ObjectAttrs {
            bucket: bucket.to_string(),
            name: self.key,
            content_type: self.content_type,
            size: u64::try_from(self.size_bytes).unwrap_or(0),
            etag: self.etag,
            storage_class: self.storage_class,
            created: self.created_at,
            updated: self.updated_at,
            deleted: self.deleted_at,
        }
    }

    fn reader_attrs(&self) -> ReaderObjectAttrs {
        ReaderObjectAttrs {
            size: u64::try_from(self.size_bytes).unwrap_or(0),
            content_type: self.content_type.clone(),
            last_modified: self.updated_at,
            etag: self.etag.clone(),
        }
    }
}

const OBJECT_COLUMNS: &str = "key, content_type, size_bytes, etag, storage_class, \
                              created_at, updated_at, deleted_at";

/// LocalStore provides the object-storage operations `BucketFs` consumes,
/// plus the handful of write operations needed to seed a bucket:
/// - Create a bucket (validates name, creates its directory)
/// - Upload an object (writes bytes to disk and upserts metadata)
/// - Delete an object (soft-delete in SQLite and remove the payload)
#[derive(Clone)]
pub struct LocalStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl LocalStore {
    /// Create a LocalStore backed by the provided SQLite pool and using
    /// `base_path` as the root directory for object payloads.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Open the metadata database named by `config`, creating it and the
    /// storage directory if missing, and apply the schema.
    ///
    /// An in-memory database is pinned to a single long-lived connection so
    /// every query sees the same data.
    pub async fn connect(config: &LocalStoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.storage_dir).await?;

        if !config.is_in_memory() {
            // Extract the local file path SQLite will use
            let db_path = config
                .database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:")
                .trim_start_matches("file:");
            let db_path = db_path.split('?').next().unwrap_or(db_path);
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };
        let pool = pool_options.connect_with(options).await?;
        debug!(url = %config.database_url, "connected to metadata database");

        let store = Self::new(Arc::new(pool), config.storage_dir.clone());
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the embedded schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = INIT_SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("running {} schema statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Key validation that keeps keys usable both as filesystem paths and as
    /// on-disk payload locations.
    ///
    /// Rejects empty or oversized keys, a leading `/`, `.`/`..` segments,
    /// backslashes and control characters.
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        let invalid = || StoreError::InvalidObjectKey(key.to_string());
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(invalid());
        }
        // Stray slashes show up as empty segments.
        if key.split('/').any(|seg| matches!(seg, "" | "." | "..")) {
            return Err(invalid());
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return Err(invalid());
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StoreResult<()> {
        let reject = |reason: &str| {
            Err(StoreError::InvalidBucketName {
                name: name.to_string(),
                reason: reason.into(),
            })
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return reject("must be between 3 and 63 characters");
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return reject("allowed characters are lowercase letters, digits, dots, and hyphens");
        }
        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return reject("must start and end with a lowercase letter or digit");
        }
        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return reject("cannot contain consecutive dots or dot-hyphen combinations");
        }
        if is_ipv4_like(name) {
            return reject("must not be formatted like an IP address");
        }
        Ok(())
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard identifiers for an object key: the first two bytes of
    /// MD5(bucket/key) as lowercase hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// `base_path/bucket/{shard}/{shard}/{key}`. Parents may not exist yet.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_bucket(&self, bucket: &str) -> StoreResult<BucketRow> {
        self.ensure_bucket_name_safe(bucket)?;
        sqlx::query_as::<Sqlite, BucketRow>(
            "SELECT id, name, location, created_at, versioning_enabled
             FROM buckets WHERE name = ?",
        )
        .bind(bucket)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::BucketNotFound(bucket.to_string()),
            other => StoreError::Sqlx(other),
        })
    }

    /// Fetch a live (not soft-deleted) object row.
    async fn fetch_object(&self, bucket: &BucketRow, key: &str) -> StoreResult<ObjectRow> {
        sqlx::query_as::<Sqlite, ObjectRow>(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects
             WHERE key = ? AND bucket_id = ? AND is_deleted = 0"
        ))
        .bind(key)
        .bind(bucket.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::ObjectNotFound {
                bucket: bucket.name.clone(),
                key: key.to_string(),
            },
            other => StoreError::Sqlx(other),
        })
    }

    /// Create a bucket and its payload directory.
    pub async fn create_bucket(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> StoreResult<BucketAttrs> {
        self.ensure_bucket_name_safe(name)?;
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LOCATION)
            .to_lowercase();
        fs::create_dir_all(self.bucket_root(name)).await?;

        let row = BucketRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location,
            created_at: Utc::now(),
            versioning_enabled: false,
        };

        match sqlx::query(
            "INSERT INTO buckets (id, name, location, created_at, versioning_enabled)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.location)
        .bind(row.created_at)
        .bind(row.versioning_enabled)
        .execute(&*self.db)
        .await
        {
            Ok(_) => {
                debug!(bucket = name, "created bucket");
                Ok(row.into())
            }
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::BucketAlreadyExists(name.to_string()))
            }
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    /// Stream-upload an object to disk and upsert its metadata.
    ///
    /// Bytes go to a temporary file next to the final location, are fsynced,
    /// then renamed into place. Re-uploading a soft-deleted key starts a new
    /// generation but keeps the recorded deletion time.
    pub async fn put_object<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StoreResult<ObjectAttrs>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let (size_bytes, etag) = match write_payload(&tmp_path, stream).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        let now = Utc::now();
        let upserted = sqlx::query_as::<Sqlite, ObjectRow>(&format!(
            r#"
            INSERT INTO objects (
                id, bucket_id, key, content_type, size_bytes, etag,
                storage_class, created_at, updated_at, deleted_at, is_deleted
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                storage_class = excluded.storage_class,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                is_deleted = 0
            RETURNING {OBJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(bucket_rec.id)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(STORAGE_CLASS)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        match upserted {
            Ok(row) => {
                debug!(bucket, key, size_bytes, "stored object");
                Ok(row.into_attrs(&bucket_rec.name))
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StoreError::Sqlx(err))
            }
        }
    }

    /// Upload an in-memory payload.
    pub async fn put_object_bytes(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        content: impl Into<Bytes>,
    ) -> StoreResult<ObjectAttrs> {
        let body = stream::once(futures::future::ready(Ok(content.into())));
        self.put_object(bucket, key, content_type, body).await
    }

    /// Soft-delete an object and remove its payload.
    ///
    /// Records the deletion time, deletes the file and prunes empty shard
    /// directories. Deleting an already deleted key is `ObjectNotFound`.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectAttrs> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let row = sqlx::query_as::<Sqlite, ObjectRow>(&format!(
            "UPDATE objects SET is_deleted = 1, deleted_at = ?
             WHERE key = ? AND bucket_id = ? AND is_deleted = 0
             RETURNING {OBJECT_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(key)
        .bind(bucket_rec.id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StoreError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;

        let file_path = self.object_path(&bucket_rec.name, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(&bucket_rec.name);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(row.into_attrs(&bucket_rec.name))
    }

    /// Remove empty directories from `start` up to, not including, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty
                    ) =>
                {
                    break;
                }
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }

    async fn list_page(&self, bucket: &str, query: &ListQuery) -> StoreResult<ObjectPage> {
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let page_size = match query.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n,
        }
        .clamp(1, MAX_PAGE_SIZE);
        let fetch_limit = page_size + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {OBJECT_COLUMNS} FROM objects WHERE bucket_id = "
        ));
        builder.push_bind(bucket_rec.id);
        builder.push(" AND is_deleted = ");
        builder.push_bind(query.soft_deleted);

        if let Some(prefix) = query.prefix.as_deref().filter(|p| !p.is_empty()) {
            builder.push(" AND key LIKE ");
            builder.push_bind(format!("{}%", escape_like(prefix)));
            builder.push(" ESCAPE '\\'");
        }

        if let Some(token) = &query.page_token {
            builder.push(" AND key > ");
            builder.push_bind(decode_page_token(token)?);
        }

        builder.push(" ORDER BY key ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<ObjectRow> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut next_page_token = None;
        if rows.len() == fetch_limit {
            rows.truncate(page_size);
            next_page_token = rows.last().map(|row| encode_page_token(&row.key));
        }

        Ok(ObjectPage {
            objects: rows
                .into_iter()
                .map(|row| row.into_attrs(&bucket_rec.name))
                .collect(),
            next_page_token,
        })
    }

    async fn reader(&self, bucket: &str, key: &str) -> StoreResult<ObjectReader> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let object = self.fetch_object(&bucket_rec, key).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StoreError::Io(err)
            }
        })?;

        Ok(ObjectReader::new(object.reader_attrs(), file))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn bucket_attrs(&self, ctx: &StoreContext, bucket: &str) -> StoreResult<BucketAttrs> {
        debug!(bucket, "fetching bucket attributes");
        with_context(ctx, async {
            self.fetch_bucket(bucket).await.map(BucketAttrs::from)
        })
        .await
    }

    async fn open_reader(
        &self,
        ctx: &StoreContext,
        bucket: &str,
        key: &str,
    ) -> StoreResult<ObjectReader> {
        debug!(bucket, key, "opening object reader");
        with_context(ctx, self.reader(bucket, key)).await
    }

    async fn list_objects(
        &self,
        ctx: &StoreContext,
        bucket: &str,
        query: &ListQuery,
    ) -> StoreResult<ObjectPage> {
        debug!(bucket, page_size = query.page_size, "listing objects");
        with_context(ctx, self.list_page(bucket, query)).await
    }

    fn default_page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }
}

/// Write `stream` to a new file at `path`, returning its size and MD5 etag.
async fn write_payload<S>(path: &Path, stream: S) -> io::Result<(i64, String)>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(path).await?;
    let mut size_bytes: i64 = 0;
    let mut digest = Context::new();
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as i64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok((size_bytes, format!("{:x}", digest.compute())))
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn encode_page_token(key: &str) -> String {
    general_purpose::STANDARD.encode(key)
}

fn decode_page_token(token: &str) -> StoreResult<String> {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(StoreError::InvalidPageToken)
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn store() -> (LocalStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = LocalStoreConfig::in_memory(dir.path().join("objects"));
        let store = LocalStore::connect(&config).await.unwrap();
        (store, dir)
    }

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn create_bucket_validates_names() {
        let (store, _dir) = store().await;
        for bad in ["ab", "Upper", "-lead", "trail.", "a..b", "a.-b", "192.168.0.1"] {
            let err = store.create_bucket(bad, None).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidBucketName { .. }), "{bad}");
        }

        let attrs = store.create_bucket("gcsfs", Some("US-West-2")).await.unwrap();
        assert_eq!(attrs.name, "gcsfs");
        assert_eq!(attrs.location, "us-west-2");

        let err = store.create_bucket("gcsfs", None).await.unwrap_err();
        assert!(matches!(err, StoreError::BucketAlreadyExists(_)));
    }

    #[tokio::test]
    async fn put_then_read_round_trips_payload_and_attrs() {
        let (store, _dir) = store().await;
        store.create_bucket("gcsfs", None).await.unwrap();
        let attrs = store
            .put_object_bytes("gcsfs", "testdata/hello", Some("text/plain".into()), "world")
            .await
            .unwrap();
        assert_eq!(attrs.name, "testdata/hello");
        assert_eq!(attrs.size, 5);
        assert_eq!(attrs.etag.as_deref(), Some("7d793037a0760186574b0282f2f435e7"));
        assert_eq!(attrs.deleted, None);

        let ctx = StoreContext::new();
        let reader = store.open_reader(&ctx, "gcsfs", "testdata/hello").await.unwrap();
        assert_eq!(reader.attrs.size, 5);
        assert_eq!(reader.attrs.content_type.as_deref(), Some("text/plain"));
        assert_eq!(read_all(reader).await, b"world");
    }

    #[tokio::test]
    async fn missing_bucket_and_object_are_not_found() {
        let (store, _dir) = store().await;
        let ctx = StoreContext::new();
        let err = store.bucket_attrs(&ctx, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));

        store.create_bucket("gcsfs", None).await.unwrap();
        let err = store.open_reader(&ctx, "gcsfs", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rejects_unsafe_keys() {
        let (store, _dir) = store().await;
        store.create_bucket("gcsfs", None).await.unwrap();
        for key in ["", "/abs", "logs/", "a//b", "a/../b", "./a", "back\\slash", "ctl\u{7}"] {
            let err = store
                .put_object_bytes("gcsfs", key, None, "x")
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidObjectKey(_)), "{key:?}");
        }
        store.put_object_bytes("gcsfs", "a..b", None, "x").await.unwrap();
        store.put_object_bytes("gcsfs", "logs/today", None, "x").await.unwrap();
    }

    #[tokio::test]
    async fn pages_through_keys_without_skipping() {
        let (store, _dir) = store().await;
        store.create_bucket("gcsfs", None).await.unwrap();
        for key in ["a", "b/c", "b/d", "e", "f_g"] {
            store.put_object_bytes("gcsfs", key, None, key.to_owned()).await.unwrap();
        }

        let ctx = StoreContext::new();
        let mut query = ListQuery {
            page_size: 2,
            ..ListQuery::default()
        };
        let mut seen = Vec::new();
        loop {
            let page = store.list_objects(&ctx, "gcsfs", &query).await.unwrap();
            assert!(page.objects.len() <= 2);
            seen.extend(page.objects.into_iter().map(|o| o.name));
            match page.next_page_token {
                Some(token) => query.page_token = Some(token),
                None => break,
            }
        }
        assert_eq!(seen, ["a", "b/c", "b/d", "e", "f_g"]);

        let prefixed = ListQuery {
            prefix: Some("b/".into()),
            ..ListQuery::default()
        };
        let page = store.list_objects(&ctx, "gcsfs", &prefixed).await.unwrap();
        let names: Vec<_> = page.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["b/c", "b/d"]);

        let underscore = ListQuery {
            prefix: Some("f_".into()),
            ..ListQuery::default()
        };
        let page = store.list_objects(&ctx, "gcsfs", &underscore).await.unwrap();
        assert_eq!(page.objects.len(), 1);
    }

    #[tokio::test]
    async fn garbage_page_token_is_rejected() {
        let (store, _dir) = store().await;
        store.create_bucket("gcsfs", None).await.unwrap();
        let query = ListQuery {
            page_token: Some("***".into()),
            ..ListQuery::default()
        };
        let err = store
            .list_objects(&StoreContext::new(), "gcsfs", &query)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPageToken));
    }

    #[tokio::test]
    async fn delete_is_soft_and_recreation_keeps_deletion_time() {
        let (store, dir) = store().await;
        store.create_bucket("gcsfs", None).await.unwrap();
        store.put_object_bytes("gcsfs", "doomed", None, "bye").await.unwrap();

        let deleted = store.delete_object("gcsfs", "doomed").await.unwrap();
        let deleted_at = deleted.deleted.expect("deletion time recorded");
        assert!(!store.object_path("gcsfs", "doomed").exists());
        assert!(dir.path().join("objects").join("gcsfs").exists());

        let ctx = StoreContext::new();
        let live = store
            .list_objects(&ctx, "gcsfs", &ListQuery::default())
            .await
            .unwrap();
        assert!(live.objects.is_empty());

        let soft = ListQuery {
            soft_deleted: true,
            ..ListQuery::default()
        };
        let page = store.list_objects(&ctx, "gcsfs", &soft).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert_eq!(page.objects[0].deleted, Some(deleted_at));

        let err = store.delete_object("gcsfs", "doomed").await.unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound { .. }));

        let recreated = store.put_object_bytes("gcsfs", "doomed", None, "again").await.unwrap();
        assert_eq!(recreated.deleted, Some(deleted_at));
        assert!(recreated.created >= deleted_at);
        let reader = store.open_reader(&ctx, "gcsfs", "doomed").await.unwrap();
        assert_eq!(read_all(reader).await, b"again");
    }

    #[tokio::test]
    async fn cancelled_context_stops_backend_calls() {
        let (store, _dir) = store().await;
        store.create_bucket("gcsfs", None).await.unwrap();
        let ctx = StoreContext::new();
        ctx.cancel();
        let err = store.bucket_attrs(&ctx, "gcsfs").await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        let err = store
            .list_objects(&ctx, "gcsfs", &ListQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }
}
