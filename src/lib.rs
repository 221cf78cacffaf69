//! A read-only filesystem view over an object-storage bucket.
//!
//! Objects live under flat, slash-delimited keys. [`BucketFs`] presents them
//! as a one-level tree: the bucket is the root directory (`"."`) and every
//! other valid path is the object with exactly that key.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use bucketfs::{BucketFs, LocalStore, LocalStoreConfig};
//! use std::sync::Arc;
//!
//! let store = LocalStore::connect(&LocalStoreConfig::from_env()?).await?;
//! let fsys = BucketFs::new(Arc::new(store), "gcsfs");
//!
//! let hello = fsys.read_file("hello").await?;
//! let mut root = fsys.open(".").await?.into_dir().expect("root is a directory");
//! while let Some(batch) = root.read_dir(100).await? {
//!     for entry in batch {
//!         println!("{} {}", entry.name(), entry.info().size());
//!     }
//! }
//! # let _ = hello;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod fs;
pub mod models;
pub mod path;
pub mod services;
pub mod store;

pub use config::{FsOptions, LocalStoreConfig};
pub use errors::{FsError, FsResult};
pub use fs::{BucketDir, BucketFs, FsFile, Handle, ObjectFile};
pub use models::{BucketAttrs, DirEntry, FileInfo, FileMode, ObjectAttrs, ReaderObjectAttrs, Sys};
pub use path::valid_path;
pub use services::local_store::LocalStore;
pub use store::{ObjectStore, StoreError, StoreResult};
