//! Data models shared between the filesystem adapter and its backends.
//!
//! `bucket` and `object` hold the attribute shapes a backend reports;
//! `metadata` turns them into the filesystem's [`FileInfo`] contract.

pub mod bucket;
pub mod metadata;
pub mod object;

pub use bucket::BucketAttrs;
pub use metadata::{DirEntry, FileInfo, FileMode, Sys};
pub use object::{ObjectAttrs, ReaderObjectAttrs};
