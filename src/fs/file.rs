//! Readable handle over one object's byte stream.

use crate::{
    errors::{FsError, FsResult},
    models::{FileInfo, ReaderObjectAttrs},
    store::ObjectReader,
};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tracing::debug;

/// An object opened by exact key.
///
/// Reads are sequential with no seek. The stream is released by
/// [`close`](Self::close); dropping the handle releases it too. Once closed,
/// reads fail with [`FsError::Closed`] while [`stat`](Self::stat) keeps
/// working from the attributes captured at open time.
#[derive(Debug)]
pub struct ObjectFile {
    name: String,
    attrs: ReaderObjectAttrs,
    reader: Option<ObjectReader>,
}

impl ObjectFile {
    pub(crate) fn new(name: impl Into<String>, reader: ObjectReader) -> Self {
        Self {
            name: name.into(),
            attrs: reader.attrs.clone(),
            reader: Some(reader),
        }
    }

    /// The path this file was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` marks the end of the object and
    /// repeats on every later call.
    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| FsError::Closed(self.name.clone()))?;
        Ok(reader.read(buf).await?)
    }

    /// Metadata from the attributes attached to the stream when it was
    /// opened. Never refreshed.
    pub fn stat(&self) -> FileInfo {
        FileInfo::from_reader(&self.name, self.attrs.clone())
    }

    /// Release the underlying stream. Closing twice is a no-op.
    pub async fn close(&mut self) -> FsResult<()> {
        match self.reader.take() {
            Some(reader) => {
                debug!(path = %self.name, "closing object stream");
                Ok(reader.close().await?)
            }
            None => Ok(()),
        }
    }
}

impl AsyncRead for ObjectFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.reader.as_mut() {
            Some(reader) => Pin::new(reader).poll_read(cx, buf),
            None => Poll::Ready(Err(FsError::Closed(this.name.clone()).into())),
        }
    }
}
