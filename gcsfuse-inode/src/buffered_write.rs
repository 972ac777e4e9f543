//! The buffered-write handler capability consumed by a `FileInode` in its "buffered" state: an
//! append-style streaming upload session, with flush/sync/truncate and a `TotalSize` a caller can
//! compare an incoming write's offset against to detect sequential appends.
//!
//! The default implementation accumulates fixed-size in-memory blocks gated by the process-wide
//! `GlobalMaxBlocks` [WeightedSemaphore], and finalizes by handing the whole buffer to
//! the bucket as a single `Insert` guarded by the precondition captured at open time. A host with
//! true multipart/resumable upload support is expected to substitute its own implementation behind
//! the same trait; this one favors correctness and simplicity over streaming the bytes out early.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use time::OffsetDateTime;

use crate::bucket::{Bucket, BucketError, Preconditions};
use crate::semaphore::{Permit, WeightedSemaphore};
use crate::types::{MinObject, METADATA_MTIME_KEY};

/// A streaming-upload session that accepts sequential appends.
#[async_trait::async_trait]
pub trait BufferedWriteHandler: Send {
    /// Bytes accepted so far; an incoming write at this offset is a sequential append.
    fn total_size(&self) -> u64;

    /// Append `data`, which the caller has already verified lands at `total_size()`.
    fn append(&mut self, data: &[u8]) -> Result<(), BucketError>;

    /// Record an mtime to be carried on the metadata of the eventually-finalized object.
    fn set_mtime(&mut self, mtime: OffsetDateTime);

    /// Copy the bytes written so far, e.g. to seed a demoted [crate::content_cache::ContentCache].
    fn buffered_bytes(&self) -> Vec<u8>;

    /// Finalize the upload, producing the new backing object.
    async fn finalize(self: Box<Self>) -> Result<MinObject, BucketError>;
}

/// Default [BufferedWriteHandler]: accumulates whole blocks in memory, admission-controlled by a
/// shared [WeightedSemaphore].
pub struct InMemoryBufferedWriteHandler<B: Bucket> {
    bucket: Arc<B>,
    key: String,
    block_size: usize,
    preconditions: Preconditions,
    blocks: Vec<BytesMut>,
    total_size: u64,
    mtime: Option<OffsetDateTime>,
    _permits: Vec<Permit>,
    block_semaphore: Arc<WeightedSemaphore>,
}

impl<B: Bucket> InMemoryBufferedWriteHandler<B> {
    /// Open a new handler. `preconditions` should be `Preconditions::if_generation_match(0)` for a
    /// brand new object, or pinned to the known source generation for an existing one.
    pub fn new(
        bucket: Arc<B>,
        key: String,
        block_size_mb: u64,
        preconditions: Preconditions,
        block_semaphore: Arc<WeightedSemaphore>,
    ) -> Self {
        Self {
            bucket,
            key,
            block_size: (block_size_mb as usize) * 1024 * 1024,
            preconditions,
            blocks: Vec::new(),
            total_size: 0,
            mtime: None,
            _permits: Vec::new(),
            block_semaphore,
        }
    }

    fn ensure_capacity(&mut self, additional: usize) -> Result<(), BucketError> {
        let mut remaining = additional;
        while remaining > 0 {
            let last_has_room = self
                .blocks
                .last()
                .map(|b| b.len() < self.block_size)
                .unwrap_or(false);
            if !last_has_room {
                let permit = self.block_semaphore.try_acquire(1).ok_or_else(|| {
                    BucketError::Transient(anyhow::anyhow!("buffered-write block budget exhausted"))
                })?;
                self._permits.push(permit);
                self.blocks.push(BytesMut::with_capacity(self.block_size));
            }
            let last = self.blocks.last_mut().expect("just ensured a block exists");
            let room = self.block_size - last.len();
            let take = room.min(remaining);
            remaining -= take;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<B: Bucket> BufferedWriteHandler for InMemoryBufferedWriteHandler<B> {
    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn append(&mut self, data: &[u8]) -> Result<(), BucketError> {
        self.ensure_capacity(data.len())?;
        let mut offset = 0;
        while offset < data.len() {
            let last = self.blocks.last_mut().expect("ensure_capacity populated a block");
            let room = self.block_size - last.len();
            let take = room.min(data.len() - offset);
            last.extend_from_slice(&data[offset..offset + take]);
            offset += take;
            if last.len() == self.block_size && offset < data.len() {
                let permit = self.block_semaphore.try_acquire(1).ok_or_else(|| {
                    BucketError::Transient(anyhow::anyhow!("buffered-write block budget exhausted"))
                })?;
                self._permits.push(permit);
                self.blocks.push(BytesMut::with_capacity(self.block_size));
            }
        }
        self.total_size += data.len() as u64;
        Ok(())
    }

    fn set_mtime(&mut self, mtime: OffsetDateTime) {
        self.mtime = Some(mtime);
    }

    fn buffered_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size as usize);
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
        out
    }

    async fn finalize(self: Box<Self>) -> Result<MinObject, BucketError> {
        let data: Bytes = {
            let mut out = BytesMut::with_capacity(self.total_size as usize);
            for block in &self.blocks {
                out.extend_from_slice(block);
            }
            out.freeze()
        };
        let mut metadata = HashMap::new();
        if let Some(mtime) = self.mtime {
            let formatted = mtime
                .format(&time::format_description::well_known::Rfc3339)
                .map_err(|e| BucketError::Transient(anyhow::anyhow!(e)))?;
            metadata.insert(METADATA_MTIME_KEY.to_string(), formatted);
        }
        self.bucket
            .insert(&self.key, data.to_vec(), self.preconditions, metadata)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::mock::MockBucket;

    #[tokio::test]
    async fn sequential_append_and_finalize() {
        let bucket = Arc::new(MockBucket::new());
        let sem = WeightedSemaphore::new(16);
        let mut handler = InMemoryBufferedWriteHandler::new(
            bucket.clone(),
            "b/obj".to_string(),
            1,
            Preconditions::if_generation_match(0),
            sem,
        );
        handler.append(b"hello ").unwrap();
        handler.append(b"world").unwrap();
        assert_eq!(handler.total_size(), 11);
        assert_eq!(handler.buffered_bytes(), b"hello world");

        let object = Box::new(handler).finalize().await.unwrap();
        assert_eq!(object.size, 11);
    }

    #[tokio::test]
    async fn block_budget_exhaustion_fails_append() {
        let bucket = Arc::new(MockBucket::new());
        let sem = WeightedSemaphore::new(0);
        let mut handler = InMemoryBufferedWriteHandler::new(
            bucket,
            "b/obj".to_string(),
            1,
            Preconditions::none(),
            sem,
        );
        assert!(handler.append(b"x").is_err());
    }
}
