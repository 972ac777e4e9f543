//! File inode behaviour: read, write (sequential streaming with out-of-order fallback), truncate,
//! and sync/flush with clobber safety (spec §4.5).
//!
//! At every observation point exactly one of `{content cache, buffered write handler}` is active,
//! or neither (the "clean" state reads straight from the bucket). The transition table is driven
//! entirely by [FileInode::write]/[FileInode::truncate]/[FileInode::sync]/[FileInode::flush]; no
//! other code path mutates `content`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_lock::Mutex as AsyncMutex;
use gcsfuse_inode_macros::log_failures;
use time::OffsetDateTime;
use tracing::instrument;

use crate::buffered_write::{BufferedWriteHandler, InMemoryBufferedWriteHandler};
use crate::bucket::{Bucket, BucketError, Preconditions};
use crate::clock::Clock;
use crate::config::InodeConfig;
use crate::content_cache::{ContentCache, TempFileContentCache};
use crate::error::{describe, InodeError};
use crate::generation::Generation;
use crate::lookup_count::LookupCount;
use crate::name::Name;
use crate::semaphore::WeightedSemaphore;
use crate::types::{MinObject, METADATA_MTIME_KEY};

/// Which of the three mutually exclusive write-path states this inode currently occupies.
enum Content {
    Clean,
    Buffered(Box<dyn BufferedWriteHandler>),
    DirtyTemp(Box<dyn ContentCache>),
}

impl Content {
    fn is_buffered(&self) -> bool {
        matches!(self, Content::Buffered(_))
    }
}

struct FileState {
    src: Option<MinObject>,
    src_generation: Generation,
    local: bool,
    unlinked: bool,
    content: Content,
    /// An mtime recorded locally while clean-with-no-src, dirty-temp, or between writes, applied
    /// the next time the inode talks to the bucket.
    pending_mtime: Option<OffsetDateTime>,
}

/// File behaviour: the dual write path (buffered streaming writer / temp-file spill), truncate,
/// and sync/flush with generation-based clobber detection.
pub struct FileInode<B: Bucket> {
    id: u64,
    name: Name,
    bucket: Arc<B>,
    clock: Arc<dyn Clock>,
    config: Arc<InodeConfig>,
    block_semaphore: Arc<WeightedSemaphore>,

    lookup_count: LookupCount,
    write_handle_count: AtomicU64,
    state: AsyncMutex<FileState>,
}

impl<B: Bucket + 'static> FileInode<B> {
    /// A brand-new, not-yet-persisted file: `local = true`, no backing generation.
    pub fn new_local(id: u64, name: Name, bucket: Arc<B>, clock: Arc<dyn Clock>, config: Arc<InodeConfig>, block_semaphore: Arc<WeightedSemaphore>) -> Self {
        Self {
            id,
            name,
            bucket,
            clock,
            config,
            block_semaphore,
            lookup_count: LookupCount::new(),
            write_handle_count: AtomicU64::new(0),
            state: AsyncMutex::new(FileState {
                src: None,
                src_generation: Generation::NONE,
                local: true,
                unlinked: false,
                content: Content::Clean,
                pending_mtime: None,
            }),
        }
    }

    /// A file inode constructed from a successful lookup against an existing backing object.
    pub fn new_from_min_object(
        id: u64,
        min_object: MinObject,
        bucket: Arc<B>,
        clock: Arc<dyn Clock>,
        config: Arc<InodeConfig>,
        block_semaphore: Arc<WeightedSemaphore>,
    ) -> Self {
        let name = min_object.name.clone();
        let generation = min_object.generation;
        Self {
            id,
            name,
            bucket,
            clock,
            config,
            block_semaphore,
            lookup_count: LookupCount::new(),
            write_handle_count: AtomicU64::new(0),
            state: AsyncMutex::new(FileState {
                src: Some(min_object),
                src_generation: generation,
                local: false,
                unlinked: false,
                content: Content::Clean,
                pending_mtime: None,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn lookup_count(&self) -> &LookupCount {
        &self.lookup_count
    }

    pub fn register_write_handle(&self) {
        self.write_handle_count.fetch_add(1, Ordering::SeqCst);
    }

    async fn read_all_bytes(&self, min_object: &MinObject) -> Result<Vec<u8>, InodeError> {
        let mut reader = self
            .bucket
            .new_reader(min_object.name.object_name(), min_object.generation, None)
            .await
            .map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?;
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Stat the backing object (if any) and compare against the inode's known generation.
    /// Returns `Ok(())` if unclobbered; a truly local file with no backing object has nothing to
    /// clobber.
    async fn check_clobbered(&self, state: &FileState) -> Result<(), InodeError> {
        let Some(src) = state.src.as_ref() else {
            return Ok(());
        };
        match self.bucket.stat_object(src.name.object_name()).await {
            Ok(current) => {
                if current.generation.is_clobbered_relative_to(&state.src_generation) {
                    Err(InodeError::FileClobbered(describe(&self.name)))
                } else {
                    Ok(())
                }
            }
            Err(BucketError::NotFound) => Err(InodeError::FileClobbered(describe(&self.name))),
            Err(e) => Err(InodeError::from_bucket_error(e, describe(&self.name))),
        }
    }

    /// Read `len` bytes starting at `offset` (spec §4.5).
    #[instrument(level = "debug", skip(self), fields(file = %self.name))]
    pub async fn read(&self, len: usize, offset: u64) -> Result<Vec<u8>, InodeError> {
        let mut state = self.state.lock().await;
        match &mut state.content {
            Content::Buffered(_) => Err(InodeError::NotReadableWhileWriting(describe(&self.name))),
            Content::DirtyTemp(cache) => {
                let mut buf = vec![0u8; len];
                let n = cache
                    .read_at(&mut buf, offset)
                    .map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
                buf.truncate(n);
                Ok(buf)
            }
            Content::Clean => {
                let Some(src) = state.src.clone() else {
                    return Ok(Vec::new()); // untouched local file: reads as empty
                };
                let current = self
                    .bucket
                    .stat_object(src.name.object_name())
                    .await
                    .map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?;
                if current.generation.is_clobbered_relative_to(&state.src_generation) {
                    return Err(InodeError::FileClobbered(describe(&self.name)));
                }
                let end = offset.saturating_add(len as u64);
                let mut reader = self
                    .bucket
                    .new_reader(src.name.object_name(), state.src_generation, Some(offset..end))
                    .await
                    .map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?;
                let mut out = Vec::new();
                while let Some(chunk) = reader
                    .next_chunk()
                    .await
                    .map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?
                {
                    out.extend_from_slice(&chunk);
                }
                Ok(out)
            }
        }
    }

    fn eligible_for_buffered(&self, state: &FileState) -> bool {
        self.config.enable_streaming_writes
            && !state.unlinked
            && self.write_handle_count.load(Ordering::SeqCst) > 0
            && (state.local || state.src.as_ref().is_some_and(|m| m.size == 0))
    }

    async fn materialize_dirty_temp(&self, state: &mut FileState) -> Result<(), InodeError> {
        if matches!(state.content, Content::DirtyTemp(_)) {
            return Ok(());
        }
        let seed = match &state.src {
            Some(src) if !state.local => Some(self.read_all_bytes(src).await?),
            _ => None,
        };
        let cache = match seed {
            Some(bytes) => TempFileContentCache::seeded_with(&bytes),
            None => TempFileContentCache::new_empty(),
        }
        .map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
        state.content = Content::DirtyTemp(Box::new(cache));
        Ok(())
    }

    /// Write `data` at `offset`. Returns whether the state was observably pushed out of the
    /// purely-in-memory buffered path (spec §4.5).
    #[log_failures(level = "warn", expected_level = "debug")]
    #[instrument(level = "debug", skip(self, data), fields(file = %self.name, len = data.len(), offset))]
    pub async fn write(&self, data: &[u8], offset: u64) -> Result<bool, InodeError> {
        let mut state = self.state.lock().await;
        if !state.local {
            self.check_clobbered(&state).await?;
        }

        match &mut state.content {
            Content::Clean => {
                if self.eligible_for_buffered(&state) && offset == 0 {
                    let preconditions = match &state.src {
                        Some(src) => Preconditions::if_generation_match(src.generation.object),
                        None => Preconditions::if_generation_match(0),
                    };
                    let mut handler = InMemoryBufferedWriteHandler::new(
                        Arc::clone(&self.bucket),
                        self.name.object_name().to_owned(),
                        self.config.block_size_mb,
                        preconditions,
                        Arc::clone(&self.block_semaphore),
                    );
                    if let Some(mtime) = state.pending_mtime {
                        handler.set_mtime(mtime);
                    }
                    handler.append(data).map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?;
                    state.content = Content::Buffered(Box::new(handler));
                    Ok(false)
                } else {
                    self.materialize_dirty_temp(&mut state).await?;
                    let Content::DirtyTemp(cache) = &mut state.content else {
                        unreachable!("just materialized dirty-temp content");
                    };
                    cache.write_at(data, offset).map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
                    Ok(false)
                }
            }
            Content::Buffered(handler) => {
                if offset == handler.total_size() {
                    handler.append(data).map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?;
                    return Ok(false);
                }

                // Out-of-order write: flush the handler to the bucket first, since that's the
                // only point that actually checks the captured generation preconditions. A clobber
                // here must abandon the write rather than silently demote to a temp file.
                let bytes = handler.buffered_bytes();
                let Content::Buffered(handler) = std::mem::replace(&mut state.content, Content::Clean) else {
                    unreachable!("just matched buffered content");
                };
                match handler.finalize().await {
                    Ok(new_object) => {
                        state.src_generation = new_object.generation;
                        state.src = Some(new_object);
                        state.local = false;
                    }
                    Err(BucketError::PreconditionFailed) => return Err(InodeError::FileClobbered(describe(&self.name))),
                    Err(e) => return Err(InodeError::from_bucket_error(e, describe(&self.name))),
                }

                let mut cache = TempFileContentCache::seeded_with(&bytes).map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
                cache.write_at(data, offset).map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
                state.content = Content::DirtyTemp(Box::new(cache));
                Ok(true)
            }
            Content::DirtyTemp(cache) => {
                cache.write_at(data, offset).map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
                Ok(false)
            }
        }
    }

    /// Truncate to `size` (spec §4.5). Shrinking a buffered inode is unsupported.
    #[instrument(level = "debug", skip(self), fields(file = %self.name, size))]
    pub async fn truncate(&self, size: u64) -> Result<(), InodeError> {
        let mut state = self.state.lock().await;
        if !state.local {
            self.check_clobbered(&state).await?;
        }

        match &mut state.content {
            Content::DirtyTemp(cache) => cache.truncate(size).map_err(|e| InodeError::ClientError(anyhow::Error::new(e))),
            Content::Buffered(handler) => {
                if size < handler.total_size() {
                    return Err(InodeError::UnsupportedTruncate(describe(&self.name)));
                }
                if size > handler.total_size() {
                    let padding = vec![0u8; (size - handler.total_size()) as usize];
                    handler.append(&padding).map_err(|e| InodeError::from_bucket_error(e, describe(&self.name)))?;
                }
                Ok(())
            }
            Content::Clean => {
                self.materialize_dirty_temp(&mut state).await?;
                let Content::DirtyTemp(cache) = &mut state.content else {
                    unreachable!("just materialized dirty-temp content");
                };
                cache.truncate(size).map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))
            }
        }
    }

    /// Record a new mtime, applied locally or pushed immediately depending on state (spec §4.5).
    #[instrument(level = "debug", skip(self), fields(file = %self.name))]
    pub async fn set_mtime(&self, mtime: OffsetDateTime) -> Result<(), InodeError> {
        let mut state = self.state.lock().await;
        match &mut state.content {
            Content::Buffered(handler) => {
                handler.set_mtime(mtime);
                Ok(())
            }
            Content::DirtyTemp(_) => {
                state.pending_mtime = Some(mtime);
                Ok(())
            }
            Content::Clean => {
                let Some(src) = state.src.clone() else {
                    state.pending_mtime = Some(mtime);
                    return Ok(());
                };
                let formatted = mtime
                    .format(&time::format_description::well_known::Rfc3339)
                    .map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
                let mut delta = std::collections::HashMap::new();
                delta.insert(METADATA_MTIME_KEY.to_owned(), Some(formatted));
                match self
                    .bucket
                    .update_object(src.name.object_name(), delta, Preconditions::if_generation_match(src.generation.object))
                    .await
                {
                    Ok(_) | Err(BucketError::PreconditionFailed) => Ok(()), // clobbered: server state wins, drop silently
                    Err(e) => Err(InodeError::from_bucket_error(e, describe(&self.name))),
                }
            }
        }
    }

    /// Reconcile in-memory state back to the bucket, returning whether anything was pushed.
    #[instrument(level = "debug", skip(self), fields(file = %self.name))]
    pub async fn sync(&self) -> Result<bool, InodeError> {
        let mut state = self.state.lock().await;
        if state.unlinked {
            return Ok(false);
        }
        match &state.content {
            Content::Clean => Ok(false),
            Content::DirtyTemp(_) => self.sync_dirty_temp(&mut state).await,
            Content::Buffered(_) => {
                if self.config.enable_zonal_bucket {
                    self.finalize_buffered(&mut state).await.map(|_| true)
                } else {
                    Ok(false) // non-zonal: Flush finalizes the upload, not Sync
                }
            }
        }
    }

    async fn sync_dirty_temp(&self, state: &mut FileState) -> Result<bool, InodeError> {
        let Content::DirtyTemp(cache) = &mut state.content else {
            unreachable!("sync_dirty_temp called outside dirty-temp state");
        };
        let mut data = vec![0u8; cache.size() as usize];
        cache.read_at(&mut data, 0).map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;

        let mut metadata = std::collections::HashMap::new();
        if let Some(mtime) = state.pending_mtime.take() {
            let formatted = mtime
                .format(&time::format_description::well_known::Rfc3339)
                .map_err(|e| InodeError::ClientError(anyhow::Error::new(e)))?;
            metadata.insert(METADATA_MTIME_KEY.to_owned(), formatted);
        }

        let preconditions = Preconditions {
            if_generation_match: Some(state.src_generation.object),
            if_metageneration_match: if state.src_generation.object == 0 { None } else { Some(state.src_generation.metadata) },
        };

        match self.bucket.insert(self.name.object_name(), data, preconditions, metadata).await {
            Ok(new_object) => {
                state.src_generation = new_object.generation;
                state.src = Some(new_object);
                state.local = false;
                state.content = Content::Clean;
                Ok(true)
            }
            Err(BucketError::PreconditionFailed) => Err(InodeError::FileClobbered(describe(&self.name))),
            Err(e) => Err(InodeError::from_bucket_error(e, describe(&self.name))),
        }
    }

    async fn finalize_buffered(&self, state: &mut FileState) -> Result<MinObject, InodeError> {
        let Content::Buffered(_) = &state.content else {
            unreachable!("finalize_buffered called outside buffered state");
        };
        let Content::Buffered(handler) = std::mem::replace(&mut state.content, Content::Clean) else {
            unreachable!("just matched buffered content");
        };
        match handler.finalize().await {
            Ok(new_object) => {
                state.src_generation = new_object.generation;
                state.src = Some(new_object.clone());
                state.local = false;
                Ok(new_object)
            }
            Err(BucketError::PreconditionFailed) => Err(InodeError::FileClobbered(describe(&self.name))),
            Err(e) => Err(InodeError::from_bucket_error(e, describe(&self.name))),
        }
    }

    /// Finalize whatever is in flight so the backing object reflects local state (spec §4.5).
    #[log_failures(level = "warn", expected_level = "debug")]
    #[instrument(level = "debug", skip(self), fields(file = %self.name))]
    pub async fn flush(&self) -> Result<(), InodeError> {
        let mut state = self.state.lock().await;
        if state.unlinked {
            return Ok(());
        }
        match &state.content {
            Content::Clean => Ok(()),
            Content::Buffered(_) => self.finalize_buffered(&mut state).await.map(|_| ()),
            Content::DirtyTemp(_) => self.sync_dirty_temp(&mut state).await.map(|_| ()),
        }
    }

    /// Mark the inode unlinked: buffered/dirty-temp state is discarded, and the bucket is never
    /// contacted (a crash or unlink after this point loses unsynced data, per contract).
    #[instrument(level = "debug", skip(self), fields(file = %self.name))]
    pub async fn unlink(&self) {
        let mut state = self.state.lock().await;
        state.unlinked = true;
        state.content = Content::Clean;
    }

    /// Decrement the write-handle count; when the last writer goes away, a buffered upload is
    /// finalized so later opens see persisted content without an explicit `Flush`.
    pub async fn deregister_file_handle(&self, read_only: bool) -> Result<(), InodeError> {
        if read_only {
            return Ok(());
        }
        let remaining = {
            loop {
                let current = self.write_handle_count.load(Ordering::SeqCst);
                let next = current.saturating_sub(1);
                if self
                    .write_handle_count
                    .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    break next;
                }
            }
        };
        if remaining == 0 {
            let mut state = self.state.lock().await;
            if !state.unlinked && state.content.is_buffered() {
                self.finalize_buffered(&mut state).await?;
            }
        }
        Ok(())
    }

    pub async fn is_using_bwh(&self) -> bool {
        self.state.lock().await.content.is_buffered()
    }

    pub async fn is_local(&self) -> bool {
        self.state.lock().await.local
    }

    pub async fn source_generation(&self) -> Generation {
        self.state.lock().await.src_generation
    }

    /// Authoritative for clean or zonal-buffered inodes; false for a non-zonal buffered inode
    /// after any write, since its generation won't reflect reality until `Flush`.
    pub async fn source_generation_is_authoritative(&self) -> bool {
        let state = self.state.lock().await;
        match &state.content {
            Content::Clean => true,
            Content::Buffered(_) => self.config.enable_zonal_bucket,
            Content::DirtyTemp(_) => false,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::bucket::mock::MockBucket;
    use crate::clock::TestClock;

    fn config() -> Arc<InodeConfig> {
        Arc::new(InodeConfig::default())
    }

    /// A local file with one write handle already registered, matching the invariant that a
    /// dispatcher only ever calls `write` after opening the inode for writing.
    fn new_local_file(bucket: Arc<MockBucket>) -> FileInode<MockBucket> {
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let name = Name::new_file(&Name::new_root("b"), "f").unwrap();
        let file = FileInode::new_local(1, name, bucket, clock, config(), WeightedSemaphore::new(16));
        file.register_write_handle();
        file
    }

    #[tokio::test]
    async fn write_without_a_registered_handle_falls_through_to_temp_file() {
        let bucket = Arc::new(MockBucket::new());
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let name = Name::new_file(&Name::new_root("b"), "f").unwrap();
        let file = FileInode::new_local(1, name, bucket, clock, config(), WeightedSemaphore::new(16));

        file.write(b"taco", 0).await.unwrap();
        assert!(!file.is_using_bwh().await, "no write handle registered, so buffered path is ineligible");
    }

    #[tokio::test]
    async fn sequential_write_stays_buffered() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));

        let synced = file.write(b"taco", 0).await.unwrap();
        assert!(!synced);
        assert!(file.is_using_bwh().await);

        file.flush().await.unwrap();
        assert!(!file.is_using_bwh().await);
        assert!(!file.is_local().await);

        let data = file.read(10, 0).await.unwrap();
        assert_eq!(data, b"taco");
    }

    #[tokio::test]
    async fn out_of_order_write_demotes_to_temp_file() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));

        file.write(b"taco", 0).await.unwrap();
        let synced = file.write(b"hello", 5).await.unwrap();
        assert!(synced, "out-of-order write should report an observable push");
        assert!(!file.is_using_bwh().await);

        file.sync().await.unwrap();
        let data = file.read(10, 0).await.unwrap();
        assert_eq!(data, b"taco\x00hello");
    }

    #[tokio::test]
    async fn clobber_on_write_after_out_of_band_replace() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));
        file.write(b"ab", 0).await.unwrap();

        bucket.seed_object("f", b"taco".to_vec(), HashMap::new()).await;

        let err = file.write(b"hello", 10).await.unwrap_err();
        assert!(matches!(err, InodeError::FileClobbered(_)));

        let current = bucket.stat_object("f").await.unwrap();
        assert_eq!(current.size, 4);
    }

    #[tokio::test]
    async fn truncate_downward_on_buffered_is_unsupported() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));
        file.write(b"hello", 0).await.unwrap();

        let err = file.truncate(2).await.unwrap_err();
        assert!(matches!(err, InodeError::UnsupportedTruncate(_)));
    }

    #[tokio::test]
    async fn truncate_upward_on_buffered_pads_with_zeros() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));
        file.write(b"hi", 0).await.unwrap();
        file.truncate(4).await.unwrap();
        file.flush().await.unwrap();

        let data = file.read(10, 0).await.unwrap();
        assert_eq!(data, b"hi\x00\x00");
    }

    #[tokio::test]
    async fn read_while_buffered_is_an_error() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));
        file.write(b"hi", 0).await.unwrap();

        let err = file.read(10, 0).await.unwrap_err();
        assert!(matches!(err, InodeError::NotReadableWhileWriting(_)));
    }

    #[tokio::test]
    async fn unlink_discards_buffered_state_and_never_syncs() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));
        file.write(b"hi", 0).await.unwrap();

        file.unlink().await;
        assert!(!file.is_using_bwh().await);
        assert!(file.sync().await.unwrap() == false);
        assert!(bucket.stat_object("f").await.is_err());
    }

    #[tokio::test]
    async fn sync_on_clobbered_dirty_temp_leaves_generation_unchanged() {
        let bucket = Arc::new(MockBucket::new());
        let seed = bucket.seed_object("f", b"orig".to_vec(), HashMap::new()).await;
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let file = FileInode::new_from_min_object(1, seed.clone(), Arc::clone(&bucket), clock, config(), WeightedSemaphore::new(16));

        file.truncate(2).await.unwrap(); // materializes dirty-temp, seeded with "orig"
        bucket.seed_object("f", b"clobbered".to_vec(), HashMap::new()).await;

        let err = file.sync().await.unwrap_err();
        assert!(matches!(err, InodeError::FileClobbered(_)));
        assert_eq!(file.source_generation().await, seed.generation);
    }

    #[tokio::test]
    async fn deregister_last_write_handle_finalizes_buffered_upload() {
        let bucket = Arc::new(MockBucket::new());
        let file = new_local_file(Arc::clone(&bucket));
        file.write(b"hello", 0).await.unwrap();

        file.deregister_file_handle(false).await.unwrap();
        assert!(!file.is_using_bwh().await);
        assert!(bucket.stat_object("f").await.is_ok());
    }
}
