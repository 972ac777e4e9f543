//! Background worker that populates a directory's [TypeCache][crate::type_cache::TypeCache] with
//! its siblings' types after the first lookup miss (spec §4.3).
//!
//! The `state` field is a CAS, not a mutex, so a foreground lookup arming the prefetcher never
//! blocks: at most one background run is ever in flight per directory, and a run that loses the
//! race simply does nothing. The run itself holds the shared `TypeCache` lock only to insert
//! results, never while the list request to the bucket is in flight.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_lock::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::bucket::Bucket;
use crate::clock::Clock;
use crate::future::Spawn;
use crate::semaphore::WeightedSemaphore;
use crate::type_cache::TypeCache;
use crate::types::{MinObject, Type};

const READY: u8 = 0;
const IN_PROGRESS: u8 = 1;

/// A cooperative cancellation flag: cheap to clone, checked at yield points rather than
/// interrupting in-flight work.
#[derive(Clone, Default)]
struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tunables consumed from [crate::config::InodeConfig] at construction.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchConfig {
    pub enabled: bool,
    pub ttl: std::time::Duration,
    pub stat_cache_max_size_mb: i64,
    pub max_prefetch_count: u64,
    pub max_page_size: usize,
}

/// Background sibling-metadata prefetcher for one directory.
pub struct MetadataPrefetcher<B, S> {
    bucket: Arc<B>,
    spawner: S,
    semaphore: Arc<WeightedSemaphore>,
    clock: Arc<dyn Clock>,
    config: PrefetchConfig,

    state: AtomicU8,
    is_large_dir: AtomicBool,
    last_prefetch_time: Mutex<Option<Instant>>,
    /// Cancelled once on `destroy`; after that no new run is ever armed.
    inode_ctx: CancelToken,
    /// The token for whichever run is currently in flight, if any.
    current_run: Mutex<Option<CancelToken>>,
}

impl<B, S> MetadataPrefetcher<B, S>
where
    B: Bucket + 'static,
    S: Spawn,
{
    pub fn new(bucket: Arc<B>, spawner: S, semaphore: Arc<WeightedSemaphore>, clock: Arc<dyn Clock>, config: PrefetchConfig) -> Self {
        Self {
            bucket,
            spawner,
            semaphore,
            clock,
            config,
            state: AtomicU8::new(READY),
            is_large_dir: AtomicBool::new(false),
            last_prefetch_time: Mutex::new(None),
            inode_ctx: CancelToken::default(),
            current_run: Mutex::new(None),
        }
    }

    pub fn is_large_dir(&self) -> bool {
        self.is_large_dir.load(Ordering::SeqCst)
    }

    fn due(&self) -> bool {
        let last = *self.last_prefetch_time.lock().unwrap();
        match last {
            None => true,
            Some(t) => self.clock.monotonic_now().saturating_duration_since(t) >= self.config.ttl,
        }
    }

    /// Arm a prefetch run for this directory's siblings, starting from `full_object_name` if the
    /// directory was previously marked large. Returns immediately; the run (if any) proceeds on
    /// the configured spawner.
    pub fn run(self: &Arc<Self>, dir_prefix: String, full_object_name: String, type_cache: Arc<AsyncMutex<TypeCache>>) {
        if !self.config.enabled
            || self.config.ttl.is_zero()
            || self.config.stat_cache_max_size_mb == 0
            || self.inode_ctx.is_cancelled()
            || !self.due()
        {
            return;
        }

        if self
            .state
            .compare_exchange(READY, IN_PROGRESS, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return; // a run is already in progress
        }

        let run_token = CancelToken::default();
        *self.current_run.lock().unwrap() = Some(run_token.clone());

        let this = Arc::clone(self);
        let inode_ctx = self.inode_ctx.clone();
        self.spawner.spawn(async move {
            this.run_inner(dir_prefix, full_object_name, type_cache, run_token, inode_ctx).await;
        });
    }

    async fn run_inner(
        self: Arc<Self>,
        dir_prefix: String,
        full_object_name: String,
        type_cache: Arc<AsyncMutex<TypeCache>>,
        run_token: CancelToken,
        inode_ctx: CancelToken,
    ) {
        let Some(_permit) = self.semaphore.try_acquire(1) else {
            debug!(dir = %dir_prefix, "metadata prefetch skipped: semaphore saturated");
            self.state.store(READY, Ordering::SeqCst);
            *self.current_run.lock().unwrap() = None;
            return;
        };

        let start_offset = if self.is_large_dir() { full_object_name.as_str() } else { "" };
        let result = self.list_all(&dir_prefix, start_offset, &type_cache, &run_token, &inode_ctx).await;

        *self.current_run.lock().unwrap() = None;
        match result {
            Ok(()) => {
                *self.last_prefetch_time.lock().unwrap() = Some(self.clock.monotonic_now());
                debug!(dir = %dir_prefix, "metadata prefetch completed");
            }
            Err(PrefetchAbort::Cancelled) => {
                debug!(dir = %dir_prefix, "metadata prefetch cancelled");
            }
            Err(PrefetchAbort::ListError(e)) => {
                warn!(dir = %dir_prefix, error = %e, "metadata prefetch list error, swallowed");
            }
        }
        self.state.store(READY, Ordering::SeqCst);
    }

    async fn list_all(
        &self,
        dir_prefix: &str,
        start_offset: &str,
        type_cache: &Arc<AsyncMutex<TypeCache>>,
        run_token: &CancelToken,
        inode_ctx: &CancelToken,
    ) -> Result<(), PrefetchAbort> {
        let mut continuation_token: Option<String> = None;
        let mut seen: u64 = 0;

        loop {
            if run_token.is_cancelled() || inode_ctx.is_cancelled() {
                return Err(PrefetchAbort::Cancelled);
            }

            let remaining = self.config.max_prefetch_count.saturating_sub(seen);
            if remaining == 0 {
                self.is_large_dir.store(true, Ordering::SeqCst);
                return Ok(());
            }
            let page_size = remaining.min(self.config.max_page_size as u64) as usize;

            let page = self
                .bucket
                .list_objects(
                    dir_prefix,
                    "/",
                    start_offset,
                    continuation_token.as_deref(),
                    page_size,
                )
                .await
                .map_err(|e| PrefetchAbort::ListError(anyhow::Error::new(e)))?;

            if run_token.is_cancelled() || inode_ctx.is_cancelled() {
                return Err(PrefetchAbort::Cancelled);
            }

            {
                let mut cache = type_cache.lock().await;
                for object in &page.objects {
                    let (leaf, ty) = leaf_and_type(dir_prefix, object);
                    if !leaf.is_empty() {
                        cache.insert(&leaf, ty);
                    }
                }
                for prefix in &page.prefixes {
                    if let Some(leaf) = leaf_of_common_prefix(dir_prefix, prefix) {
                        cache.insert(&leaf, Type::ExplicitDir);
                    }
                }
            }

            seen += (page.objects.len() + page.prefixes.len()) as u64;

            match page.next_continuation_token {
                Some(tok) => {
                    if seen >= self.config.max_prefetch_count {
                        self.is_large_dir.store(true, Ordering::SeqCst);
                        return Ok(());
                    }
                    continuation_token = Some(tok);
                }
                None => return Ok(()),
            }
        }
    }

    /// Cancel only the currently in-flight run, if any. Does not prevent future runs.
    pub fn cancel(&self) {
        if let Some(token) = self.current_run.lock().unwrap().as_ref() {
            token.cancel();
        }
    }

    /// Cancel `inode_ctx`, which transitively cancels any in-flight run and prevents new ones.
    /// Terminal: called once, from `DirInode::destroy`.
    pub fn destroy(&self) {
        self.cancel();
        self.inode_ctx.cancel();
    }
}

enum PrefetchAbort {
    Cancelled,
    ListError(anyhow::Error),
}

fn leaf_and_type(dir_prefix: &str, object: &MinObject) -> (String, Type) {
    let key = object.name.object_name();
    let Some(rest) = key.strip_prefix(dir_prefix) else {
        return (String::new(), Type::Unknown);
    };
    if rest.is_empty() {
        return (String::new(), Type::Unknown);
    }
    if let Some(leaf) = rest.strip_suffix('/') {
        return (leaf.to_string(), Type::ExplicitDir);
    }
    if object.is_symlink() {
        (rest.to_string(), Type::Symlink)
    } else {
        (rest.to_string(), Type::RegularFile)
    }
}

fn leaf_of_common_prefix(dir_prefix: &str, prefix: &str) -> Option<String> {
    let rest = prefix.strip_prefix(dir_prefix)?;
    rest.strip_suffix('/').map(str::to_string)
}


/// Exhaustive interleaving check, over the `state` CAS only: concurrent lookups racing to arm a
/// prefetch run must never spawn more than one. The spawner here never polls the future, so this
/// isolates the arming race from the body of `run_inner`.
#[cfg(all(test, feature = "shuttle"))]
mod shuttle_tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::bucket::mock::MockBucket;
    use crate::clock::TestClock;

    struct CountingSpawn {
        armed: Arc<AtomicUsize>,
    }

    impl Spawn for CountingSpawn {
        type JoinHandle<T> = ();

        fn spawn<F>(&self, future: F) -> Self::JoinHandle<F::Output>
        where
            F: std::future::Future + Send + 'static,
            F::Output: Send + 'static,
        {
            self.armed.fetch_add(1, Ordering::SeqCst);
            drop(future);
        }
    }

    #[test]
    fn concurrent_lookups_arm_at_most_one_run() {
        shuttle::check_random(
            || {
                let armed = Arc::new(AtomicUsize::new(0));
                let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
                let bucket = Arc::new(MockBucket::new());
                let semaphore = WeightedSemaphore::new(4);
                let prefetcher = Arc::new(MetadataPrefetcher::new(
                    bucket,
                    CountingSpawn { armed: Arc::clone(&armed) },
                    semaphore,
                    Arc::clone(&clock),
                    test_config(),
                ));
                let type_cache = Arc::new(AsyncMutex::new(TypeCache::new(clock, Duration::from_secs(60), -1)));

                let handles: Vec<_> = (0..3)
                    .map(|_| {
                        let prefetcher = Arc::clone(&prefetcher);
                        let type_cache = Arc::clone(&type_cache);
                        shuttle::thread::spawn(move || {
                            prefetcher.run("dir/".to_string(), "dir/a".to_string(), type_cache);
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }

                assert_eq!(armed.load(Ordering::SeqCst), 1, "a simultaneous race should arm exactly one run");
            },
            100,
        );
    }
}
