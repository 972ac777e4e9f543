//! An in-memory [Bucket] double for tests, gated behind the `mock` feature. Generations are
//! derived from a seeded `ChaCha20Rng` so test failures are reproducible across runs; content
//! hashes use `md-5` purely to mimic the shape of a real object store's etag, not for anything
//! cryptographic.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use async_io::Timer;
use async_lock::Mutex;
use async_trait::async_trait;
use md5::{Digest, Md5};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use time::OffsetDateTime;

use crate::bucket::{Bucket, BucketError, BufferedReader, Folder, ListObjectsResult, Preconditions, Reader};
use crate::generation::Generation;
use crate::name::Name;
use crate::types::{MinObject, UpdatedTime};

/// Every real bucket call suspends on network I/O; yielding here exercises callers' assumptions
/// about cancellation and lock discipline around suspension points instead of resolving instantly.
async fn simulate_round_trip() {
    Timer::after(std::time::Duration::from_nanos(1)).await;
}

struct StoredObject {
    data: Vec<u8>,
    generation: Generation,
    metadata: HashMap<String, String>,
}

struct Inner {
    objects: BTreeMap<String, StoredObject>,
    folders: BTreeMap<String, Generation>,
    rng: ChaCha20Rng,
}

/// A single-bucket in-memory double for [Bucket], suitable for deterministic tests.
pub struct MockBucket {
    bucket: String,
    inner: Mutex<Inner>,
    object_counter: AtomicU64,
}

impl MockBucket {
    pub fn new() -> Self {
        Self::seeded(0)
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            bucket: "mock-bucket".to_string(),
            inner: Mutex::new(Inner {
                objects: BTreeMap::new(),
                folders: BTreeMap::new(),
                rng: ChaCha20Rng::seed_from_u64(seed),
            }),
            object_counter: AtomicU64::new(1),
        }
    }

    fn next_generation(&self, metageneration: u64) -> Generation {
        Generation::new(self.object_counter.fetch_add(1, Ordering::SeqCst), metageneration, 0)
    }

    fn etag(data: &[u8]) -> String {
        let digest = Md5::digest(data);
        format!("{digest:x}")
    }

    fn min_object(&self, key: &str, stored: &StoredObject) -> MinObject {
        MinObject {
            name: Name::from_object_name(&self.bucket, key),
            generation: stored.generation,
            size: stored.data.len() as u64,
            content_encoding: None,
            metadata: stored.metadata.clone(),
            updated: UpdatedTime(OffsetDateTime::now_utc()),
        }
    }

    /// Pre-seed an object directly, bypassing preconditions, for test setup.
    pub async fn seed_object(&self, key: &str, data: Vec<u8>, metadata: HashMap<String, String>) -> MinObject {
        let generation = self.next_generation(1);
        let mut guard = self.inner.lock().await;
        guard.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.clone(),
                generation,
                metadata: metadata.clone(),
            },
        );
        drop(guard);
        MinObject {
            name: Name::from_object_name(&self.bucket, key),
            generation,
            size: data.len() as u64,
            content_encoding: None,
            metadata,
            updated: UpdatedTime(OffsetDateTime::now_utc()),
        }
    }

    pub async fn seed_folder(&self, key: &str) {
        let generation = self.next_generation(1);
        self.inner.lock().await.folders.insert(key.to_string(), generation);
    }
}

impl Default for MockBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bucket for MockBucket {
    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: &str,
        start_offset: &str,
        continuation_token: Option<&str>,
        max_results: usize,
    ) -> Result<ListObjectsResult, BucketError> {
        simulate_round_trip().await;
        let guard = self.inner.lock().await;
        let start_after = continuation_token.unwrap_or(start_offset).to_string();

        let mut objects = Vec::new();
        let mut prefixes = Vec::new();
        let mut next_continuation_token = None;
        let mut seen_prefixes = std::collections::BTreeSet::new();

        for (key, stored) in guard.objects.range(start_after.clone()..) {
            if !key.starts_with(prefix) {
                if key.as_str() > prefix && !key.starts_with(prefix) {
                    // Past the prefix's lexicographic range entirely.
                    if !prefix.is_empty() && key.as_str() > format!("{prefix}\u{10FFFF}") {
                        break;
                    }
                }
                continue;
            }
            if key == start_after.as_str() {
                continue;
            }

            let rest = &key[prefix.len()..];
            if !delimiter.is_empty() {
                if let Some(idx) = rest.find(delimiter) {
                    let common_prefix = format!("{prefix}{}", &rest[..=idx]);
                    if seen_prefixes.insert(common_prefix.clone()) {
                        prefixes.push(common_prefix);
                    }
                    continue;
                }
            }

            if objects.len() + prefixes.len() >= max_results {
                next_continuation_token = Some(key.clone());
                break;
            }
            objects.push(self.min_object(key, stored));
        }

        Ok(ListObjectsResult {
            objects,
            prefixes,
            next_continuation_token,
        })
    }

    async fn stat_object(&self, key: &str) -> Result<MinObject, BucketError> {
        simulate_round_trip().await;
        let guard = self.inner.lock().await;
        let stored = guard.objects.get(key).ok_or(BucketError::NotFound)?;
        Ok(self.min_object(key, stored))
    }

    async fn new_reader(
        &self,
        key: &str,
        generation: Generation,
        range: Option<Range<u64>>,
    ) -> Result<Box<dyn Reader>, BucketError> {
        simulate_round_trip().await;
        let guard = self.inner.lock().await;
        let stored = guard.objects.get(key).ok_or(BucketError::NotFound)?;
        if !generation.is_none() && stored.generation.compare(&generation) != std::cmp::Ordering::Equal {
            return Err(BucketError::PreconditionFailed);
        }
        let data = match range {
            Some(r) => {
                let start = (r.start as usize).min(stored.data.len());
                let end = (r.end as usize).min(stored.data.len());
                stored.data[start..end].to_vec()
            }
            None => stored.data.clone(),
        };
        Ok(Box::new(BufferedReader::new(data)))
    }

    async fn insert(
        &self,
        key: &str,
        data: Vec<u8>,
        preconditions: Preconditions,
        metadata: HashMap<String, String>,
    ) -> Result<MinObject, BucketError> {
        simulate_round_trip().await;
        let mut guard = self.inner.lock().await;
        let existing_generation = guard.objects.get(key).map(|o| o.generation.object);
        if let Some(expected) = preconditions.if_generation_match {
            let matches = match (expected, existing_generation) {
                (0, None) => true,
                (0, Some(_)) => false,
                (want, Some(have)) => want == have,
                (_, None) => false,
            };
            if !matches {
                return Err(BucketError::PreconditionFailed);
            }
        }
        // Touch the rng so every mutating call perturbs future generations deterministically.
        let _ = guard.rng.next_u64();

        let generation = self.next_generation(1);
        let mut metadata = metadata;
        metadata.insert("etag".to_string(), Self::etag(&data));
        let stored = StoredObject {
            data,
            generation,
            metadata,
        };
        let object = self.min_object(key, &stored);
        guard.objects.insert(key.to_string(), stored);
        Ok(object)
    }

    async fn compose(
        &self,
        sources: &[String],
        destination: &str,
        preconditions: Preconditions,
    ) -> Result<MinObject, BucketError> {
        simulate_round_trip().await;
        let data = {
            let guard = self.inner.lock().await;
            let mut combined = Vec::new();
            for source in sources {
                let stored = guard.objects.get(source).ok_or(BucketError::NotFound)?;
                combined.extend_from_slice(&stored.data);
            }
            combined
        };
        self.insert(destination, data, preconditions, HashMap::new()).await
    }

    async fn update_object(
        &self,
        key: &str,
        metadata_delta: HashMap<String, Option<String>>,
        preconditions: Preconditions,
    ) -> Result<MinObject, BucketError> {
        simulate_round_trip().await;
        let mut guard = self.inner.lock().await;
        let stored = guard.objects.get_mut(key).ok_or(BucketError::NotFound)?;
        if let Some(expected) = preconditions.if_generation_match {
            if stored.generation.object != expected {
                return Err(BucketError::PreconditionFailed);
            }
        }
        for (k, v) in metadata_delta {
            match v {
                Some(value) => {
                    stored.metadata.insert(k, value);
                }
                None => {
                    stored.metadata.remove(&k);
                }
            }
        }
        stored.generation.metadata += 1;
        Ok(self.min_object(key, stored))
    }

    async fn delete_object(&self, key: &str, generation: Option<Generation>) -> Result<(), BucketError> {
        simulate_round_trip().await;
        let mut guard = self.inner.lock().await;
        let Some(stored) = guard.objects.get(key) else {
            return Ok(());
        };
        if let Some(expected) = generation {
            if stored.generation.compare(&expected) != std::cmp::Ordering::Equal {
                return Err(BucketError::PreconditionFailed);
            }
        }
        guard.objects.remove(key);
        Ok(())
    }

    async fn get_folder(&self, dir_key: &str) -> Result<Folder, BucketError> {
        simulate_round_trip().await;
        let guard = self.inner.lock().await;
        let generation = guard.folders.get(dir_key).copied().ok_or(BucketError::NotFound)?;
        Ok(Folder { generation })
    }

    async fn delete_folder(&self, dir_key: &str) -> Result<(), BucketError> {
        simulate_round_trip().await;
        let mut guard = self.inner.lock().await;
        guard.folders.remove(dir_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_respects_if_generation_match_zero() {
        let bucket = MockBucket::new();
        let object = bucket
            .insert("a/f", b"hi".to_vec(), Preconditions::if_generation_match(0), HashMap::new())
            .await
            .unwrap();
        assert_eq!(object.size, 2);

        let conflict = bucket
            .insert("a/f", b"bye".to_vec(), Preconditions::if_generation_match(0), HashMap::new())
            .await;
        assert!(matches!(conflict, Err(BucketError::PreconditionFailed)));
    }

    #[tokio::test]
    async fn stat_missing_object_is_not_found() {
        let bucket = MockBucket::new();
        assert!(matches!(bucket.stat_object("missing").await, Err(BucketError::NotFound)));
    }

    #[tokio::test]
    async fn list_objects_rolls_up_common_prefixes() {
        let bucket = MockBucket::new();
        for key in ["dir/a", "dir/b", "dir/sub/c"] {
            bucket
                .insert(key, b"x".to_vec(), Preconditions::none(), HashMap::new())
                .await
                .unwrap();
        }

        let listing = bucket.list_objects("dir/", "/", "", None, 10).await.unwrap();
        assert_eq!(listing.objects.len(), 2);
        assert_eq!(listing.prefixes, vec!["dir/sub/".to_string()]);
    }

    #[tokio::test]
    async fn delete_missing_object_is_idempotent() {
        let bucket = MockBucket::new();
        assert!(bucket.delete_object("nope", None).await.is_ok());
    }
}
