//! The `Bucket` capability this crate consumes from the object-store client: list / get / stat /
//! insert / compose / update / delete / getFolder.

#[cfg(feature = "mock")]
pub mod mock;

use std::ops::Range;

use async_trait::async_trait;
use auto_impl::auto_impl;
use thiserror::Error;

use crate::generation::Generation;
use crate::types::MinObject;

/// A single page of a directory listing.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsResult {
    pub objects: Vec<MinObject>,
    /// Common prefixes rolled up by the `/` delimiter: the directory-leaf entries of a listing.
    pub prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
}

/// Preconditions attached to a mutating request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preconditions {
    pub if_generation_match: Option<u64>,
    pub if_metageneration_match: Option<u64>,
}

impl Preconditions {
    pub fn if_generation_match(generation: u64) -> Self {
        Self {
            if_generation_match: Some(generation),
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// A byte stream opened for reading part or all of an object.
#[async_trait]
pub trait Reader: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, BucketError>;
}

/// Result of a successful HNS folder lookup.
#[derive(Debug, Clone)]
pub struct Folder {
    pub generation: Generation,
}

/// A synthesized single-read body, used by the mock bucket and in tests.
pub struct BufferedReader {
    chunks: std::vec::IntoIter<Vec<u8>>,
}

impl BufferedReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            chunks: vec![data].into_iter(),
        }
    }
}

#[async_trait]
impl Reader for BufferedReader {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, BucketError> {
        Ok(self.chunks.next())
    }
}

/// The object-store capability consumed by the inode layer. Implementations are expected to be
/// cheaply clonable (e.g. an `Arc<Inner>`), mirroring the object-client convention in this space.
#[async_trait]
#[auto_impl(Arc)]
pub trait Bucket: Send + Sync {
    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: &str,
        start_offset: &str,
        continuation_token: Option<&str>,
        max_results: usize,
    ) -> Result<ListObjectsResult, BucketError>;

    async fn stat_object(&self, key: &str) -> Result<MinObject, BucketError>;

    async fn new_reader(
        &self,
        key: &str,
        generation: Generation,
        range: Option<Range<u64>>,
    ) -> Result<Box<dyn Reader>, BucketError>;

    async fn insert(
        &self,
        key: &str,
        data: Vec<u8>,
        preconditions: Preconditions,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<MinObject, BucketError>;

    async fn compose(
        &self,
        sources: &[String],
        destination: &str,
        preconditions: Preconditions,
    ) -> Result<MinObject, BucketError>;

    async fn update_object(
        &self,
        key: &str,
        metadata_delta: std::collections::HashMap<String, Option<String>>,
        preconditions: Preconditions,
    ) -> Result<MinObject, BucketError>;

    async fn delete_object(&self, key: &str, generation: Option<Generation>) -> Result<(), BucketError>;

    async fn get_folder(&self, dir_key: &str) -> Result<Folder, BucketError>;

    async fn delete_folder(&self, dir_key: &str) -> Result<(), BucketError>;
}

/// Errors a [Bucket] implementation can surface. [crate::error::InodeError] translates these
/// further for inode-layer callers.
#[derive(Debug, Error)]
pub enum BucketError {
    #[error("object or folder not found")]
    NotFound,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("transient error")]
    Transient(#[source] anyhow::Error),
}
