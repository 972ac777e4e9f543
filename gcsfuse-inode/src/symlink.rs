//! Read-only symlink inode with an eagerly resolved target.

use gcsfuse_inode_macros::log_failures;

use crate::bucket::Bucket;
use crate::error::{describe, InodeError};
use crate::name::Name;
use crate::types::{MinObject, METADATA_SYMLINK_TARGET_KEY};

/// Maximum length of a symlink target body, matching the bound a real object-store-backed
/// filesystem imposes to keep `readlink` a single small read.
pub const MAX_SYMLINK_TARGET_LENGTH: usize = 4095;

/// A resolved, read-only symlink. The target is resolved once at construction: if the deprecated
/// `gcsfuse_symlink_target` metadata key holds a non-empty value it is used verbatim, otherwise the
/// object body is read and must not exceed [MAX_SYMLINK_TARGET_LENGTH] bytes.
pub struct SymlinkInode {
    id: u64,
    name: Name,
    min_object: MinObject,
    target: String,
}

impl SymlinkInode {
    /// Construct a symlink inode from an already-fetched [MinObject], reading the object body via
    /// `bucket` only if the deprecated metadata form is absent.
    #[log_failures(level = "warn", expected_level = "debug")]
    pub async fn new<B: Bucket>(id: u64, bucket: &B, min_object: MinObject) -> Result<Self, InodeError> {
        let target = match min_object.metadata.get(METADATA_SYMLINK_TARGET_KEY) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => Self::read_body_as_target(bucket, &min_object).await?,
        };
        let name = min_object.name.clone();
        Ok(Self {
            id,
            name,
            min_object,
            target,
        })
    }

    async fn read_body_as_target<B: Bucket>(bucket: &B, min_object: &MinObject) -> Result<String, InodeError> {
        let mut reader = bucket
            .new_reader(min_object.name.object_name(), min_object.generation, None)
            .await
            .map_err(|e| InodeError::from_bucket_error(e, describe(&min_object.name)))?;

        let mut body = Vec::new();
        loop {
            match reader.next_chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() > MAX_SYMLINK_TARGET_LENGTH {
                        return Err(InodeError::SymlinkTargetTooLong(describe(&min_object.name)));
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(InodeError::from_bucket_error(e, describe(&min_object.name))),
            }
        }
        String::from_utf8(body).map_err(|_| InodeError::CorruptedMetadata(describe(&min_object.name)))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn min_object(&self) -> &MinObject {
        &self.min_object
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Attributes report `size == target.len()`, matching how a real symlink's stat behaves.
    pub fn size(&self) -> u64 {
        self.target.len() as u64
    }

    /// Symlinks are read-only; unlinking one is always a no-op at this layer (the dispatcher's
    /// delete of the backing object is handled the same way as any other file).
    pub fn unlink(&self) {}
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::bucket::mock::MockBucket;
    use crate::generation::Generation;
    use crate::types::UpdatedTime;

    fn min_object(name: Name, metadata: HashMap<String, String>) -> MinObject {
        MinObject {
            name,
            generation: Generation::new(1, 1, 0),
            size: 0,
            content_encoding: None,
            metadata,
            updated: UpdatedTime(time::OffsetDateTime::UNIX_EPOCH),
        }
    }

    #[tokio::test]
    async fn target_from_deprecated_metadata_key() {
        let bucket = MockBucket::new();
        let root = Name::new_root("b");
        let name = Name::new_file(&root, "link").unwrap();
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_SYMLINK_TARGET_KEY.to_owned(), "/some/target".to_owned());

        let symlink = SymlinkInode::new(2, &bucket, min_object(name, metadata)).await.unwrap();
        assert_eq!(symlink.target(), "/some/target");
        assert_eq!(symlink.size(), "/some/target".len() as u64);
    }

    #[tokio::test]
    async fn target_from_object_body_when_metadata_absent() {
        let bucket = MockBucket::new();
        let obj = bucket.seed_object("link", b"../other".to_vec(), HashMap::new()).await;

        let symlink = SymlinkInode::new(3, &bucket, obj).await.unwrap();
        assert_eq!(symlink.target(), "../other");
    }

    #[tokio::test]
    async fn target_over_length_bound_fails_construction() {
        let bucket = MockBucket::new();
        let body = vec![b'a'; MAX_SYMLINK_TARGET_LENGTH + 1];
        let obj = bucket.seed_object("link", body, HashMap::new()).await;

        let err = SymlinkInode::new(4, &bucket, obj).await.unwrap_err();
        assert!(matches!(err, InodeError::SymlinkTargetTooLong(_)));
    }
}
