//! Hierarchical-namespace (managed folder) support, consulted by [crate::dir::DirInode] lookups
//! when hierarchical namespace support is enabled.

use std::collections::HashMap;

use crate::bucket::{Bucket, BucketError};
use crate::name::Name;
use crate::types::{Core, MinObject, UpdatedTime};

/// Look up `dir_name` as a managed folder. A `NotFound` from the bucket means "no folder", not an
/// error: HNS folders are optional even in an HNS-enabled bucket, since a directory can still be
/// purely implicit.
pub async fn find_explicit_folder<B: Bucket>(bucket: &B, dir_name: &Name) -> Result<Option<Core>, BucketError> {
    match bucket.get_folder(dir_name.object_name()).await {
        Ok(folder) => Ok(Some(Core {
            full_name: dir_name.clone(),
            min_object: Some(MinObject {
                name: dir_name.clone(),
                generation: folder.generation,
                size: 0,
                content_encoding: None,
                metadata: HashMap::new(),
                updated: UpdatedTime(time::OffsetDateTime::UNIX_EPOCH),
            }),
            local: false,
        })),
        Err(BucketError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}
