//! Shared value types: the inferred [Type] of a name, the [MinObject] projection consumed from
//! the bucket, and [Core], the bundle used to construct a child inode after a successful lookup.

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::generation::Generation;
use crate::name::Name;

/// The kind of thing a name resolves to. `ImplicitDir` is materialised only when a prefix probe
/// finds at least one object with the directory's prefix, since implicit directories have no
/// object of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Unknown,
    Nonexistent,
    RegularFile,
    ExplicitDir,
    ImplicitDir,
    Symlink,
}

impl Type {
    pub fn is_dir(&self) -> bool {
        matches!(self, Type::ExplicitDir | Type::ImplicitDir)
    }
}

impl From<Type> for Option<fuser::FileType> {
    fn from(kind: Type) -> Self {
        match kind {
            Type::RegularFile => Some(fuser::FileType::RegularFile),
            Type::ExplicitDir | Type::ImplicitDir => Some(fuser::FileType::Directory),
            Type::Symlink => Some(fuser::FileType::Symlink),
            Type::Unknown | Type::Nonexistent => None,
        }
    }
}

/// Projection of an object record containing just the fields the inode layer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinObject {
    pub name: Name,
    pub generation: Generation,
    pub size: u64,
    pub content_encoding: Option<String>,
    pub metadata: HashMap<String, String>,
    #[allow(dead_code)] // carried for completeness; not read by any current operation
    pub updated: UpdatedTime,
}

/// Wall-clock timestamp of the last update reported by the bucket, kept separate from
/// [time::OffsetDateTime] arithmetic so a missing value can be represented without sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatedTime(pub OffsetDateTime);

impl MinObject {
    pub fn metadata_mtime_key(&self) -> Option<&str> {
        self.metadata.get(METADATA_MTIME_KEY).map(String::as_str)
    }

    pub fn is_symlink(&self) -> bool {
        self.metadata.contains_key(METADATA_SYMLINK_IS_SYMLINK_KEY)
            || self
                .metadata
                .get(METADATA_SYMLINK_TARGET_KEY)
                .is_some_and(|v| !v.is_empty())
    }
}

/// Canonical mtime metadata key: RFC3339Nano string.
pub const METADATA_MTIME_KEY: &str = "gcsfuse_mtime";
/// Fallback mtime metadata key: decimal unix seconds, trumped by [METADATA_MTIME_KEY].
pub const METADATA_MTIME_FALLBACK_KEY: &str = "goog-reserved-file-mtime";
/// Deprecated storage form for a symlink's target.
pub const METADATA_SYMLINK_TARGET_KEY: &str = "gcsfuse_symlink_target";
/// Reserved marker: presence indicates the object body is a symlink target.
pub const METADATA_SYMLINK_IS_SYMLINK_KEY: &str = "goog-reserved-file-is-symlink";

/// The bundle passed to construct a child inode after a successful lookup.
#[derive(Debug, Clone)]
pub struct Core {
    pub full_name: Name,
    pub min_object: Option<MinObject>,
    /// True for a file that exists only in memory and has not yet been persisted.
    pub local: bool,
}

impl Core {
    pub fn kind(&self) -> Type {
        if self.full_name.is_dir() {
            if self.min_object.is_some() {
                Type::ExplicitDir
            } else {
                Type::ImplicitDir
            }
        } else if self.min_object.as_ref().is_some_and(MinObject::is_symlink) {
            Type::Symlink
        } else {
            Type::RegularFile
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_object(name: Name, metadata: HashMap<String, String>) -> MinObject {
        MinObject {
            name,
            generation: Generation::new(1, 1, 0),
            size: 0,
            content_encoding: None,
            metadata,
            updated: UpdatedTime(OffsetDateTime::UNIX_EPOCH),
        }
    }

    #[test]
    fn core_kind_file_vs_symlink() {
        let root = Name::new_root("b");
        let file_name = Name::new_file(&root, "f").unwrap();

        let plain = Core {
            full_name: file_name.clone(),
            min_object: Some(min_object(file_name.clone(), HashMap::new())),
            local: false,
        };
        assert_eq!(plain.kind(), Type::RegularFile);

        let mut symlink_meta = HashMap::new();
        symlink_meta.insert(METADATA_SYMLINK_IS_SYMLINK_KEY.to_owned(), "".to_owned());
        let symlink = Core {
            full_name: file_name.clone(),
            min_object: Some(min_object(file_name, symlink_meta)),
            local: false,
        };
        assert_eq!(symlink.kind(), Type::Symlink);
    }

    #[test]
    fn core_kind_explicit_vs_implicit_dir() {
        let root = Name::new_root("b");
        let dir_name = Name::new_dir(&root, "d").unwrap();

        let explicit = Core {
            full_name: dir_name.clone(),
            min_object: Some(min_object(dir_name.clone(), HashMap::new())),
            local: false,
        };
        assert_eq!(explicit.kind(), Type::ExplicitDir);

        let implicit = Core {
            full_name: dir_name,
            min_object: None,
            local: false,
        };
        assert_eq!(implicit.kind(), Type::ImplicitDir);
    }
}
