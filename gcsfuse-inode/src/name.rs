//! Canonical representation of a path as a (bucket, object-name) pair.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// A fully qualified name: a bucket plus the object name within it.
///
/// Invariant: if `object_name` ends with `/` the name denotes a directory, otherwise a file or
/// symlink. The root directory of a bucket has `object_name == ""`. Names are immutable after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    bucket: String,
    object_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("parent name {0:?} is not a directory")]
    ParentNotADirectory(String),
    #[error("leaf name {0:?} is invalid")]
    InvalidLeaf(String),
}

fn validate_leaf(leaf: &str) -> Result<(), NameError> {
    if leaf.is_empty() || leaf == "." || leaf == ".." || leaf.contains('/') || leaf.contains('\0') {
        return Err(NameError::InvalidLeaf(leaf.to_owned()));
    }
    Ok(())
}

impl Name {
    /// The root directory of `bucket`.
    pub fn new_root(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_name: String::new(),
        }
    }

    /// A child directory `leaf` of `parent`. `parent` must be a directory.
    pub fn new_dir(parent: &Name, leaf: &str) -> Result<Self, NameError> {
        if !parent.is_dir() {
            return Err(NameError::ParentNotADirectory(parent.object_name.clone()));
        }
        validate_leaf(leaf)?;
        Ok(Self {
            bucket: parent.bucket.clone(),
            object_name: format!("{}{}/", parent.object_name, leaf),
        })
    }

    /// A child file (or symlink) `leaf` of `parent`. `parent` must be a directory.
    pub fn new_file(parent: &Name, leaf: &str) -> Result<Self, NameError> {
        if !parent.is_dir() {
            return Err(NameError::ParentNotADirectory(parent.object_name.clone()));
        }
        validate_leaf(leaf)?;
        Ok(Self {
            bucket: parent.bucket.clone(),
            object_name: format!("{}{}", parent.object_name, leaf),
        })
    }

    /// Build a name directly from a raw wire object name, bypassing leaf validation. Used by
    /// bucket implementations translating a listing/stat response back into a [Name]; regular
    /// inode-layer code should build names incrementally via [Name::new_dir]/[Name::new_file].
    pub(crate) fn from_object_name(bucket: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_name: object_name.into(),
        }
    }

    /// The bucket this name lives in.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object name as it appears at the wire (the "key" in object-store parlance).
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Alias for [Name::object_name], matching the vocabulary object-store clients use.
    pub fn gcs_object_name(&self) -> &str {
        self.object_name()
    }

    pub fn is_dir(&self) -> bool {
        self.object_name.is_empty() || self.object_name.ends_with('/')
    }

    pub fn is_root(&self) -> bool {
        self.object_name.is_empty()
    }

    /// The last path component: `"a/b/c/"` -> `"c"`, `"a/b/c"` -> `"c"`.
    pub fn local_name(&self) -> &str {
        let trimmed = self.object_name.strip_suffix('/').unwrap_or(&self.object_name);
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object_name)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.bucket, &self.object_name).cmp(&(&other.bucket, &other.object_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_name_is_dir() {
        let root = Name::new_root("my-bucket");
        assert!(root.is_dir());
        assert!(root.is_root());
        assert_eq!(root.object_name(), "");
    }

    #[test]
    fn child_dir_and_file_names() {
        let root = Name::new_root("my-bucket");
        let dir = Name::new_dir(&root, "a").unwrap();
        assert_eq!(dir.object_name(), "a/");
        assert!(dir.is_dir());

        let file = Name::new_file(&dir, "b").unwrap();
        assert_eq!(file.object_name(), "a/b");
        assert!(!file.is_dir());
        assert_eq!(file.local_name(), "b");

        let subdir = Name::new_dir(&dir, "c").unwrap();
        assert_eq!(subdir.object_name(), "a/c/");
        assert_eq!(subdir.local_name(), "c");
    }

    #[test]
    fn cannot_create_child_of_file() {
        let root = Name::new_root("my-bucket");
        let file = Name::new_file(&root, "f").unwrap();
        assert_eq!(
            Name::new_file(&file, "g").unwrap_err(),
            NameError::ParentNotADirectory("f".to_owned())
        );
        assert!(Name::new_dir(&file, "g").is_err());
    }

    #[test]
    fn rejects_invalid_leaf_names() {
        let root = Name::new_root("my-bucket");
        for bad in ["", ".", "..", "a/b", "a\0b"] {
            assert!(Name::new_file(&root, bad).is_err(), "expected {bad:?} to be rejected");
        }
    }
}
