//! The inode layer's error taxonomy (spec §7), and the two small traits ([ToErrno],
//! [ExpectedError]) that let a FUSE dispatch layer and the `#[log_failures]` macro consume it
//! without this crate depending on `fuser`'s reply types.

use std::ffi::OsString;

use thiserror::Error;

use crate::bucket::BucketError;
use crate::name::Name;

/// Human-readable identity of an inode, used inside error messages.
pub type InodeErrorInfo = String;

#[derive(Debug, Error)]
pub enum InodeError {
    #[error("error from bucket")]
    ClientError(#[source] anyhow::Error),

    #[error("name {0:?} does not exist in parent {1}")]
    DoesNotExist(String, InodeErrorInfo),

    #[error("invalid name {0:?}")]
    InvalidName(OsString),

    #[error("{0} is not a directory")]
    NotADirectory(InodeErrorInfo),

    #[error("{0} is a directory")]
    IsDirectory(InodeErrorInfo),

    #[error("{0} already exists")]
    AlreadyExists(InodeErrorInfo),

    #[error("{0} is not writable")]
    NotWritable(InodeErrorInfo),

    #[error("{0} is already being written")]
    AlreadyWriting(InodeErrorInfo),

    #[error("{0} is not readable while being written; flush first")]
    NotReadableWhileWriting(InodeErrorInfo),

    #[error("remote directory {0} cannot be removed")]
    CannotRemoveRemoteDirectory(InodeErrorInfo),

    #[error("directory {0} is not empty")]
    DirectoryNotEmpty(InodeErrorInfo),

    #[error("{0} cannot be unlinked while being written")]
    UnlinkNotPermittedWhileWriting(InodeErrorInfo),

    #[error("{0} cannot be truncated downward while buffered")]
    UnsupportedTruncate(InodeErrorInfo),

    #[error("symlink target for {0} exceeds the maximum length")]
    SymlinkTargetTooLong(InodeErrorInfo),

    #[error("{0} content has been modified out of band")]
    FileClobbered(InodeErrorInfo),

    #[error("corrupted metadata for {0}")]
    CorruptedMetadata(InodeErrorInfo),
}

impl InodeError {
    /// Wrap a bucket-layer error, translating `NotFound`/`PreconditionFailed` into the more
    /// specific inode-layer kinds where the caller has the context to do so (e.g. `FileClobbered`
    /// on a sync, plain success on an idempotent delete). Generic call sites that haven't already
    /// special-cased the bucket error fall back to this.
    pub fn from_bucket_error(err: BucketError, info: InodeErrorInfo) -> Self {
        match err {
            BucketError::NotFound => InodeError::DoesNotExist(String::new(), info),
            BucketError::PreconditionFailed => InodeError::FileClobbered(info),
            BucketError::Transient(e) => InodeError::ClientError(e),
        }
    }
}

/// Maps an [InodeError] onto a POSIX errno, for a FUSE dispatch layer to reply with.
pub trait ToErrno {
    fn to_errno(&self) -> libc::c_int;
}

impl ToErrno for InodeError {
    fn to_errno(&self) -> libc::c_int {
        match self {
            InodeError::ClientError(_) => libc::EIO,
            InodeError::DoesNotExist(_, _) => libc::ENOENT,
            InodeError::InvalidName(_) => libc::EINVAL,
            InodeError::NotADirectory(_) => libc::ENOTDIR,
            InodeError::IsDirectory(_) => libc::EISDIR,
            InodeError::AlreadyExists(_) => libc::EEXIST,
            InodeError::NotWritable(_) => libc::EPERM,
            InodeError::AlreadyWriting(_) => libc::EPERM,
            InodeError::NotReadableWhileWriting(_) => libc::EPERM,
            InodeError::CannotRemoveRemoteDirectory(_) => libc::EPERM,
            InodeError::DirectoryNotEmpty(_) => libc::ENOTEMPTY,
            InodeError::UnlinkNotPermittedWhileWriting(_) => libc::EPERM,
            InodeError::UnsupportedTruncate(_) => libc::EINVAL,
            InodeError::SymlinkTargetTooLong(_) => libc::ENAMETOOLONG,
            InodeError::FileClobbered(_) => libc::ESTALE,
            InodeError::CorruptedMetadata(_) => libc::EIO,
        }
    }
}

/// Distinguishes "expected" failures (the correct response to an invalid request, e.g. looking up
/// a name that doesn't exist) from surprising ones, for `#[log_failures]` to log at different
/// verbosities (spec §7's propagation policy).
pub trait ExpectedError {
    fn expected_error(&self) -> bool;
}

impl ExpectedError for InodeError {
    fn expected_error(&self) -> bool {
        matches!(
            self,
            InodeError::DoesNotExist(_, _)
                | InodeError::AlreadyExists(_)
                | InodeError::NotADirectory(_)
                | InodeError::IsDirectory(_)
                | InodeError::DirectoryNotEmpty(_)
                | InodeError::InvalidName(_)
        )
    }
}

pub(crate) fn describe(name: &Name) -> InodeErrorInfo {
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_enoent() {
        let err = InodeError::DoesNotExist("leaf".into(), "bucket/dir".into());
        assert_eq!(err.to_errno(), libc::ENOENT);
        assert!(err.expected_error());
    }

    #[test]
    fn client_error_is_unexpected() {
        let err = InodeError::ClientError(anyhow::anyhow!("boom"));
        assert_eq!(err.to_errno(), libc::EIO);
        assert!(!err.expected_error());
    }

    #[test]
    fn bucket_precondition_failure_becomes_clobbered() {
        let err = InodeError::from_bucket_error(BucketError::PreconditionFailed, "bucket/f".into());
        assert!(matches!(err, InodeError::FileClobbered(_)));
        assert_eq!(err.to_errno(), libc::ESTALE);
    }
}
