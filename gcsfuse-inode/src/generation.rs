//! Generation triples used to detect out-of-band modification ("clobbering") of backing objects.

use std::cmp::Ordering;

/// `(object generation, metadata generation, size)`, compared lexicographically.
///
/// A strictly greater generation on the server than the one an inode was built from means the
/// inode's content has been overwritten out-of-band: it is *clobbered*. Size participates only to
/// accommodate append-only ("zonal") buckets where a server-side append bumps neither the object
/// generation nor the metageneration; a *smaller* server size is deliberately not treated as a
/// regression (see [Generation::compare]'s doc and spec §9's open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Generation {
    pub object: u64,
    pub metadata: u64,
    pub size: u64,
}

impl Generation {
    /// The generation of a name that has never been persisted.
    pub const NONE: Generation = Generation {
        object: 0,
        metadata: 0,
        size: 0,
    };

    pub fn new(object: u64, metadata: u64, size: u64) -> Self {
        Self { object, metadata, size }
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Lexicographic comparison: object first, then metadata, then size.
    ///
    /// A strictly smaller size at equal object/metadata generation is treated as *equal* (i.e. not
    /// clobbered): this is the deliberate exception described in spec §9, for append-only "zonal"
    /// buckets whose server-side appends never change generation or metageneration. Callers that
    /// need strict equality should compare the fields directly.
    pub fn compare(&self, other: &Generation) -> Ordering {
        match self.object.cmp(&other.object) {
            Ordering::Equal => (),
            ord => return ord,
        }
        match self.metadata.cmp(&other.metadata) {
            Ordering::Equal => (),
            ord => return ord,
        }
        if self.size < other.size {
            Ordering::Equal
        } else {
            self.size.cmp(&other.size)
        }
    }

    /// True if `self` (the server's current generation) has advanced past `known`, meaning the
    /// object has been clobbered relative to what the inode last observed.
    pub fn is_clobbered_relative_to(&self, known: &Generation) -> bool {
        self.compare(known) != Ordering::Equal
    }
}
