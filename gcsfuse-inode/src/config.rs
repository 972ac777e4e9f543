//! The slice of filesystem configuration the inode layer consumes. Parsing this out of CLI flags or
//! a config file is a host concern; this crate only defines the surface and sane defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_ttl_secs() -> u64 {
    60
}

fn default_type_cache_max_size_mb() -> i64 {
    4
}

fn default_stat_cache_max_size_mb() -> i64 {
    32
}

fn default_metadata_prefetch_entries_limit() -> u64 {
    5000
}

fn default_max_blocks_per_file() -> u64 {
    4
}

fn default_block_size_mb() -> u64 {
    8
}

fn default_global_max_blocks() -> u64 {
    1600
}

fn default_list_page_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Configuration consumed by the inode layer. A host binary is expected to deserialize this (or
/// populate it directly) from its own flag/TOML parsing and hand it to `DirInode`/`FileInode`
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InodeConfig {
    /// Gates the metadata prefetcher on directory listings still under experimental rollout.
    pub experimental_dir_metadata_prefetch: bool,
    /// Gates the metadata prefetcher generally.
    pub enable_metadata_prefetch: bool,
    /// Enables the in-memory buffered streaming writer; without it every write goes straight to a
    /// temp-file content cache.
    pub enable_streaming_writes: bool,
    /// Enables hierarchical-namespace (managed folder) support for directory inodes.
    pub enable_hns: bool,
    /// Enables materialising implicit directories from a prefix probe when no placeholder object
    /// exists. Disabling this means a name with no explicit placeholder never resolves to a
    /// directory.
    #[serde(default = "default_true")]
    pub enable_implicit_dirs: bool,
    /// Marks the bucket as "zonal" (supports in-place server-side append without advancing
    /// generation/metageneration), changing `Sync`'s behavior for a buffered-write inode.
    #[serde(default)]
    pub enable_zonal_bucket: bool,

    /// TTL applied to stat results cached on `Core`/`MinObject`, in seconds.
    #[serde(
        rename = "ttl_secs",
        default = "default_ttl_secs",
        with = "duration_secs"
    )]
    pub ttl: Duration,
    /// TTL applied to `TypeCache` entries, in seconds.
    #[serde(default = "default_ttl_secs", with = "duration_secs")]
    pub type_cache_ttl: Duration,

    /// `TypeCache` size budget in MiB. `-1` is unbounded, `0` disables the cache.
    #[serde(default = "default_type_cache_max_size_mb")]
    pub type_cache_max_size_mb: i64,
    /// Budget (MiB) gating whether the metadata prefetcher is allowed to run at all.
    #[serde(default = "default_stat_cache_max_size_mb")]
    pub stat_cache_max_size_mb: i64,
    /// Maximum number of entries a single prefetch run will request before marking the directory
    /// large and remembering a resume offset.
    #[serde(default = "default_metadata_prefetch_entries_limit")]
    pub metadata_prefetch_entries_limit: u64,

    /// Maximum in-memory blocks a single buffered writer may hold before demoting to temp-file.
    #[serde(default = "default_max_blocks_per_file")]
    pub max_blocks_per_file: u64,
    /// Size in MiB of a single buffered-write block.
    #[serde(default = "default_block_size_mb")]
    pub block_size_mb: u64,
    /// Process-wide cap on buffered-write blocks across all open files.
    #[serde(default = "default_global_max_blocks")]
    pub global_max_blocks: u64,

    /// Page size used for `ReadEntries`/`ReadEntryCores` directory listings.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

impl Default for InodeConfig {
    fn default() -> Self {
        Self {
            experimental_dir_metadata_prefetch: false,
            enable_metadata_prefetch: true,
            enable_streaming_writes: true,
            enable_hns: false,
            enable_implicit_dirs: true,
            enable_zonal_bucket: false,
            ttl: Duration::from_secs(default_ttl_secs()),
            type_cache_ttl: Duration::from_secs(default_ttl_secs()),
            type_cache_max_size_mb: default_type_cache_max_size_mb(),
            stat_cache_max_size_mb: default_stat_cache_max_size_mb(),
            metadata_prefetch_entries_limit: default_metadata_prefetch_entries_limit(),
            max_blocks_per_file: default_max_blocks_per_file(),
            block_size_mb: default_block_size_mb(),
            global_max_blocks: default_global_max_blocks(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl InodeConfig {
    /// Whether the metadata prefetcher is armable at all: both flags set, a nonzero TTL, and a
    /// nonzero stat-cache budget.
    pub fn metadata_prefetch_enabled(&self) -> bool {
        self.enable_metadata_prefetch
            && self.experimental_dir_metadata_prefetch
            && !self.type_cache_ttl.is_zero()
            && self.stat_cache_max_size_mb != 0
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_prefetch_when_experimental_flag_is_set() {
        let mut config = InodeConfig::default();
        assert!(!config.metadata_prefetch_enabled(), "experimental flag defaults off");
        config.experimental_dir_metadata_prefetch = true;
        assert!(config.metadata_prefetch_enabled());
    }

    #[test]
    fn zero_ttl_disables_prefetch() {
        let mut config = InodeConfig {
            experimental_dir_metadata_prefetch: true,
            ..Default::default()
        };
        config.type_cache_ttl = Duration::ZERO;
        assert!(!config.metadata_prefetch_enabled());
    }

    #[test]
    fn roundtrips_through_json() {
        let config = InodeConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: InodeConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, back);
    }
}
