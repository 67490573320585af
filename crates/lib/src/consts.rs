//! Crate-wide names and defaults.

pub const APP_NAME: &str = "stepcache";

/// Environment variable naming the shared artifacts cache root.
pub const ENV_CACHE_ROOT: &str = "STEPCACHE_ARTIFACTS_CACHE";
pub const ENV_CACHE_RESTORE: &str = "STEPCACHE_ARTIFACTS_CACHE_RESTORE";
pub const ENV_CACHE_UPLOAD: &str = "STEPCACHE_ARTIFACTS_CACHE_UPLOAD";
pub const ENV_CACHE_DAYS_TO_KEEP: &str = "STEPCACHE_ARTIFACTS_CACHE_DAYS_TO_KEEP";

pub const DEFAULT_DAYS_TO_KEEP: u32 = 3;

/// Suffix of the sibling directory an entry is assembled in before rename.
pub const CACHE_TMP_SUFFIX: &str = ".tmp";

/// Environment variables that hold search-path lists. Dependency edges cover
/// these, so they never contribute to a step's `sig`.
pub const SEARCH_PATH_VARS: &[&str] = &[
  "INCLUDES",
  "SYSTEM_INCLUDES",
  "INCPATHS",
  "LIBPATH",
  "STLIBPATH",
  "FRAMEWORKPATH",
];

/// Current on-disk snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Log target used for compiler output forwarded to the build log.
pub const COMPILER_LOG_TARGET: &str = "stepcache::compiler";
