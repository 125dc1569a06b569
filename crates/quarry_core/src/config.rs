//! Database configuration.
//!
//! [`Config`] is fixed at open time. [`ConfigRequest`] carries the settings
//! that may change on an open handle through [`crate::Database::configure`].

use crate::error::{CoreError, CoreResult};

/// Smallest supported page size.
pub const MIN_PAGE_SIZE: usize = 512;
/// Largest supported page size.
pub const MAX_PAGE_SIZE: usize = 65536;
/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
/// Name of the only key/value engine.
pub const DEFAULT_ENGINE: &str = "btree";

/// What a thread does when another thread owns the active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadingMode {
    /// Wait until the owning thread commits or rolls back.
    #[default]
    Blocking,
    /// Fail immediately with `AlreadyActive`.
    FailFast,
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Page size for newly created files. Existing files keep their own.
    pub page_size: usize,

    /// Maximum number of pages held in the page cache.
    pub cache_pages: usize,

    /// Whether single operations outside a transaction commit immediately.
    pub auto_commit: bool,

    /// Whether commit syncs the database file before discarding the journal.
    pub sync_on_commit: bool,

    /// Contention policy for the single write transaction.
    pub threading: ThreadingMode,

    /// Key/value engine name.
    pub engine: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_pages: 256,
            auto_commit: true,
            sync_on_commit: true,
            threading: ThreadingMode::Blocking,
            engine: DEFAULT_ENGINE.to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size for new files.
    #[must_use]
    pub const fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the page cache capacity.
    #[must_use]
    pub const fn cache_pages(mut self, pages: usize) -> Self {
        self.cache_pages = pages;
        self
    }

    /// Sets auto-commit.
    #[must_use]
    pub const fn auto_commit(mut self, value: bool) -> Self {
        self.auto_commit = value;
        self
    }

    /// Sets whether commit syncs the database file.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the threading mode.
    #[must_use]
    pub const fn threading(mut self, mode: ThreadingMode) -> Self {
        self.threading = mode;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad page size or an empty cache and
    /// `UnknownConfig` for an unknown engine.
    pub fn validate(&self) -> CoreResult<()> {
        if !is_valid_page_size(self.page_size) {
            return Err(CoreError::invalid_argument(format!(
                "page size {} must be a power of two between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}",
                self.page_size
            )));
        }
        if self.cache_pages == 0 {
            return Err(CoreError::invalid_argument("cache must hold at least one page"));
        }
        if self.engine != DEFAULT_ENGINE {
            return Err(CoreError::unknown_config(format!("engine {}", self.engine)));
        }
        Ok(())
    }
}

/// Returns `true` if `size` is a supported page size.
#[must_use]
pub fn is_valid_page_size(size: usize) -> bool {
    size.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size)
}

/// Payload of a configuration verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPayload {
    /// No payload.
    None,
    /// Integer payload.
    Int(i64),
    /// String payload.
    Str(String),
    /// Raw buffer payload.
    Buffer(Vec<u8>),
}

/// A change applied to an open database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigRequest {
    /// Resize the page cache.
    MaxPageCache(usize),
    /// Make writes outside a transaction open one that stays open.
    DisableAutoCommit,
    /// Commit single writes immediately.
    EnableAutoCommit,
    /// Select the key/value engine.
    KvEngine(String),
    /// Toggle the database file sync at commit.
    SyncOnCommit(bool),
}

impl ConfigRequest {
    /// Builds a request from a verb name and a tagged payload.
    ///
    /// Recognized verbs: `max_page_cache` (int), `disable_auto_commit`,
    /// `enable_auto_commit`, `kv_engine` (string or buffer) and
    /// `sync_on_commit` (int, zero is false).
    ///
    /// # Errors
    ///
    /// Returns `UnknownConfig` for an unknown verb and `InvalidArgument` if the
    /// payload does not fit the verb.
    pub fn parse(verb: &str, payload: ConfigPayload) -> CoreResult<Self> {
        let mismatch = || CoreError::invalid_argument(format!("bad payload for {verb}"));
        match verb {
            "max_page_cache" => match payload {
                ConfigPayload::Int(n) if n > 0 => usize::try_from(n)
                    .map(Self::MaxPageCache)
                    .map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            "disable_auto_commit" => match payload {
                ConfigPayload::None => Ok(Self::DisableAutoCommit),
                _ => Err(mismatch()),
            },
            "enable_auto_commit" => match payload {
                ConfigPayload::None => Ok(Self::EnableAutoCommit),
                _ => Err(mismatch()),
            },
            "kv_engine" => match payload {
                ConfigPayload::Str(name) => Ok(Self::KvEngine(name)),
                ConfigPayload::Buffer(bytes) => String::from_utf8(bytes)
                    .map(Self::KvEngine)
                    .map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            "sync_on_commit" => match payload {
                ConfigPayload::Int(n) => Ok(Self::SyncOnCommit(n != 0)),
                _ => Err(mismatch()),
            },
            other => Err(CoreError::unknown_config(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.page_size, 4096);
        assert!(config.auto_commit);
        assert!(config.sync_on_commit);
        assert_eq!(config.threading, ThreadingMode::Blocking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .page_size(1024)
            .cache_pages(8)
            .auto_commit(false)
            .threading(ThreadingMode::FailFast);

        assert_eq!(config.page_size, 1024);
        assert_eq!(config.cache_pages, 8);
        assert!(!config.auto_commit);
        assert_eq!(config.threading, ThreadingMode::FailFast);
    }

    #[test]
    fn validate_rejects_bad_page_sizes() {
        for size in [0, 100, 256, 3000, 131_072] {
            let err = Config::new().page_size(size).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "size {size}");
        }
        assert!(Config::new().page_size(512).validate().is_ok());
        assert!(Config::new().page_size(65536).validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_engine() {
        let mut config = Config::new();
        config.engine = "hash".into();
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::UnknownConfig);
    }

    #[test]
    fn parse_known_verbs() {
        assert_eq!(
            ConfigRequest::parse("max_page_cache", ConfigPayload::Int(64)).unwrap(),
            ConfigRequest::MaxPageCache(64)
        );
        assert_eq!(
            ConfigRequest::parse("disable_auto_commit", ConfigPayload::None).unwrap(),
            ConfigRequest::DisableAutoCommit
        );
        assert_eq!(
            ConfigRequest::parse("kv_engine", ConfigPayload::Buffer(b"btree".to_vec())).unwrap(),
            ConfigRequest::KvEngine("btree".into())
        );
        assert_eq!(
            ConfigRequest::parse("sync_on_commit", ConfigPayload::Int(0)).unwrap(),
            ConfigRequest::SyncOnCommit(false)
        );
    }

    #[test]
    fn parse_unknown_verb_and_bad_payload() {
        let err = ConfigRequest::parse("frobnicate", ConfigPayload::None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownConfig);

        let err = ConfigRequest::parse("max_page_cache", ConfigPayload::Str("x".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = ConfigRequest::parse("max_page_cache", ConfigPayload::Int(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
