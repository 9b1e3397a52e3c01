//! Configuration types for archive-engine

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration for [`crate::engine::ArchiveEngine`]
///
/// All fields have sensible defaults; a default-constructed config works out
/// of the box. Validation happens once at engine construction so that faulty
/// values never reach a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of operations executing concurrently (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_operations: usize,

    /// Buffer size of the event broadcast channel (default: 1000)
    ///
    /// Subscribers that fall behind by more than this many events receive a
    /// lagged error and skip ahead.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Copy buffer size in bytes used by codecs (default: 8192)
    ///
    /// This is also the cancellation granularity: codecs poll the interrupt
    /// flag between buffer-sized chunks.
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,

    /// Compression level applied when a request does not specify one (default: 6)
    #[serde(default = "default_compression_level")]
    pub default_compression_level: i64,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_event_buffer() -> usize {
    1000
}

fn default_copy_buffer_size() -> usize {
    8192
}

fn default_compression_level() -> i64 {
    6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_operations: default_max_concurrent(),
            event_buffer: default_event_buffer(),
            copy_buffer_size: default_copy_buffer_size(),
            default_compression_level: default_compression_level(),
        }
    }
}

impl Config {
    /// Validate the configuration, failing fast on unusable values.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_operations == 0 {
            return Err(Error::config(
                "max_concurrent_operations must be at least 1",
                "max_concurrent_operations",
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::config(
                "event_buffer must be at least 1",
                "event_buffer",
            ));
        }
        if self.copy_buffer_size < 512 {
            return Err(Error::config(
                "copy_buffer_size must be at least 512 bytes",
                "copy_buffer_size",
            ));
        }
        Ok(())
    }
}
