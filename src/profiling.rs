//! # Profiling Guide
//!
//! The asset manager always emits `tracing` events (`debug` for dispatch,
//! completion and disposal, `warn` for failed assets). With the `profiling`
//! feature it also opens an `info_span` around every fetch and finalize job.
//!
//! ## Basic Usage
//!
//! ```toml
//! [dependencies]
//! archetype_assets = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! let _guard = archetype_assets::profiling::init_file_subscriber("trace.json")?;
//! // run the manager; spans land in trace.json
//! ```
//!
//! Keep the returned guard alive until shutdown, the writer flushes on drop.
//!
//! ## Performance Tips
//!
//! 1. Profile in release mode for accurate metrics
//! 2. Use `RUST_LOG=debug` to see all asset events

#[cfg(feature = "profiling")]
pub use file::{init_file_subscriber, init_json_subscriber};

#[cfg(feature = "profiling")]
mod file {
    use std::fs::File;
    use std::path::Path;

    use tracing_appender::non_blocking::WorkerGuard;

    use crate::error::{AssetError, Result};

    /// Install a global subscriber writing human-readable events to `path`
    pub fn init_file_subscriber<P: AsRef<Path>>(path: P) -> Result<WorkerGuard> {
        let file = File::create(path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .try_init()
            .map_err(|e| AssetError::Config(format!("tracing subscriber: {e}")))?;
        Ok(guard)
    }

    /// Like [`init_file_subscriber`] but one JSON object per line
    pub fn init_json_subscriber<P: AsRef<Path>>(path: P) -> Result<WorkerGuard> {
        let file = File::create(path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        tracing_subscriber::fmt()
            .json()
            .with_writer(non_blocking)
            .with_max_level(tracing::Level::TRACE)
            .try_init()
            .map_err(|e| AssetError::Config(format!("tracing subscriber: {e}")))?;
        Ok(guard)
    }
}
