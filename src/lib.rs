//! # archive-engine
//!
//! Concurrent archiving operation engine for desktop compression
//! applications.
//!
//! ## Design Philosophy
//!
//! archive-engine is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Cancellable** - Every operation stops cooperatively, mid-archive
//! - **UI-friendly** - Overall progress is coalesced so a single-threaded
//!   consumer is never flooded, however many workers report at once
//!
//! ## Quick Start
//!
//! ```no_run
//! use archive_engine::{ArchiveEngine, ArchiveKind, Config};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ArchiveEngine::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let descriptor = engine.describe_compression(
//!         ArchiveKind::Zip,
//!         "backup",
//!         None,
//!         vec![PathBuf::from("documents")],
//!         PathBuf::from("/tmp"),
//!     )?;
//!     engine.submit(descriptor)?;
//!
//!     engine.wait_idle().await;
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Codec port and built-in codecs
pub mod codec;
/// Configuration types
pub mod config;
/// Archive descriptors and their factories
pub mod descriptor;
/// Engine facade, worker pool, and operation registry
pub mod engine;
/// Error types
pub mod error;
/// Collision-free output naming
pub mod naming;
/// Cancellable archive operations
pub mod operation;
/// Progress aggregation and observation
pub mod progress;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use codec::{Codec, CodecContext, EntryFilter, ZipCodec};
pub use config::Config;
pub use descriptor::ArchiveDescriptor;
pub use engine::{ArchiveEngine, OperationHandle, SubmitOptions};
pub use error::{Error, Result};
pub use operation::{ArchiveOperation, OperationBuilder};
pub use progress::{ProgressAggregator, ProgressNotifier, ProgressObserver, Subscription};
pub use types::{ArchiveKind, CompressionMode, Event, OperationId};
