//! Core types for archive-engine

use serde::{Deserialize, Serialize};

/// Unique identifier for an archive operation
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OperationId(pub u64);

impl OperationId {
    /// Create a new OperationId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OperationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<OperationId> for u64 {
    fn from(id: OperationId) -> Self {
        id.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported archive kinds
///
/// The engine delegates the actual byte-level work to a codec registered for
/// the kind; this enum only identifies the container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveKind {
    /// Recognized filename extensions for this kind, default first.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ArchiveKind::Zip => &[".zip"],
        }
    }

    /// The default extension appended to archive names that lack one.
    pub fn default_extension(&self) -> &'static str {
        self.extensions()[0]
    }

    /// Detect the archive kind from a filename, if recognized.
    pub fn detect(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        [ArchiveKind::Zip]
            .into_iter()
            .find(|kind| kind.extensions().iter().any(|ext| lower.ends_with(ext)))
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveKind::Zip => write!(f, "zip"),
        }
    }
}

/// Direction of an archive operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Create an archive from the input paths
    Compress,
    /// Extract an archive into the output directory
    Extract,
}

/// Event emitted during the operation lifecycle
///
/// Consumers subscribe via [`crate::engine::ArchiveEngine::subscribe`]; every
/// subscriber receives all events independently.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Operation accepted and registered with the engine
    Submitted {
        /// Operation ID
        id: OperationId,
        /// Resolved archive name
        name: String,
    },

    /// Operation obtained a worker slot and started executing
    Started {
        /// Operation ID
        id: OperationId,
    },

    /// Coalesced overall progress across all known operations, in `[0, 1]`
    ///
    /// Emitted at most once per consumer refresh; intermediate values are
    /// coalesced, and the reported value never regresses.
    OverallProgress {
        /// Overall progress fraction in `[0, 1]`
        fraction: f64,
    },

    /// Operation finished (successfully, with a recovered failure, or cancelled)
    Completed {
        /// Operation ID
        id: OperationId,
        /// `true` only if the codec ran to completion without error
        success: bool,
        /// Wall-clock duration of the operation in seconds
        elapsed_seconds: f64,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_id_round_trips() {
        let id = OperationId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(u64::from(id), 42);
        assert_eq!(OperationId::from(42u64), id);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn operation_id_serializes_transparently() {
        let id = OperationId(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let back: OperationId = serde_json::from_str("7").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn archive_kind_detection() {
        assert_eq!(ArchiveKind::detect("backup.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect("BACKUP.ZIP"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect("notes.txt"), None);
        assert_eq!(ArchiveKind::Zip.default_extension(), ".zip");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::Completed {
            id: OperationId(3),
            success: true,
            elapsed_seconds: 1.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["id"], 3);
        assert_eq!(json["success"], true);
    }

    #[test]
    fn overall_progress_carries_a_fraction() {
        let event = Event::OverallProgress { fraction: 0.25 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "overall_progress");
        assert_eq!(json["fraction"], 0.25);
    }
}
