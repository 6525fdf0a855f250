//! Session bookkeeping types: metadata and the operation log.

use std::time::SystemTime;

use centering_core::FrameSpec;
use serde::{Deserialize, Serialize};

/// Metadata about a measurement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Capture device the calibration belongs to.
    pub device_id: String,

    /// Frame the subject is being measured for.
    pub frame: FrameSpec,

    /// Unix timestamp when session was created (seconds since epoch).
    pub created_at: u64,

    /// Unix timestamp when session was last modified (seconds since epoch).
    pub last_modified: u64,

    /// Optional operator note (order number, customer reference).
    pub description: Option<String>,
}

impl SessionMetadata {
    pub fn new(device_id: impl Into<String>, frame: FrameSpec) -> Self {
        let now = current_timestamp();
        Self {
            device_id: device_id.into(),
            frame,
            created_at: now,
            last_modified: now,
            description: None,
        }
    }

    pub fn with_description(
        device_id: impl Into<String>,
        frame: FrameSpec,
        description: impl Into<String>,
    ) -> Self {
        let mut meta = Self::new(device_id, frame);
        meta.description = Some(description.into());
        meta
    }

    /// Update the last_modified timestamp to now.
    pub fn touch(&mut self) {
        self.last_modified = current_timestamp();
    }
}

/// Lightweight operation log entry.
///
/// Records operator actions on a session for the audit trail. Per-frame
/// updates are not logged here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp of the operation (seconds since epoch).
    pub timestamp: u64,

    /// Operation name (e.g., "capture", "validate").
    pub operation: String,

    /// Whether the operation succeeded.
    pub success: bool,

    /// Optional notes or error message.
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: true,
            notes: None,
        }
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::success(operation)
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// Get the current Unix timestamp in seconds.
///
/// A clock set before the epoch reads as 0.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
