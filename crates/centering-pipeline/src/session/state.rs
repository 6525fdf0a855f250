//! Session lifecycle states and the frozen-frame snapshot.

use centering_core::{CalibrationData, CapturedImage, LandmarkSet, Pupils, TemplePair};
use serde::{Deserialize, Serialize};

/// Where a [`MeasurementSession`](crate::MeasurementSession) is in its
/// lifecycle.
///
/// ```text
/// LiveTracking --capture--> FrozenEditing --validate--> Validated
///      ^                         |
///      +---------retake----------+
/// (any non-terminal) --cancel--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    LiveTracking,
    FrozenEditing,
    Validated,
    Cancelled,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::LiveTracking => "live_tracking",
            SessionState::FrozenEditing => "frozen_editing",
            SessionState::Validated => "validated",
            SessionState::Cancelled => "cancelled",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Validated | SessionState::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything captured at freeze time.
///
/// Pupils start as the smoothed live positions and are edited in place by
/// handle drags. The calibration is a working copy: frame-edge drags
/// replace it, and it reaches the store only on validation.
#[derive(Debug, Clone)]
pub struct FrozenFrame {
    pub landmarks: LandmarkSet,
    pub pupils: Pupils,
    pub temples: Option<TemplePair>,
    pub calibration: CalibrationData,
    pub image: Option<CapturedImage>,
    pub captured_at: u64,
}
