//! Measurement session framework.
//!
//! A [`MeasurementSession`] owns everything one measurement needs: the
//! landmark stream's latest frame, the smoothing state, the frozen
//! snapshot, the operator corrections and the resulting measurement. It
//! moves through the [`SessionState`] lifecycle and records operator
//! actions in a lightweight [`LogEntry`] trail.
//!
//! ```
//! use centering_core::{test_utils::SyntheticFace, FrameSpec};
//! use centering_pipeline::{CalibrationStore, MeasurementSession, SessionConfig, SessionState};
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut session = MeasurementSession::new(
//!     SessionConfig::default(),
//!     FrameSpec::default(),
//!     CalibrationStore::in_memory("front-camera"),
//! )?;
//!
//! session.on_landmarks(SyntheticFace::default().landmarks())?;
//! session.capture(None)?;
//! let measurement = session.validate()?;
//!
//! assert_eq!(session.state(), SessionState::Validated);
//! assert!(measurement.ed_mm.is_some());
//! # Ok(())
//! # }
//! ```

mod measurement_session;
mod state;
mod types;

pub use measurement_session::MeasurementSession;
pub use state::{FrozenFrame, SessionState};
pub use types::{current_timestamp, LogEntry, SessionMetadata};
