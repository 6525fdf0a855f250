//! Interactive measurement pipeline for `centering-rs`.
//!
//! Builds on the pure geometry of `centering-core` with the stateful parts
//! of a fitting session:
//!
//! - [`SessionConfig`]: thresholds, defaults and landmark layout,
//! - [`CalibrationStore`]: staleness policy over a [`CalibrationStorage`]
//!   backend ([`MemoryStorage`], [`JsonFileStorage`]),
//! - [`InteractionController`]: hit-testing and dragging of the correction
//!   primitives,
//! - [`MeasurementSession`]: the live / frozen / validated state machine.

mod config;
pub mod interaction;
pub mod session;
mod store;

pub use config::SessionConfig;
pub use interaction::{ActiveDrag, InteractionController, Primitive, PrimitiveState, Shape};
pub use session::{
    current_timestamp, FrozenFrame, LogEntry, MeasurementSession, SessionMetadata, SessionState,
};
pub use store::{CalibrationStorage, CalibrationStore, JsonFileStorage, MemoryStorage};
