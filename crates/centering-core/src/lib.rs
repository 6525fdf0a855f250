//! Core types and geometry for `centering-rs`.
//!
//! This crate holds everything that is a pure function of its inputs:
//!
//! - the data model (landmarks, pupils, corrections, measurements),
//! - the physical frame model used as the calibration ruler,
//! - pixel-to-millimeter calibration,
//! - temporal smoothing of pupil positions,
//! - the geometry that turns pupils and operator lines into millimeters.
//!
//! Stateful orchestration (sessions, storage, interaction) lives in
//! `centering-pipeline`.
//!
//! # Example
//!
//! ```
//! use centering_core::{
//!     compute_measurement, CalibrationData, CorrectionLines, CorrectionOffsets, FrameSpec,
//!     GeometryInput, LandmarkLayout, MountingType,
//! };
//! use centering_core::test_utils::SyntheticFace;
//!
//! let set = SyntheticFace::default().landmarks();
//! let layout = LandmarkLayout::default();
//! let pupils = layout.pupils(&set, false).unwrap();
//! let temples = layout.temples(&set).unwrap();
//!
//! let frame = FrameSpec::new(52.0, 18.0, MountingType::FullRim);
//! let offsets = CorrectionOffsets::default();
//! let cal = CalibrationData::from_reference(temples.width_px(&offsets), &frame, "cam", 0).unwrap();
//!
//! let m = compute_measurement(&GeometryInput {
//!     pupils,
//!     temples: Some(temples),
//!     offsets,
//!     lines: CorrectionLines::default(),
//!     calibration: &cal,
//!     frame: Some(frame),
//!     timestamp: 0,
//! })
//! .unwrap();
//! assert!((m.pd_mm - 66.0).abs() < 1e-9);
//! ```

/// Pixel-to-millimeter calibration.
mod calibration;
mod error;
/// Physical frame description.
mod frame;
/// Measurement formulas.
mod geometry;
/// Scalar and point aliases.
mod math;
mod smoothing;
/// Test utilities for cross-crate testing.
///
/// Public so integration tests across the workspace can use it; not
/// intended for production use.
pub mod test_utils;
/// Data model.
mod types;

pub use calibration::*;
pub use error::*;
pub use frame::*;
pub use geometry::*;
pub use math::*;
pub use smoothing::*;
pub use types::*;
