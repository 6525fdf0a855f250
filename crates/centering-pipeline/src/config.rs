//! Session configuration.

use anyhow::{ensure, Result};
use centering_core::{LandmarkLayout, Real};
use serde::{Deserialize, Serialize};

/// Tunables for a [`MeasurementSession`](crate::MeasurementSession).
///
/// Every field has a default, so a JSON config only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Hit-testing
    // ─────────────────────────────────────────────────────────────────────────
    /// Pointer distance (px) within which a line primitive is grabbed.
    pub line_hit_threshold_px: Real,

    /// Pointer distance (px) within which a pupil handle is grabbed.
    pub handle_hit_threshold_px: Real,

    /// Horizontal half-span (px) of a height line around its pupil.
    pub height_line_half_width_px: Real,

    // ─────────────────────────────────────────────────────────────────────────
    // Calibration
    // ─────────────────────────────────────────────────────────────────────────
    /// Calibrations older than this are rejected as stale.
    pub calibration_max_age_secs: u64,

    /// Derive a calibration from the live stream when none is held.
    pub auto_calibrate: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Capture
    // ─────────────────────────────────────────────────────────────────────────
    /// The preview is horizontally flipped (selfie view).
    pub mirrored: bool,

    /// Initial frame-top line, as a fraction of the image height.
    pub default_frame_top_fraction: Real,

    /// Initial frame-bottom line, as a fraction of the image height.
    pub default_frame_bottom_fraction: Real,

    /// Initial distance (px) below the pupils of the frame-bottom line when
    /// the image size is unknown.
    pub default_height_line_offset_px: Real,

    /// Landmark indices used to locate temples and pupils.
    pub landmarks: LandmarkLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_hit_threshold_px: 20.0,
            handle_hit_threshold_px: 15.0,
            height_line_half_width_px: 40.0,
            calibration_max_age_secs: 24 * 60 * 60,
            auto_calibrate: true,
            mirrored: false,
            default_frame_top_fraction: 0.35,
            default_frame_bottom_fraction: 0.72,
            default_height_line_offset_px: 100.0,
            landmarks: LandmarkLayout::default(),
        }
    }
}

impl SessionConfig {
    /// Check that thresholds and fractions are usable.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.line_hit_threshold_px > 0.0,
            "line_hit_threshold_px must be positive"
        );
        ensure!(
            self.handle_hit_threshold_px > 0.0,
            "handle_hit_threshold_px must be positive"
        );
        ensure!(
            self.height_line_half_width_px > 0.0,
            "height_line_half_width_px must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&self.default_frame_top_fraction)
                && (0.0..=1.0).contains(&self.default_frame_bottom_fraction),
            "default frame line fractions must lie in [0, 1]"
        );
        ensure!(
            self.default_frame_top_fraction < self.default_frame_bottom_fraction,
            "default frame top line must be above the bottom line"
        );
        ensure!(
            self.default_height_line_offset_px.is_finite(),
            "default_height_line_offset_px must be finite"
        );
        ensure!(
            (0.0..=1.0).contains(&self.landmarks.min_confidence),
            "landmarks.min_confidence must lie in [0, 1]"
        );
        Ok(())
    }
}
