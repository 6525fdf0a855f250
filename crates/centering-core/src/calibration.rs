//! Pixel-to-millimeter calibration.
//!
//! The scale is derived from the known physical width of the frame (see
//! [`reference_width_mm`]) and the pixel distance between the two corrected
//! frame edges on the captured face.

use serde::{Deserialize, Serialize};

use crate::{is_positive_finite, reference_width_mm, CenteringError, FrameSpec, Real};

/// How far ahead of the local clock a calibration timestamp may be.
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

/// A pixel-per-millimeter scale and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    /// Image scale; must be positive and finite to be usable.
    pub pixels_per_mm: Real,
    /// Measured width of the reference in pixels.
    pub reference_width_px: Real,
    /// Identity of the capture device this scale belongs to.
    pub device_id: String,
    /// Unix timestamp (seconds) of the calibration.
    pub timestamp: u64,
}

impl CalibrationData {
    /// Derive a calibration from the measured frame width.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InvalidReference`] if the frame's reference width
    ///   is not positive.
    /// - [`CenteringError::InsufficientSignal`] if `face_width_px` is not
    ///   positive (reference landmarks not detected).
    pub fn from_reference(
        face_width_px: Real,
        spec: &FrameSpec,
        device_id: impl Into<String>,
        timestamp: u64,
    ) -> Result<Self, CenteringError> {
        let width_mm = reference_width_mm(spec);
        if !is_positive_finite(width_mm) {
            return Err(CenteringError::InvalidReference { width_mm });
        }
        if !is_positive_finite(face_width_px) {
            return Err(CenteringError::insufficient(format!(
                "reference width is {face_width_px} px"
            )));
        }
        Ok(Self {
            pixels_per_mm: face_width_px / width_mm,
            reference_width_px: face_width_px,
            device_id: device_id.into(),
            timestamp,
        })
    }

    /// The scale, checked for positivity and finiteness.
    pub fn scale(&self) -> Result<Real, CenteringError> {
        if is_positive_finite(self.pixels_per_mm) {
            Ok(self.pixels_per_mm)
        } else {
            Err(CenteringError::InvalidCalibration {
                pixels_per_mm: self.pixels_per_mm,
            })
        }
    }

    /// Seconds elapsed since the calibration, saturating at zero for
    /// timestamps in the future.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    /// Check the scale and the staleness window.
    ///
    /// # Errors
    ///
    /// - [`CenteringError::InvalidCalibration`] for an unusable scale.
    /// - [`CenteringError::FutureCalibration`] when stamped more than
    ///   [`MAX_CLOCK_SKEW_SECS`] after `now`.
    /// - [`CenteringError::StaleCalibration`] when older than `max_age_secs`.
    pub fn check(&self, now: u64, max_age_secs: u64) -> Result<(), CenteringError> {
        self.scale()?;
        let ahead_secs = self.timestamp.saturating_sub(now);
        if ahead_secs > MAX_CLOCK_SKEW_SECS {
            return Err(CenteringError::FutureCalibration {
                ahead_secs,
                max_skew_secs: MAX_CLOCK_SKEW_SECS,
            });
        }
        let age_secs = self.age_secs(now);
        if age_secs > max_age_secs {
            return Err(CenteringError::StaleCalibration {
                age_secs,
                max_age_secs,
            });
        }
        Ok(())
    }

    pub fn is_valid_at(&self, now: u64, max_age_secs: u64) -> bool {
        self.check(now, max_age_secs).is_ok()
    }
}

/// Convert a pixel length to millimeters.
///
/// # Errors
///
/// [`CenteringError::InvalidCalibration`] if the scale is not positive and
/// finite. Callers are expected to validate calibration beforehand, so this
/// indicates a contract violation.
pub fn px_to_mm(px: Real, data: &CalibrationData) -> Result<Real, CenteringError> {
    Ok(px / data.scale()?)
}
