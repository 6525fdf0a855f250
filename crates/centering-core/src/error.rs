use thiserror::Error;

use crate::Real;

/// Errors reported by the centering engine.
///
/// Reference and calibration errors are recoverable: the caller keeps its
/// current state and can prompt the operator to recalibrate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CenteringError {
    #[error("frame reference width must be positive, got {width_mm} mm")]
    InvalidReference { width_mm: Real },
    #[error("insufficient signal: {0}")]
    InsufficientSignal(String),
    #[error("`{operation}` is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("calibration is stale: {age_secs} s old, limit is {max_age_secs} s")]
    StaleCalibration { age_secs: u64, max_age_secs: u64 },
    #[error("calibration is stamped {ahead_secs} s in the future, allowed skew is {max_skew_secs} s")]
    FutureCalibration { ahead_secs: u64, max_skew_secs: u64 },
    #[error("calibration scale must be positive and finite, got {pixels_per_mm} px/mm")]
    InvalidCalibration { pixels_per_mm: Real },
    #[error("pointer position must be finite, got ({x}, {y})")]
    InvalidPointer { x: Real, y: Real },
}

impl CenteringError {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientSignal(reason.into())
    }

    /// Returns true for errors the operator can fix by recalibrating.
    pub fn is_calibration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidReference { .. }
                | Self::StaleCalibration { .. }
                | Self::FutureCalibration { .. }
                | Self::InvalidCalibration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = CenteringError::InvalidState {
            operation: "validate",
            state: "live_tracking",
        };
        assert_eq!(
            err.to_string(),
            "`validate` is not allowed while the session is live_tracking"
        );

        let err = CenteringError::InvalidCalibration { pixels_per_mm: 0.0 };
        assert!(err.to_string().contains("0 px/mm"));

        let err = CenteringError::InvalidPointer { x: 1.5, y: Real::NAN };
        assert_eq!(err.to_string(), "pointer position must be finite, got (1.5, NaN)");
    }

    #[test]
    fn calibration_errors_are_classified() {
        assert!(CenteringError::InvalidReference { width_mm: 0.0 }.is_calibration_error());
        assert!(CenteringError::StaleCalibration {
            age_secs: 10,
            max_age_secs: 5
        }
        .is_calibration_error());
        assert!(!CenteringError::insufficient("no face").is_calibration_error());
    }
}
