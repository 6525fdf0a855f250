//! Operator corrections applied on top of detected landmarks.

use serde::{Deserialize, Serialize};

use crate::{Eye, FrameSide, Real};

/// Manual pixel offsets added to the temple-derived frame-edge x coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOffsets {
    pub frame_left_offset_px: Real,
    pub frame_right_offset_px: Real,
    /// Set by the first manual frame-edge adjustment; cleared only by
    /// [`CorrectionOffsets::reset`].
    pub manually_adjusted: bool,
}

impl CorrectionOffsets {
    pub fn get(&self, side: FrameSide) -> Real {
        match side {
            FrameSide::Left => self.frame_left_offset_px,
            FrameSide::Right => self.frame_right_offset_px,
        }
    }

    /// Set the offset for one edge and mark the offsets as manually adjusted.
    pub fn set(&mut self, side: FrameSide, offset_px: Real) {
        match side {
            FrameSide::Left => self.frame_left_offset_px = offset_px,
            FrameSide::Right => self.frame_right_offset_px = offset_px,
        }
        self.manually_adjusted = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Operator-placed horizontal lines, as image rows in pixels.
///
/// `None` means the line has not been placed yet; measurements depending on
/// it stay unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionLines {
    /// Top edge of the lens opening.
    pub frame_top_y: Option<Real>,
    /// Bottom edge of the lens opening.
    pub frame_bottom_y: Option<Real>,
    /// Bottom of the left lens, below the left pupil.
    pub height_left_y: Option<Real>,
    /// Bottom of the right lens, below the right pupil.
    pub height_right_y: Option<Real>,
}

impl CorrectionLines {
    pub fn height_line(&self, eye: Eye) -> Option<Real> {
        match eye {
            Eye::Left => self.height_left_y,
            Eye::Right => self.height_right_y,
        }
    }

    pub fn set_height_line(&mut self, eye: Eye, y: Real) {
        match eye {
            Eye::Left => self.height_left_y = Some(y),
            Eye::Right => self.height_right_y = Some(y),
        }
    }

    /// Vertical extent of the lens opening, when both frame lines are placed
    /// at finite positions.
    pub fn frame_height_px(&self) -> Option<Real> {
        Some((self.frame_bottom_y? - self.frame_top_y?).abs()).filter(|h| h.is_finite())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
