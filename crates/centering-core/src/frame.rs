//! Physical description of the ordered spectacle frame.
//!
//! The frame's overall width serves as the calibration ruler: its extent on
//! the captured face, in pixels, divided by its known width in millimeters
//! gives the image scale.

use serde::{Deserialize, Serialize};

use crate::Real;

/// Extra width a full-rim frame adds around the two lens openings (mm).
pub const FULL_RIM_ALLOWANCE_MM: Real = 5.0;

/// How the lenses are held by the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountingType {
    /// Drilled lenses, no rim.
    Rimless,
    /// Nylon-thread or half-rim styles.
    SemiRim,
    #[default]
    FullRim,
}

impl MountingType {
    /// Width added to the lens openings when computing the reference width.
    pub fn allowance_mm(self) -> Real {
        match self {
            MountingType::Rimless | MountingType::SemiRim => 0.0,
            MountingType::FullRim => FULL_RIM_ALLOWANCE_MM,
        }
    }
}

/// Frame dimensions from the eyewear order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    /// Horizontal width of one lens opening.
    pub caliber_mm: Real,
    /// Gap between the two lens openings.
    pub bridge_mm: Real,
    #[serde(default)]
    pub mounting_type: MountingType,
}

impl FrameSpec {
    pub fn new(caliber_mm: Real, bridge_mm: Real, mounting_type: MountingType) -> Self {
        Self {
            caliber_mm,
            bridge_mm,
            mounting_type,
        }
    }

    /// Distance from the bridge center to the geometric center of one lens.
    pub fn lens_center_mm(&self) -> Real {
        (self.bridge_mm + self.caliber_mm) / 2.0
    }
}

impl Default for FrameSpec {
    /// A common 52□18 full-rim frame.
    fn default() -> Self {
        Self::new(52.0, 18.0, MountingType::FullRim)
    }
}

/// Physical width of the calibration ruler:
/// `2 * caliber + bridge + allowance(mounting)`.
pub fn reference_width_mm(spec: &FrameSpec) -> Real {
    2.0 * spec.caliber_mm + spec.bridge_mm + spec.mounting_type.allowance_mm()
}
