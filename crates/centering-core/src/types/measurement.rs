//! The engine's output artifact.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Eye, Pupils, Real};

/// Opaque still image attached to a frozen measurement.
///
/// The engine never decodes it; it is carried through to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CapturedImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Optical measurements derived from one frame.
///
/// Created only by [`compute_measurement`](crate::compute_measurement) and
/// never mutated afterwards: every recomputation produces a new value.
/// Optional fields are `None` when their inputs were not available; `None`
/// means "not measured", which is distinct from a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Pupil-to-pupil distance.
    pub pd_mm: Real,
    /// Left pupil to frame axis.
    pub pd_left_mm: Real,
    /// Right pupil to frame axis.
    pub pd_right_mm: Real,
    pub height_left_mm: Option<Real>,
    pub height_right_mm: Option<Real>,
    /// Vertical extent of the lens opening.
    pub frame_height_mm: Option<Real>,
    /// Effective diameter of the blank: the larger of the two eyes.
    pub ed_mm: Option<Real>,
    pub ed_left_mm: Option<Real>,
    pub ed_right_mm: Option<Real>,
    /// Horizontal pupil offset from the lens center, negative towards the
    /// nose. Needs the frame dimensions.
    #[serde(default)]
    pub lens_shift_left_mm: Option<Real>,
    #[serde(default)]
    pub lens_shift_right_mm: Option<Real>,
    pub pupils: Pupils,
    /// Image x of the frame axis the per-eye PDs are measured from.
    pub frame_center_x: Real,
    /// Scale the millimeter values were derived with.
    pub pixels_per_mm: Real,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    #[serde(skip)]
    pub captured_image: Option<CapturedImage>,
}

impl Measurement {
    pub fn pd(&self, eye: Eye) -> Real {
        match eye {
            Eye::Left => self.pd_left_mm,
            Eye::Right => self.pd_right_mm,
        }
    }

    pub fn height(&self, eye: Eye) -> Option<Real> {
        match eye {
            Eye::Left => self.height_left_mm,
            Eye::Right => self.height_right_mm,
        }
    }

    pub fn ed(&self, eye: Eye) -> Option<Real> {
        match eye {
            Eye::Left => self.ed_left_mm,
            Eye::Right => self.ed_right_mm,
        }
    }

    pub fn lens_shift(&self, eye: Eye) -> Option<Real> {
        match eye {
            Eye::Left => self.lens_shift_left_mm,
            Eye::Right => self.lens_shift_right_mm,
        }
    }

    /// True once every optional quantity has been measured.
    pub fn is_complete(&self) -> bool {
        self.height_left_mm.is_some()
            && self.height_right_mm.is_some()
            && self.frame_height_mm.is_some()
            && self.ed_mm.is_some()
    }

    /// Copy of this measurement carrying a still image.
    pub fn with_captured_image(mut self, image: Option<CapturedImage>) -> Self {
        self.captured_image = image;
        self
    }
}

struct Mm(Option<Real>);

impl fmt::Display for Mm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.1} mm"),
            None => f.write_str("not yet available"),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PD total: {} ({:.2} px/mm)",
            Mm(Some(self.pd_mm)),
            self.pixels_per_mm
        )?;
        for (label, eye) in [("Right", Eye::Right), ("Left", Eye::Left)] {
            writeln!(
                f,
                "{label:<5} PD: {} | height: {} | ED: {}",
                Mm(Some(self.pd(eye))),
                Mm(self.height(eye)),
                Mm(self.ed(eye)),
            )?;
        }
        write!(
            f,
            "Frame height: {} | ED: {}",
            Mm(self.frame_height_mm),
            Mm(self.ed_mm)
        )
    }
}
