//! Derivation of optical measurements from pupils, frame edges and lines.
//!
//! Everything here is a pure function of its inputs. Pixel lengths are
//! converted to millimeters with the supplied [`CalibrationData`]; the only
//! failure mode is an unusable scale.

use log::debug;

use crate::{
    distance, CalibrationData, CenteringError, CorrectionLines, CorrectionOffsets, Eye,
    FrameSpec, Measurement, Pupils, Real, TemplePair,
};

/// Everything [`compute_measurement`] needs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct GeometryInput<'a> {
    pub pupils: Pupils,
    /// Frame-edge anchors. Without them the frame axis falls back to the
    /// pupil midpoint.
    pub temples: Option<TemplePair>,
    pub offsets: CorrectionOffsets,
    pub lines: CorrectionLines,
    pub calibration: &'a CalibrationData,
    /// Needed for the effective diameter only.
    pub frame: Option<FrameSpec>,
    pub timestamp: u64,
}

/// x coordinate of the frame's vertical axis.
///
/// Midway between the corrected frame edges, or between the pupils when
/// the temples are not known.
pub fn frame_center_x(
    pupils: &Pupils,
    temples: Option<&TemplePair>,
    offsets: &CorrectionOffsets,
) -> Real {
    match temples {
        Some(temples) => temples.center_x(offsets),
        None => {
            debug!("no temple landmarks, using pupil midpoint as frame axis");
            pupils.midpoint().x
        }
    }
}

/// Boxing-system effective diameter for one eye.
///
/// `GD = sqrt(caliber² + frame_height²)` is the lens diagonal; the
/// decentration `De = |(bridge + caliber)/2 - pd_eye|` is added on both
/// sides.
pub fn effective_diameter_mm(frame: &FrameSpec, frame_height_mm: Real, pd_eye_mm: Real) -> Real {
    let diagonal = frame.caliber_mm.hypot(frame_height_mm);
    let decentration = lens_shift_mm(frame, pd_eye_mm).abs();
    diagonal + 2.0 * decentration
}

/// Signed horizontal offset of a pupil from its lens center, negative when
/// the pupil sits nasally.
pub fn lens_shift_mm(frame: &FrameSpec, pd_eye_mm: Real) -> Real {
    pd_eye_mm - frame.lens_center_mm()
}

/// Compute a fresh [`Measurement`].
///
/// Quantities whose inputs are missing (an unplaced line, no frame spec)
/// or not finite are left as `None`. The returned measurement carries no captured image.
///
/// # Errors
///
/// [`CenteringError::InvalidCalibration`] if the calibration scale is not
/// positive and finite.
pub fn compute_measurement(input: &GeometryInput<'_>) -> Result<Measurement, CenteringError> {
    let scale = input.calibration.scale()?;
    let to_mm = |px: Real| px / scale;
    let pupils = &input.pupils;

    let center_x = frame_center_x(pupils, input.temples.as_ref(), &input.offsets);
    let pd_px = distance(&pupils.left.pt2(), &pupils.right.pt2());
    let pd_eye = |eye: Eye| to_mm((pupils.get(eye).x - center_x).abs());
    let height_eye = |eye: Eye| {
        input
            .lines
            .height_line(eye)
            .map(|line_y| line_y - pupils.get(eye).y)
            .filter(|dy| dy.is_finite())
            .map(|dy| to_mm(dy.max(0.0)))
    };

    let pd_left_mm = pd_eye(Eye::Left);
    let pd_right_mm = pd_eye(Eye::Right);
    let frame_height_mm = input.lines.frame_height_px().map(to_mm);

    let (ed_left_mm, ed_right_mm) = match (input.frame.as_ref(), frame_height_mm) {
        (Some(frame), Some(height)) => (
            Some(effective_diameter_mm(frame, height, pd_left_mm)),
            Some(effective_diameter_mm(frame, height, pd_right_mm)),
        ),
        _ => (None, None),
    };
    let ed_mm = ed_left_mm.zip(ed_right_mm).map(|(l, r)| l.max(r));
    let lens_shift = |pd_eye_mm: Real| input.frame.as_ref().map(|f| lens_shift_mm(f, pd_eye_mm));

    Ok(Measurement {
        pd_mm: to_mm(pd_px),
        pd_left_mm,
        pd_right_mm,
        height_left_mm: height_eye(Eye::Left),
        height_right_mm: height_eye(Eye::Right),
        frame_height_mm,
        ed_mm,
        ed_left_mm,
        ed_right_mm,
        lens_shift_left_mm: lens_shift(pd_left_mm),
        lens_shift_right_mm: lens_shift(pd_right_mm),
        pupils: *pupils,
        frame_center_x: center_x,
        pixels_per_mm: scale,
        timestamp: input.timestamp,
        captured_image: None,
    })
}
