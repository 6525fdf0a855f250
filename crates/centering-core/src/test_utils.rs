//! Synthetic detector output for tests.
//!
//! This module is public so the pipeline and CLI test suites can build
//! faces with known geometry, but it is not intended for production use.

use crate::{LandmarkLayout, LandmarkSet, Point, Real};

/// Number of points in the refined face mesh.
pub const FACE_MESH_POINTS: usize = 478;

/// A frontal face with exactly known pupil and temple positions.
///
/// Positions are in image pixels. `eye_half_distance_px` is measured from
/// the face center to each pupil, `temple_half_width_px` from the face
/// center to each temple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFace {
    pub center_x: Real,
    pub eye_y: Real,
    pub eye_half_distance_px: Real,
    pub temple_y: Real,
    pub temple_half_width_px: Real,
    /// Radius of the iris ring around each pupil center.
    pub iris_radius_px: Real,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for SyntheticFace {
    /// 640x480 frame; at 2 px/mm with a 52/18 full-rim frame the temples
    /// span exactly the 127 mm reference width and the PD is 66 mm.
    fn default() -> Self {
        Self {
            center_x: 320.0,
            eye_y: 200.0,
            eye_half_distance_px: 66.0,
            temple_y: 220.0,
            temple_half_width_px: 127.0,
            iris_radius_px: 6.0,
            image_width: 640,
            image_height: 480,
        }
    }
}

impl SyntheticFace {
    /// Pupil centers as `(image_left, image_right)`.
    pub fn pupil_positions(&self) -> (Point, Point) {
        (
            Point::new(self.center_x - self.eye_half_distance_px, self.eye_y),
            Point::new(self.center_x + self.eye_half_distance_px, self.eye_y),
        )
    }

    /// Temple positions as `(image_left, image_right)`.
    pub fn temple_positions(&self) -> (Point, Point) {
        (
            Point::new(self.center_x - self.temple_half_width_px, self.temple_y),
            Point::new(self.center_x + self.temple_half_width_px, self.temple_y),
        )
    }

    /// Same face translated by `(dx, dy)`.
    pub fn shifted(mut self, dx: Real, dy: Real) -> Self {
        self.center_x += dx;
        self.eye_y += dy;
        self.temple_y += dy;
        self
    }

    /// Full landmark set in the default [`LandmarkLayout`].
    pub fn landmarks(&self) -> LandmarkSet {
        let layout = LandmarkLayout::default();
        let filler = Point::new(self.center_x, self.eye_y + 60.0).with_confidence(1.0);
        let mut points = vec![filler; FACE_MESH_POINTS];

        let (temple_l, temple_r) = self.temple_positions();
        points[layout.temples[0]] = temple_l.with_confidence(1.0);
        points[layout.temples[1]] = temple_r.with_confidence(1.0);

        let (pupil_a, pupil_b) = self.pupil_positions();
        for (side, pupil) in [pupil_a, pupil_b].into_iter().enumerate() {
            points[layout.iris_centers[side]] = pupil.with_confidence(1.0);
            place_ring(
                &mut points,
                &layout.iris_clusters[side],
                &layout.iris_centers,
                pupil,
                self.iris_radius_px,
            );
            place_ring(
                &mut points,
                &layout.eye_contours[side],
                &[],
                pupil,
                self.iris_radius_px * 3.0,
            );
        }

        LandmarkSet::new(points).with_image_size(self.image_width, self.image_height)
    }
}

/// Scatter points evenly on a circle around `center`, so their mean is
/// `center`. Indices listed in `skip` are left alone.
fn place_ring(points: &mut [Point], indices: &[usize], skip: &[usize], center: Point, radius: Real) {
    let ring: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|i| !skip.contains(i))
        .collect();
    let n = ring.len() as Real;
    for (k, &index) in ring.iter().enumerate() {
        let angle = std::f64::consts::TAU * k as Real / n;
        points[index] = Point::new(
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
        )
        .with_confidence(1.0);
    }
}

/// Landmark set with only the filler points: no usable temples or pupils.
pub fn empty_face(image_width: u32, image_height: u32) -> LandmarkSet {
    let missing = Point::new(0.0, 0.0).with_confidence(0.0);
    LandmarkSet::new(vec![missing; FACE_MESH_POINTS]).with_image_size(image_width, image_height)
}
