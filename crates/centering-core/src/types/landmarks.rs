//! Landmark types delivered by the external face detector.
//!
//! A [`LandmarkSet`] is the per-frame output of the detector: an ordered list
//! of image points indexed by a fixed anatomical numbering. The
//! [`LandmarkLayout`] says which indices hold the temples and the eyes, and
//! resolves them into [`Pupils`] and a [`TemplePair`].

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{midpoint, CenteringError, CorrectionOffsets, Pt2, Real};

/// A detected point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: Real,
    pub y: Real,
    /// Relative depth as reported by the detector (unitless, not smoothed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Real>,
    /// Detector confidence in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Real>,
}

impl Point {
    pub fn new(x: Real, y: Real) -> Self {
        Self {
            x,
            y,
            z: None,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Real) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[inline]
    pub fn pt2(&self) -> Pt2 {
        Pt2::new(self.x, self.y)
    }

    /// A point is usable when its coordinates are finite and its confidence,
    /// if reported, is above `min_confidence`.
    pub fn is_usable(&self, min_confidence: Real) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.confidence.map_or(true, |c| c > min_confidence)
    }

    /// Arithmetic mean of a point cluster.
    ///
    /// `z` and `confidence` are averaged over the points that report them.
    /// Returns `None` for an empty slice.
    pub fn mean(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as Real;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point {
            x: sx / n,
            y: sy / n,
            z: mean_of(points.iter().filter_map(|p| p.z)),
            confidence: mean_of(points.iter().filter_map(|p| p.confidence)),
        })
    }
}

fn mean_of(values: impl Iterator<Item = Real>) -> Option<Real> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as Real)
}

/// Anatomical eye, relative to the subject (not to the screen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];
}

/// Pupil centers labelled by the subject's own left and right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pupils {
    pub left: Point,
    pub right: Point,
}

impl Pupils {
    /// Label two pupil candidates by x-comparison.
    ///
    /// In a non-mirrored camera image the subject faces the camera, so their
    /// left eye appears on the image right (larger x). A mirrored preview
    /// swaps that relation.
    pub fn from_unordered(a: Point, b: Point, mirrored: bool) -> Self {
        let (image_left, image_right) = if a.x <= b.x { (a, b) } else { (b, a) };
        if mirrored {
            Self {
                left: image_left,
                right: image_right,
            }
        } else {
            Self {
                left: image_right,
                right: image_left,
            }
        }
    }

    pub fn get(&self, eye: Eye) -> &Point {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, eye: Eye) -> &mut Point {
        match eye {
            Eye::Left => &mut self.left,
            Eye::Right => &mut self.right,
        }
    }

    pub fn midpoint(&self) -> Pt2 {
        midpoint(&self.left.pt2(), &self.right.pt2())
    }
}

/// Image side of a frame edge. Frame edges are screen-space handles, so they
/// are named by image side (left = smaller x), unlike [`Eye`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSide {
    Left,
    Right,
}

impl FrameSide {
    pub const BOTH: [FrameSide; 2] = [FrameSide::Left, FrameSide::Right];
}

/// Width and height of the analysed image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// One frame worth of detector output. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            image_size: None,
            timestamp: None,
        }
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some(ImageSize { width, height });
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }
}

/// The two temple landmarks, ordered by image x.
///
/// The temples stand in for the outer edges of the spectacle frame; their
/// distance (after operator corrections) is the calibration ruler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplePair {
    pub left: Point,
    pub right: Point,
}

impl TemplePair {
    pub fn from_unordered(a: Point, b: Point) -> Self {
        if a.x <= b.x {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }

    /// Frame-edge point for `side` with the operator offset applied.
    pub fn edge(&self, side: FrameSide, offsets: &CorrectionOffsets) -> Pt2 {
        let temple = match side {
            FrameSide::Left => &self.left,
            FrameSide::Right => &self.right,
        };
        Pt2::new(temple.x + offsets.get(side), temple.y)
    }

    /// Euclidean distance between the corrected frame edges.
    pub fn width_px(&self, offsets: &CorrectionOffsets) -> Real {
        crate::distance(
            &self.edge(FrameSide::Left, offsets),
            &self.edge(FrameSide::Right, offsets),
        )
    }

    /// x coordinate of the frame axis between the corrected edges.
    pub fn center_x(&self, offsets: &CorrectionOffsets) -> Real {
        (self.edge(FrameSide::Left, offsets).x + self.edge(FrameSide::Right, offsets).x) / 2.0
    }
}

/// Index layout of the detector's landmark numbering.
///
/// Defaults follow the 478-point refined face mesh: temples at 234/454,
/// refined iris centers at 468/473 with their 5-point clusters, and a ring
/// of eye-contour points per eye as the last fallback. Index pairs are not
/// trusted for left/right labelling; that is resolved by x-comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    pub temples: [usize; 2],
    pub iris_centers: [usize; 2],
    pub iris_clusters: [Vec<usize>; 2],
    pub eye_contours: [Vec<usize>; 2],
    /// Points whose reported confidence is at or below this value are
    /// treated as not detected.
    pub min_confidence: Real,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            temples: [234, 454],
            iris_centers: [468, 473],
            iris_clusters: [
                vec![468, 469, 470, 471, 472],
                vec![473, 474, 475, 476, 477],
            ],
            eye_contours: [
                vec![33, 160, 159, 158, 157, 173],
                vec![362, 385, 386, 387, 388, 263],
            ],
            min_confidence: 0.0,
        }
    }
}

impl LandmarkLayout {
    fn usable(&self, set: &LandmarkSet, index: usize) -> Option<Point> {
        set.get(index)
            .copied()
            .filter(|p| p.is_usable(self.min_confidence))
    }

    fn cluster_mean(&self, set: &LandmarkSet, indices: &[usize]) -> Option<Point> {
        let points: Vec<Point> = indices
            .iter()
            .filter_map(|&i| self.usable(set, i))
            .collect();
        Point::mean(&points)
    }

    /// Locate both temples.
    ///
    /// # Errors
    ///
    /// [`CenteringError::InsufficientSignal`] if either temple is missing or
    /// below the confidence floor.
    pub fn temples(&self, set: &LandmarkSet) -> Result<TemplePair, CenteringError> {
        let [a, b] = self.temples;
        match (self.usable(set, a), self.usable(set, b)) {
            (Some(a), Some(b)) => Ok(TemplePair::from_unordered(a, b)),
            _ => Err(CenteringError::insufficient(format!(
                "temple landmarks {a}/{b} not detected"
            ))),
        }
    }

    /// Locate both pupil centers and label them anatomically.
    ///
    /// Tries the refined iris centers first, then the mean of each iris
    /// cluster, then the mean of each eye contour.
    ///
    /// # Errors
    ///
    /// [`CenteringError::InsufficientSignal`] if no strategy yields both eyes.
    pub fn pupils(&self, set: &LandmarkSet, mirrored: bool) -> Result<Pupils, CenteringError> {
        let [ia, ib] = self.iris_centers;
        if let (Some(a), Some(b)) = (self.usable(set, ia), self.usable(set, ib)) {
            return Ok(Pupils::from_unordered(a, b, mirrored));
        }

        let [ca, cb] = &self.iris_clusters;
        if let (Some(a), Some(b)) = (self.cluster_mean(set, ca), self.cluster_mean(set, cb)) {
            debug!("iris centers missing, using iris cluster means");
            return Ok(Pupils::from_unordered(a, b, mirrored));
        }

        let [ea, eb] = &self.eye_contours;
        if let (Some(a), Some(b)) = (self.cluster_mean(set, ea), self.cluster_mean(set, eb)) {
            debug!("iris landmarks missing, using eye contour means");
            return Ok(Pupils::from_unordered(a, b, mirrored));
        }

        Err(CenteringError::insufficient("no pupil landmarks detected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_set(entries: &[(usize, Point)]) -> LandmarkSet {
        let len = entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut points = vec![Point::new(Real::NAN, Real::NAN); len];
        for (i, p) in entries {
            points[*i] = *p;
        }
        LandmarkSet::new(points)
    }

    #[test]
    fn pupils_are_labelled_by_x() {
        let a = Point::new(400.0, 300.0);
        let b = Point::new(600.0, 305.0);

        let pupils = Pupils::from_unordered(a, b, false);
        assert_eq!(pupils.left.x, 600.0);
        assert_eq!(pupils.right.x, 400.0);

        // Argument order does not matter.
        assert_eq!(Pupils::from_unordered(b, a, false), pupils);

        let mirrored = Pupils::from_unordered(a, b, true);
        assert_eq!(mirrored.left.x, 400.0);
        assert_eq!(mirrored.right.x, 600.0);
    }

    #[test]
    fn point_mean_averages_optional_fields_over_reporters() {
        let pts = [
            Point::new(0.0, 0.0).with_confidence(1.0),
            Point::new(2.0, 4.0),
            Point {
                x: 4.0,
                y: 2.0,
                z: Some(-0.5),
                confidence: Some(0.5),
            },
        ];
        let m = Point::mean(&pts).unwrap();
        assert!((m.x - 2.0).abs() < 1e-12);
        assert!((m.y - 2.0).abs() < 1e-12);
        assert_eq!(m.z, Some(-0.5));
        assert_eq!(m.confidence, Some(0.75));
        assert!(Point::mean(&[]).is_none());
    }

    #[test]
    fn pupils_prefer_refined_iris_centers() {
        let layout = LandmarkLayout::default();
        let set = sparse_set(&[
            (468, Point::new(600.0, 300.0)),
            (469, Point::new(700.0, 300.0)),
            (473, Point::new(400.0, 300.0)),
        ]);
        let pupils = layout.pupils(&set, false).unwrap();
        assert_eq!(pupils.left.x, 600.0);
        assert_eq!(pupils.right.x, 400.0);
    }

    #[test]
    fn pupils_fall_back_to_iris_cluster_means() {
        let layout = LandmarkLayout::default();
        let set = sparse_set(&[
            (469, Point::new(590.0, 300.0)),
            (471, Point::new(610.0, 300.0)),
            (474, Point::new(390.0, 290.0)),
            (476, Point::new(410.0, 310.0)),
        ]);
        let pupils = layout.pupils(&set, false).unwrap();
        assert!((pupils.left.x - 600.0).abs() < 1e-9);
        assert!((pupils.right.x - 400.0).abs() < 1e-9);
        assert!((pupils.right.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn pupils_fall_back_to_eye_contours() {
        let layout = LandmarkLayout::default();
        let set = sparse_set(&[
            (33, Point::new(380.0, 300.0)),
            (173, Point::new(420.0, 300.0)),
            (362, Point::new(580.0, 300.0)),
            (263, Point::new(620.0, 300.0)),
        ]);
        let pupils = layout.pupils(&set, false).unwrap();
        assert!((pupils.right.x - 400.0).abs() < 1e-9);
        assert!((pupils.left.x - 600.0).abs() < 1e-9);
    }

    #[test]
    fn zero_confidence_points_count_as_missing() {
        let layout = LandmarkLayout::default();
        let set = sparse_set(&[
            (234, Point::new(300.0, 320.0).with_confidence(0.0)),
            (454, Point::new(700.0, 320.0).with_confidence(0.9)),
        ]);
        assert!(matches!(
            layout.temples(&set),
            Err(CenteringError::InsufficientSignal(_))
        ));
        assert!(matches!(
            layout.pupils(&set, false),
            Err(CenteringError::InsufficientSignal(_))
        ));
    }

    #[test]
    fn temple_pair_applies_offsets() {
        let temples =
            TemplePair::from_unordered(Point::new(700.0, 320.0), Point::new(300.0, 320.0));
        assert_eq!(temples.left.x, 300.0);

        let mut offsets = CorrectionOffsets::default();
        assert!((temples.width_px(&offsets) - 400.0).abs() < 1e-12);
        assert!((temples.center_x(&offsets) - 500.0).abs() < 1e-12);

        offsets.set(FrameSide::Left, 10.0);
        offsets.set(FrameSide::Right, 30.0);
        assert!((temples.width_px(&offsets) - 420.0).abs() < 1e-12);
        assert!((temples.center_x(&offsets) - 520.0).abs() < 1e-12);
    }

    #[test]
    fn landmark_set_serde_roundtrip() {
        let set = LandmarkSet::new(vec![Point::new(1.0, 2.0).with_confidence(0.9)])
            .with_image_size(1280, 720)
            .with_timestamp(42);
        let json = serde_json::to_string(&set).unwrap();
        let restored: LandmarkSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, set);
        assert_eq!(
            restored.image_size(),
            Some(ImageSize {
                width: 1280,
                height: 720
            })
        );
    }
}
