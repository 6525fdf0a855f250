//! Scalar and vector aliases shared by the workspace.
//!
//! All image-space quantities are expressed in pixels with the origin at the
//! top-left corner, x growing to the right and y growing downwards.

use nalgebra::{Point2, Vector2};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;

/// Euclidean distance between two image points.
pub fn distance(a: &Pt2, b: &Pt2) -> Real {
    nalgebra::distance(a, b)
}

/// Midpoint of two image points.
pub fn midpoint(a: &Pt2, b: &Pt2) -> Pt2 {
    nalgebra::center(a, b)
}

/// Returns true when `value` is finite and strictly positive.
#[inline]
pub fn is_positive_finite(value: Real) -> bool {
    value.is_finite() && value > 0.0
}
