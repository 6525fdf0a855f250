//! Exponential moving average over a stream of image points.

use crate::{Point, Real, Vec2};

/// Default weight of the newest sample.
pub const SMOOTHING_ALPHA: Real = 0.5;

/// Per-point EMA filter used to steady pupil positions in live tracking.
///
/// Only `x` and `y` are smoothed; `z` and `confidence` are taken from the
/// raw sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingFilter {
    /// 1 = no smoothing, values near 0 = heavy smoothing.
    alpha: Real,
    state: Option<Vec2>,
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoothingFilter {
    pub fn new() -> Self {
        Self::with_alpha(SMOOTHING_ALPHA)
    }

    /// Filter with a custom weight, clamped to `(0, 1]`.
    pub fn with_alpha(alpha: Real) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(Real::EPSILON, 1.0)
        } else {
            SMOOTHING_ALPHA
        };
        Self { alpha, state: None }
    }

    pub fn alpha(&self) -> Real {
        self.alpha
    }

    /// Feed one sample and return the smoothed point.
    ///
    /// The first sample after construction or [`reset`](Self::reset) is
    /// returned unchanged.
    pub fn next(&mut self, sample: Point) -> Point {
        let raw = Vec2::new(sample.x, sample.y);
        let smoothed = match self.state {
            Some(prev) => prev + (raw - prev) * self.alpha,
            None => raw,
        };
        self.state = Some(smoothed);
        Point {
            x: smoothed.x,
            y: smoothed.y,
            ..sample
        }
    }

    /// Current smoothed position, if any sample has been seen.
    pub fn current(&self) -> Option<Vec2> {
        self.state
    }

    /// Forget the history; the next sample starts a fresh average.
    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut filter = SmoothingFilter::new();
        let out = filter.next(Point::new(120.0, 80.0).with_confidence(0.7));
        assert_eq!(out.x, 120.0);
        assert_eq!(out.y, 80.0);
        assert_eq!(out.confidence, Some(0.7));
    }

    #[test]
    fn halfway_blend_with_default_alpha() {
        let mut filter = SmoothingFilter::new();
        filter.next(Point::new(0.0, 0.0));
        let out = filter.next(Point::new(10.0, -4.0));
        assert!((out.x - 5.0).abs() < 1e-12);
        assert!((out.y + 2.0).abs() < 1e-12);
    }

    #[test]
    fn converges_to_a_constant_input() {
        let mut filter = SmoothingFilter::new();
        filter.next(Point::new(-300.0, 900.0));
        let target = Point::new(412.5, 233.0);
        let mut out = target;
        for _ in 0..60 {
            out = filter.next(target);
        }
        assert!((out.x - target.x).abs() < 1e-9);
        assert!((out.y - target.y).abs() < 1e-9);
    }

    #[test]
    fn single_outlier_moves_output_by_alpha_times_jump() {
        let mut filter = SmoothingFilter::new();
        for _ in 0..20 {
            filter.next(Point::new(400.0, 300.0));
        }
        let out = filter.next(Point::new(600.0, 100.0));
        assert!((out.x - 400.0).abs() <= SMOOTHING_ALPHA * 200.0 + 1e-9);
        assert!((out.y - 300.0).abs() <= SMOOTHING_ALPHA * 200.0 + 1e-9);

        // Pulled back once the stream returns.
        let back = filter.next(Point::new(400.0, 300.0));
        assert!((back.x - 400.0).abs() < (out.x - 400.0).abs());
    }

    #[test]
    fn z_and_confidence_are_not_smoothed() {
        let mut filter = SmoothingFilter::new();
        filter.next(Point {
            x: 0.0,
            y: 0.0,
            z: Some(-1.0),
            confidence: Some(0.2),
        });
        let out = filter.next(Point {
            x: 2.0,
            y: 2.0,
            z: Some(3.0),
            confidence: Some(0.9),
        });
        assert_eq!(out.z, Some(3.0));
        assert_eq!(out.confidence, Some(0.9));
    }

    #[test]
    fn reset_starts_over() {
        let mut filter = SmoothingFilter::new();
        filter.next(Point::new(0.0, 0.0));
        filter.reset();
        assert!(filter.current().is_none());
        let out = filter.next(Point::new(50.0, 50.0));
        assert_eq!(out.x, 50.0);
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(SmoothingFilter::with_alpha(3.0).alpha(), 1.0);
        assert!(SmoothingFilter::with_alpha(-1.0).alpha() > 0.0);
        assert_eq!(SmoothingFilter::with_alpha(Real::NAN).alpha(), SMOOTHING_ALPHA);
    }
}
