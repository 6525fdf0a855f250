//! Draggable primitives and pointer hit-testing for the frozen frame.

use centering_core::{distance, Eye, FrameSide, Pt2, Real, Vec2};
use serde::{Deserialize, Serialize};

use crate::SessionConfig;

/// Something the operator can grab on the frozen frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "side")]
pub enum Primitive {
    /// Vertical line at one frame edge (image side).
    FrameEdge(FrameSide),
    /// Horizontal line at the top of the lens opening.
    FrameTop,
    /// Horizontal line at the bottom of the lens opening.
    FrameBottom,
    /// Horizontal line below one pupil, for the fitting height.
    HeightLine(Eye),
    /// The pupil center itself.
    PupilHandle(Eye),
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::FrameEdge(FrameSide::Left),
        Primitive::FrameEdge(FrameSide::Right),
        Primitive::FrameTop,
        Primitive::FrameBottom,
        Primitive::HeightLine(Eye::Left),
        Primitive::HeightLine(Eye::Right),
        Primitive::PupilHandle(Eye::Left),
        Primitive::PupilHandle(Eye::Right),
    ];

    /// Dragging this primitive changes the calibration.
    pub fn affects_calibration(self) -> bool {
        matches!(self, Primitive::FrameEdge(_))
    }

    pub fn is_handle(self) -> bool {
        matches!(self, Primitive::PupilHandle(_))
    }
}

/// Where a primitive currently is, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "shape")]
pub enum Shape {
    VerticalLine {
        x: Real,
    },
    /// `span` limits the x range the line covers; `None` spans the image.
    HorizontalLine {
        y: Real,
        span: Option<(Real, Real)>,
    },
    Handle {
        x: Real,
        y: Real,
    },
}

impl Shape {
    /// Pointer distance to the shape, or `None` if the pointer is outside
    /// the shape's span.
    pub fn distance_to(&self, pointer: &Pt2) -> Option<Real> {
        match *self {
            Shape::VerticalLine { x } => Some((pointer.x - x).abs()),
            Shape::HorizontalLine { y, span } => match span {
                Some((lo, hi)) if pointer.x < lo || pointer.x > hi => None,
                _ => Some((pointer.y - y).abs()),
            },
            Shape::Handle { x, y } => Some(distance(pointer, &Pt2::new(x, y))),
        }
    }

    /// Point of the shape that follows the pointer during a drag.
    fn anchor(&self, pointer: &Pt2) -> Pt2 {
        match *self {
            Shape::VerticalLine { x } => Pt2::new(x, pointer.y),
            Shape::HorizontalLine { y, .. } => Pt2::new(pointer.x, y),
            Shape::Handle { x, y } => Pt2::new(x, y),
        }
    }
}

/// A primitive and its current shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveState {
    pub primitive: Primitive,
    #[serde(flatten)]
    pub shape: Shape,
}

/// The primitive being dragged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveDrag {
    pub primitive: Primitive,
    /// Anchor minus pointer at press time, so the primitive keeps its
    /// position relative to the pointer instead of jumping under it.
    pub grab_offset: Vec2,
}

/// Pointer-driven selection of at most one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionController {
    line_threshold_px: Real,
    handle_threshold_px: Real,
    active: Option<ActiveDrag>,
}

impl InteractionController {
    pub fn new(line_threshold_px: Real, handle_threshold_px: Real) -> Self {
        Self {
            line_threshold_px,
            handle_threshold_px,
            active: None,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.line_hit_threshold_px, config.handle_hit_threshold_px)
    }

    fn threshold(&self, primitive: Primitive) -> Real {
        if primitive.is_handle() {
            self.handle_threshold_px
        } else {
            self.line_threshold_px
        }
    }

    /// Primitive under `pointer`, if any.
    ///
    /// Handles take precedence over lines; within each group the nearest
    /// candidate inside its threshold wins, ties going to the one listed
    /// first.
    pub fn hit_test<'p>(
        &self,
        primitives: &'p [PrimitiveState],
        pointer: Pt2,
    ) -> Option<&'p PrimitiveState> {
        let nearest = |handles: bool| {
            primitives
                .iter()
                .filter(|p| p.primitive.is_handle() == handles)
                .filter_map(|p| {
                    let d = p.shape.distance_to(&pointer)?;
                    (d <= self.threshold(p.primitive)).then_some((p, d))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(p, _)| p)
        };
        nearest(true).or_else(|| nearest(false))
    }

    /// Start dragging whatever is under `pointer`.
    ///
    /// Returns the grabbed primitive; a press on empty space clears any
    /// previous selection.
    pub fn press(&mut self, primitives: &[PrimitiveState], pointer: Pt2) -> Option<Primitive> {
        self.active = self.hit_test(primitives, pointer).map(|hit| ActiveDrag {
            primitive: hit.primitive,
            grab_offset: hit.shape.anchor(&pointer) - pointer,
        });
        self.active.map(|drag| drag.primitive)
    }

    /// Where the active primitive's anchor should move for `pointer`.
    pub fn drag_target(&self, pointer: Pt2) -> Option<(Primitive, Pt2)> {
        self.active
            .map(|drag| (drag.primitive, pointer + drag.grab_offset))
    }

    /// End the drag, returning the primitive that was active.
    pub fn release(&mut self) -> Option<Primitive> {
        self.active.take().map(|drag| drag.primitive)
    }

    pub fn active(&self) -> Option<&ActiveDrag> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }
}
