//! Data model shared by the engine and its callers.

mod corrections;
mod landmarks;
mod measurement;

pub use corrections::{CorrectionLines, CorrectionOffsets};
pub use landmarks::{
    Eye, FrameSide, ImageSize, LandmarkLayout, LandmarkSet, Point, Pupils, TemplePair,
};
pub use measurement::{CapturedImage, Measurement};
