//! Letter segmentation for hand-drawn words
//!
//! Detects stroke regions, merges fragments of the same letter and turns
//! each region into a square, fixed-size tile for classification.

pub mod bbox;
pub mod detect;
pub mod merge;
pub mod normalize;
pub mod pipeline;

pub use bbox::BoundingBox;
pub use normalize::Tile;
pub use pipeline::{Segmentation, SegmentationParams, Segmenter, StepTiming};
