use super::detect::{detect, DetectorParams};
use super::merge::{merge, DEFAULT_MAX_DISTANCE};
use super::normalize::{normalize, to_tile, Tile, DEFAULT_BORDER, TILE_SIZE};
use super::BoundingBox;
use image::{imageops, GrayImage};
use serde::Serialize;
use std::time::Instant;

/// Tunable segmentation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentationParams {
    pub threshold: u8,
    pub min_size: u32,
    pub max_distance: u32,
    pub border: u32,
    pub tile_size: u32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        let detector = DetectorParams::default();
        Self {
            threshold: detector.threshold,
            min_size: detector.min_size,
            max_distance: DEFAULT_MAX_DISTANCE,
            border: DEFAULT_BORDER,
            tile_size: TILE_SIZE,
        }
    }
}

impl SegmentationParams {
    fn detector(&self) -> DetectorParams {
        DetectorParams {
            threshold: self.threshold,
            min_size: self.min_size,
        }
    }
}

/// Timing information for a single segmentation step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Letter regions of one bitmap with their classifier tiles.
/// `tiles[i]` is the tile cut from `boxes[i]`.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub boxes: Vec<BoundingBox>,
    pub tiles: Vec<Tile>,
    pub steps: Vec<StepTiming>,
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Runs detection, merging and normalization over a bitmap
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    params: SegmentationParams,
}

impl Segmenter {
    pub fn new(params: SegmentationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    pub fn run(&self, bitmap: &GrayImage) -> Segmentation {
        let mut steps = Vec::new();
        let (width, height) = bitmap.dimensions();

        let detected = self.run_step("detect", &mut steps, || {
            detect(bitmap, &self.params.detector())
        });

        let merged = self.run_step("merge", &mut steps, || {
            merge(&detected, self.params.max_distance)
        });

        let (boxes, tiles): (Vec<BoundingBox>, Vec<Tile>) = self.run_step("normalize", &mut steps, || {
            merged
                .iter()
                .map(|b| b.clamp_to(width, height))
                .filter(|b| !b.is_empty())
                .map(|b| {
                    let crop = imageops::crop_imm(bitmap, b.x0, b.y0, b.width(), b.height())
                        .to_image();
                    let tile = to_tile(&normalize(&crop, self.params.border), self.params.tile_size);
                    (b, tile)
                })
                .unzip()
        });

        tracing::debug!(
            "Segmented {}x{} bitmap: {} detected, {} after merge",
            width,
            height,
            detected.len(),
            merged.len()
        );

        Segmentation { boxes, tiles, steps }
    }

    fn run_step<T, F>(&self, name: &str, timings: &mut Vec<StepTiming>, step_fn: F) -> T
    where
        F: FnOnce() -> T,
    {
        let step_start = Instant::now();
        let result = step_fn();
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        result
    }
}
