use crate::error::SegmenterError;
use crate::segmentation::Tile;
use serde::{Serialize, Serializer};

/// Number of classes the letter model predicts: "none" plus a-z
pub const NUM_CLASSES: usize = 27;

/// Rendering of the "no letter" class in composed words
pub const NONE_PLACEHOLDER: &str = "N/A";

/// Batch of tiles laid out `N x 1 x size x size`, in box order
#[derive(Debug, Clone)]
pub struct TileBatch {
    pub len: usize,
    pub size: u32,
    pub data: Vec<f32>,
}

impl TileBatch {
    pub fn from_tiles(tiles: &[Tile]) -> Result<Self, SegmenterError> {
        let size = tiles.first().map(|t| t.size).unwrap_or(0);
        if tiles.iter().any(|t| t.size != size) {
            return Err(SegmenterError::Internal(
                "Tiles in one batch must share a size".to_string(),
            ));
        }

        let data = tiles.iter().flat_map(|t| t.data.iter().copied()).collect();
        Ok(Self {
            len: tiles.len(),
            size,
            data,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.len, 1, self.size as usize, self.size as usize]
    }
}

/// Predicted class of one letter region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Class 0: the model saw no letter
    None,
    Letter(char),
    /// Index outside the model's label set
    Unknown,
}

impl Label {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Label::None,
            1..=26 => Label::Letter((b'a' + (index as u8 - 1)) as char),
            _ => Label::Unknown,
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Label::None => NONE_PLACEHOLDER.to_string(),
            Label::Letter(c) => c.to_string(),
            Label::Unknown => "?".to_string(),
        }
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

/// Index of the highest score; the first one wins ties
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

/// Softmax probability of `scores[index]`
pub fn probability(scores: &[f32], index: usize) -> f32 {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let total: f32 = scores.iter().map(|s| (s - max).exp()).sum();
    if total == 0.0 || !total.is_finite() {
        return 0.0;
    }
    (scores[index] - max).exp() / total
}

/// Trait that all letter classifiers must implement.
///
/// A classifier is built once at startup, shared by every request and
/// released with `shutdown` when the server stops.
pub trait LetterClassifier: Send + Sync {
    /// Returns the classifier identifier (e.g., "rten")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the classifier
    fn description(&self) -> &'static str;

    /// Score every tile in the batch. Returns one row of `NUM_CLASSES`
    /// scores per tile, in batch order.
    fn classify(&self, batch: &TileBatch) -> Result<Vec<Vec<f32>>, SegmenterError>;

    /// Release model resources
    fn shutdown(&self) {}
}
