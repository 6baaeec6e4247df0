use crate::classifier::{argmax, probability, Label, LetterClassifier, TileBatch};
use crate::error::SegmenterError;
use crate::segmentation::{BoundingBox, Segmenter, StepTiming};
use image::GrayImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// One classified letter region
#[derive(Debug, Clone, Serialize)]
pub struct LetterPrediction {
    pub bbox: BoundingBox,
    pub label: Label,
    pub confidence: f32,
}

/// Recognized word and the letters it is made of, in box order
#[derive(Debug, Clone)]
pub struct Recognition {
    pub word: String,
    pub letters: Vec<LetterPrediction>,
    pub steps: Vec<StepTiming>,
}

/// Segments a bitmap and classifies every letter region in one batch
pub struct Recognizer {
    segmenter: Segmenter,
    classifier: Arc<dyn LetterClassifier>,
}

impl Recognizer {
    pub fn new(segmenter: Segmenter, classifier: Arc<dyn LetterClassifier>) -> Self {
        Self {
            segmenter,
            classifier,
        }
    }

    pub fn recognize(&self, bitmap: &GrayImage) -> Result<Recognition, SegmenterError> {
        let segmentation = self.segmenter.run(bitmap);

        if segmentation.is_empty() {
            tracing::debug!("No letter regions found, skipping classification");
            return Ok(Recognition {
                word: String::new(),
                letters: Vec::new(),
                steps: segmentation.steps,
            });
        }
        let mut steps = segmentation.steps;

        let start = Instant::now();
        let batch = TileBatch::from_tiles(&segmentation.tiles)?;
        let scores = self.classifier.classify(&batch)?;
        if scores.len() != segmentation.boxes.len() {
            return Err(SegmenterError::ProcessingError(format!(
                "Classifier returned {} predictions for {} letters",
                scores.len(),
                segmentation.boxes.len()
            )));
        }
        steps.push(StepTiming {
            name: "classify".to_string(),
            time_ms: start.elapsed().as_millis() as u64,
        });

        let letters: Vec<LetterPrediction> = segmentation
            .boxes
            .into_iter()
            .zip(scores)
            .map(|(bbox, row)| match argmax(&row) {
                Some(index) => LetterPrediction {
                    bbox,
                    label: Label::from_index(index),
                    confidence: probability(&row, index),
                },
                None => LetterPrediction {
                    bbox,
                    label: Label::Unknown,
                    confidence: 0.0,
                },
            })
            .collect();

        let word = compose_word(&letters);
        tracing::debug!("Recognized {} letters: {}", letters.len(), word);

        Ok(Recognition {
            word,
            letters,
            steps,
        })
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }
}

/// Concatenate labels in box order; "no letter" predictions keep their slot
pub fn compose_word(letters: &[LetterPrediction]) -> String {
    letters.iter().map(|l| l.label.as_string()).collect()
}
