use crate::segmentation::normalize::TILE_SIZE;
use crate::segmentation::SegmentationParams;
use crate::Args;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub label_font: Option<PathBuf>,
    pub segmentation: SegmentationParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9393,
            max_file_size: 10 * 1024 * 1024,
            model_path: None,
            model_url: None,
            label_font: None,
            segmentation: SegmentationParams::default(),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            model_path: args.model_path,
            model_url: args.model_url,
            label_font: args.label_font,
            segmentation: SegmentationParams {
                threshold: args.threshold,
                min_size: args.min_size,
                max_distance: args.max_distance,
                border: args.border,
                tile_size: TILE_SIZE,
            },
        }
    }
}
