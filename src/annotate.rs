use crate::error::SegmenterError;
use crate::segmentation::BoundingBox;
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 16.0;
/// Labels go below the box when there is less room than this above it
const LABEL_HEADROOM: u32 = 20;

/// Load a TrueType/OpenType font for label text
pub fn load_font(path: &Path) -> Result<FontVec, SegmenterError> {
    let data = std::fs::read(path).map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to read font {:?}: {}", path, e))
    })?;
    let font = FontVec::try_from_vec(data).map_err(|e| {
        SegmenterError::InitializationError(format!("Invalid font {:?}: {}", path, e))
    })?;

    tracing::info!("Label font loaded from {:?}", path);
    Ok(font)
}

/// Draw letter boxes in green over an RGB copy of the bitmap.
///
/// With a font, `labels[i]` is written next to `boxes[i]`; boxes without a
/// matching label are drawn bare.
pub fn annotate(
    bitmap: &GrayImage,
    boxes: &[BoundingBox],
    labels: &[String],
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(bitmap.clone()).to_rgb8();

    for (i, b) in boxes.iter().enumerate().filter(|(_, b)| !b.is_empty()) {
        for inset in 0..BOX_THICKNESS {
            let (w, h) = (b.width() + 2 * inset, b.height() + 2 * inset);
            let rect = Rect::at(b.x0 as i32 - inset as i32, b.y0 as i32 - inset as i32)
                .of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }

        if let (Some(font), Some(label)) = (font, labels.get(i)) {
            let text_y = if b.y0 < LABEL_HEADROOM {
                b.y1 + BOX_THICKNESS
            } else {
                b.y0 - LABEL_HEADROOM + 2
            };
            draw_text_mut(
                &mut canvas,
                BOX_COLOR,
                b.x0 as i32,
                text_y as i32,
                PxScale::from(LABEL_SCALE),
                font,
                label,
            );
        }
    }

    canvas
}
