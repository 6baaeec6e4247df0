use super::BoundingBox;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Parameters for letter region detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorParams {
    /// Pixels at or below this intensity are strokes
    pub threshold: u8,
    /// Regions must be strictly wider and taller than this
    pub min_size: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            threshold: 127,
            min_size: 20,
        }
    }
}

/// Find letter-like regions in a white-background bitmap.
///
/// Returns the bounding box of every external stroke region larger than
/// `min_size` in both dimensions, sorted by `(x0, y0)`.
pub fn detect(bitmap: &GrayImage, params: &DetectorParams) -> Vec<BoundingBox> {
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Vec::new();
    }

    let binary = binarize(bitmap, params.threshold);
    let filled = fill_holes(&binary);
    let mut boxes: Vec<BoundingBox> = region_bounds(&filled)
        .into_iter()
        .filter(|b| b.width() > params.min_size && b.height() > params.min_size)
        .collect();

    // Stable: equal keys keep raster-scan discovery order
    boxes.sort_by_key(|b| (b.x0, b.y0));

    tracing::debug!("Detected {} letter regions", boxes.len());
    boxes
}

/// Inverted binary threshold: dark strokes become foreground (255)
fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] > threshold {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Fill background pockets enclosed by strokes.
///
/// Background that cannot reach the image border through 4-connected
/// background pixels lies inside some region, so only outer boundaries
/// survive labelling. Anything drawn inside a loop joins the enclosing region.
fn fill_holes(binary: &GrayImage) -> GrayImage {
    let (width, height) = binary.dimensions();

    let background = GrayImage::from_fn(width, height, |x, y| {
        if binary.get_pixel(x, y).0[0] == FOREGROUND {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    });
    let labels = connected_components(&background, Connectivity::Four, Luma([BACKGROUND]));

    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut outside = vec![false; max_label + 1];
    for x in 0..width {
        outside[labels.get_pixel(x, 0).0[0] as usize] = true;
        outside[labels.get_pixel(x, height - 1).0[0] as usize] = true;
    }
    for y in 0..height {
        outside[labels.get_pixel(0, y).0[0] as usize] = true;
        outside[labels.get_pixel(width - 1, y).0[0] as usize] = true;
    }

    GrayImage::from_fn(width, height, |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        // Label 0 marks stroke pixels
        if label == 0 || !outside[label] {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Bounding box of every 8-connected foreground region, in label order
fn region_bounds(mask: &GrayImage) -> Vec<BoundingBox> {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([BACKGROUND]));

    let mut bounds: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if bounds.len() <= label {
            bounds.resize(label + 1, None);
        }

        bounds[label] = Some(match bounds[label] {
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
            None => (x, y, x, y),
        });
    }

    bounds
        .into_iter()
        .flatten()
        .map(|(min_x, min_y, max_x, max_y)| BoundingBox::new(min_x, min_y, max_x + 1, max_y + 1))
        .collect()
}
