use image::{imageops, imageops::FilterType, GrayImage, Luma};

/// Margin added around the squared glyph
pub const DEFAULT_BORDER: u32 = 15;
/// Side length of the classifier input
pub const TILE_SIZE: u32 = 28;

const FILL: Luma<u8> = Luma([255]);

/// Classifier-ready letter image: `size * size` intensities in `[0, 1]`,
/// row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub size: u32,
    pub data: Vec<f32>,
}

/// Pad the shorter side with white so the crop becomes a centered square.
/// An odd difference puts the extra pixel on the right or bottom.
pub fn pad_to_square(crop: &GrayImage) -> GrayImage {
    let (w, h) = crop.dimensions();
    if w == h {
        return crop.clone();
    }

    let side = w.max(h);
    let (left, top) = if h > w {
        ((h - w) / 2, 0)
    } else {
        (0, (w - h) / 2)
    };

    let mut square = GrayImage::from_pixel(side, side, FILL);
    imageops::replace(&mut square, crop, left as i64, top as i64);
    square
}

/// Square the crop and surround it with a uniform white `border`.
///
/// The result is always square with side `max(w, h) + 2 * border`.
/// Callers must not pass an empty crop.
pub fn normalize(crop: &GrayImage, border: u32) -> GrayImage {
    debug_assert!(crop.width() > 0 && crop.height() > 0, "empty crop");

    let square = pad_to_square(crop);
    let side = square.width() + 2 * border;

    let mut framed = GrayImage::from_pixel(side, side, FILL);
    imageops::replace(&mut framed, &square, border as i64, border as i64);
    framed
}

/// Nearest-neighbour resize to `size * size` and scale to `[0, 1]`
pub fn to_tile(normalized: &GrayImage, size: u32) -> Tile {
    let resized = imageops::resize(normalized, size, size, FilterType::Nearest);
    let data = resized.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
    Tile { size, data }
}
