use super::BoundingBox;

/// Default vertical gap, in pixels, bridged when merging stacked fragments
pub const DEFAULT_MAX_DISTANCE: u32 = 30;

/// Fuse fragments of the same letter column into single boxes.
///
/// Expects boxes in detector order (sorted by `x0`, then `y0`). A single
/// greedy sweep keeps one accumulator; each following box is absorbed when
/// its x-range overlaps the accumulator's and its top edge lies within
/// `max_distance` of the accumulator's bottom edge. Otherwise the
/// accumulator is emitted and the box starts a new one.
///
/// The proximity test only looks from the accumulator's bottom to the next
/// box's top, matching the sort order. Each output box covers a contiguous
/// run of input boxes.
pub fn merge(boxes: &[BoundingBox], max_distance: u32) -> Vec<BoundingBox> {
    let Some((first, rest)) = boxes.split_first() else {
        return Vec::new();
    };

    let mut merged = Vec::with_capacity(boxes.len());
    let mut current = *first;

    for next in rest {
        if should_merge(&current, next, max_distance) {
            current = current.union(next);
            debug_assert!(current.contains(next));
        } else {
            merged.push(current);
            current = *next;
        }
    }
    merged.push(current);

    if merged.len() < boxes.len() {
        tracing::debug!("Merged {} regions into {}", boxes.len(), merged.len());
    }
    merged
}

fn should_merge(current: &BoundingBox, next: &BoundingBox, max_distance: u32) -> bool {
    let y_distance = (next.y0 as i64 - current.y1 as i64).abs();
    current.x_overlap(next) > 0 && y_distance <= max_distance as i64
}
