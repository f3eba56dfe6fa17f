//! Out-of-range index handling shared by the resampler, the block transform
//! and the regeneration convolutions.

/// Reflects `index` into `0..len` without repeating the edge sample.
///
/// The reflection has period `2 * len - 2`, so `-1` maps to `1` and `len`
/// maps to `len - 2`. Lengths of 0 and 1 always map to 0.
pub fn mirror_index(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = (2 * len - 2) as isize;
    let mut value = index.rem_euclid(period);
    if value >= len as isize {
        value = period - value;
    }
    value as usize
}

/// Clamps `index` to the last valid position of a non-empty axis.
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}
