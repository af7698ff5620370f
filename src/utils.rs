//! Utility functions

use crate::types::ValueRange;
use num_traits::Float;

/// Format byte size in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Minimum and maximum of the finite values, `None` if there are none
pub fn scan_range<T: Float>(data: &[T]) -> Option<ValueRange> {
    let mut values = data.iter().copied().filter(|v| v.is_finite());
    let first = values.next()?;
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(ValueRange::new(min.to_f64()?, max.to_f64()?))
}

/// Map values linearly from `range` onto `0..=255`
///
/// Values outside the range clamp to the ends; NaN maps to 0. A degenerate
/// range maps everything at or above `min` to 255.
pub fn normalize_to_u8<T: Float>(data: &[T], range: ValueRange) -> Vec<u8> {
    let span = range.span();
    data.iter()
        .map(|v| {
            let v = v.to_f64().unwrap_or(f64::NAN);
            if v.is_nan() {
                return 0;
            }
            let t = if span > 0.0 {
                (v - range.min) / span
            } else if v >= range.min {
                1.0
            } else {
                0.0
            };
            (t.clamp(0.0, 1.0) * 255.0).round() as u8
        })
        .collect()
}
