//! Human-readable formatting for progress output.

use std::time::Instant;

/// Format a byte count with a short decimal unit, e.g. `1.23 MB`.
pub fn format_byte_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "kB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Elapsed time since `start`, in whole milliseconds.
pub fn format_elapsed(start: Instant) -> String {
    format!("{}ms", start.elapsed().as_millis())
}
