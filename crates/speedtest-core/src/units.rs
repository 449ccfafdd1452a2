//! Unit helpers.

/// Byte rate to bit rate.
pub fn bytes_to_bits(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0
}

/// Human-readable megabits, rounded to two decimals. Log output only; gauges
/// always carry raw bits/second.
pub fn bits_to_megabits_string(bits_per_sec: f64) -> String {
    let megabits = (bits_per_sec * 1e-6 * 100.0).round() / 100.0;
    // Debug keeps the trailing ".0" on whole numbers.
    format!("{megabits:?}Mbps")
}
