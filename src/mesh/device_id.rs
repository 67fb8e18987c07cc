// src/mesh/device_id.rs
//
// Device ID normalization. The firmware refers to the same node both as a bare
// number ("5") and zero-padded to three digits ("005"). Both the device table
// build and every name lookup go through `normalize_device_id` so they cannot
// drift apart.

/// Width the firmware pads numeric device addresses to.
pub const DEVICE_ID_WIDTH: usize = 3;

/// Zero-pad an all-digit ID to `DEVICE_ID_WIDTH`; anything else is returned
/// unchanged.
///
/// Longer numeric IDs are rebased without leading zeros beyond the width,
/// so `"0005"` and `"5"` both become `"005"`.
pub fn normalize_device_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    let digits = trimmed.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    format!("{:0>width$}", digits, width = DEVICE_ID_WIDTH)
}

/// Forms of `raw` to try against a device table, most specific first:
/// the raw string, then its normalized form when that differs.
pub fn lookup_candidates(raw: &str) -> impl Iterator<Item = String> {
    let normalized = normalize_device_id(raw);
    let padded = (normalized != raw).then_some(normalized);
    std::iter::once(raw.to_string()).chain(padded)
}
