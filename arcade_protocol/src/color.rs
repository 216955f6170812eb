// Deterministic participant colors.
//
// `h = h * 31 + unit` over the UTF-16 code units of the identifier, wrapping
// at 2^32, then an index into a fixed palette. Hashing UTF-16 units (not
// bytes or chars) keeps the result equal to what a browser guest computes
// for the same id, including ids outside the BMP.

pub const PALETTE: [&str; 12] = [
    "#79d7ff", "#ffd84a", "#ff4d6d", "#4dff8a", "#b88cff", "#ff9f4d", "#4dd9c6", "#ff6bd6",
    "#a8ff4d", "#4d7dff", "#ff4db8", "#9affff",
];

pub fn color_for(id: &str) -> &'static str {
    let h = id
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)));
    PALETTE[h as usize % PALETTE.len()]
}
