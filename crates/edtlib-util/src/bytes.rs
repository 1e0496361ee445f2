//! Bitwise operations over byte strings of possibly unequal length.
//!
//! Specifier masks in `*-map-mask` and `*-map-pass-thru` are applied to
//! specifiers byte by byte. When the operands differ in length, the shorter
//! one is padded on the left, with the identity element of the operation.

fn pad_left(bytes: &[u8], len: usize, fill: u8) -> Vec<u8> {
    let mut out = vec![fill; len.saturating_sub(bytes.len())];
    out.extend_from_slice(bytes);
    out
}

fn zip_with(a: &[u8], b: &[u8], fill: u8, op: impl Fn(u8, u8) -> u8) -> Vec<u8> {
    let len = a.len().max(b.len());
    pad_left(a, len, fill)
        .into_iter()
        .zip(pad_left(b, len, fill))
        .map(|(x, y)| op(x, y))
        .collect()
}

/// Bitwise AND, padding the shorter operand with ones.
pub fn and(a: &[u8], b: &[u8]) -> Vec<u8> {
    zip_with(a, b, 0xff, |x, y| x & y)
}

/// Bitwise OR, padding the shorter operand with zeros.
pub fn or(a: &[u8], b: &[u8]) -> Vec<u8> {
    zip_with(a, b, 0x00, |x, y| x | y)
}

pub fn not(a: &[u8]) -> Vec<u8> {
    a.iter().map(|x| !x).collect()
}

/// Keep the last `len` bytes of `bytes`.
pub fn truncate_left(bytes: &[u8], len: usize) -> &[u8] {
    &bytes[bytes.len().saturating_sub(len)..]
}
