use itertools::Itertools;

/// Width of one cell in bytes.
pub const CELL_SIZE: usize = 4;

/// Decode a big-endian unsigned number spanning any number of whole bytes.
///
/// Returns `None` if the number does not fit in 64 bits. Leading zero bytes
/// are ignored, so a three-cell value with a zero top cell still decodes.
///
/// ```
/// use edtlib_util::cells::be_num;
/// assert_eq!(be_num(&[0x00, 0x00, 0x10, 0x00]), Some(0x1000));
/// assert_eq!(be_num(&[0, 0, 0, 1, 0, 0, 0, 2]), Some(0x1_0000_0002));
/// assert_eq!(be_num(&[]), Some(0));
/// ```
pub fn be_num(bytes: &[u8]) -> Option<u64> {
    let significant = bytes
        .iter()
        .position(|&b| b != 0)
        .map_or(&bytes[bytes.len()..], |first| &bytes[first..]);

    if significant.len() > 8 {
        return None;
    }

    Some(significant.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Decode a byte string as a list of 32-bit big-endian cells.
///
/// Returns `None` if the length is not a multiple of [`CELL_SIZE`].
pub fn be_cells(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % CELL_SIZE != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(CELL_SIZE)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Encode `value` as `cells` big-endian cells. `None` if it does not fit.
pub fn to_be_cells(value: u64, cells: usize) -> Option<Vec<u8>> {
    let len = cells * CELL_SIZE;
    let raw = value.to_be_bytes();

    if len >= raw.len() {
        let mut out = vec![0u8; len - raw.len()];
        out.extend_from_slice(&raw);
        return Some(out);
    }

    let (dropped, kept) = raw.split_at(raw.len() - len);
    if dropped.iter().any(|&b| b != 0) {
        return None;
    }
    Some(kept.to_vec())
}

/// Encode a list of cells back into big-endian bytes.
pub fn cells_to_bytes(cells: &[u32]) -> Vec<u8> {
    cells.iter().flat_map(|c| c.to_be_bytes()).collect()
}

/// Split `bytes` into `size`-byte entries.
///
/// Returns `None` if `size` is zero or does not evenly divide the input.
pub fn split_entries(bytes: &[u8], size: usize) -> Option<Vec<&[u8]>> {
    if size == 0 || bytes.len() % size != 0 {
        return None;
    }
    Some(bytes.chunks_exact(size).collect())
}

/// Render a byte string as space-separated cells (or bytes, when the length
/// isn't cell-aligned), for error messages.
pub fn format_cells(bytes: &[u8]) -> String {
    match be_cells(bytes) {
        Some(cells) => format!("<{}>", cells.iter().map(|c| format!("0x{c:x}")).join(" ")),
        None => format!("[{}]", bytes.iter().map(|b| format!("{b:02x}")).join(" ")),
    }
}
