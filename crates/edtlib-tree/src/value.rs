//! Encoders for raw property values, for building trees in code.

use edtlib_util::cells::cells_to_bytes;

pub fn empty() -> Vec<u8> {
    vec![]
}

pub fn cells(values: &[u32]) -> Vec<u8> {
    cells_to_bytes(values)
}

pub fn bytes(values: &[u8]) -> Vec<u8> {
    values.to_vec()
}

pub fn string(s: &str) -> Vec<u8> {
    strings(&[s])
}

pub fn strings(list: &[&str]) -> Vec<u8> {
    list.iter()
        .flat_map(|s| s.bytes().chain(std::iter::once(0)))
        .collect()
}
