pub mod bytes;
pub mod cells;
