use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("'{prop}' in {node} has length {len}, expected {expected}")]
    WrongLength {
        prop: String,
        node: String,
        len: usize,
        expected: usize,
    },

    #[error("'{prop}' in {node} has length {len}, which is not a multiple of 4")]
    NotCellAligned { prop: String, node: String, len: usize },

    #[error("'{prop}' in {node} is not a valid {expected}")]
    BadString {
        prop: String,
        node: String,
        expected: &'static str,
    },

    #[error("'{prop}' in {node} refers to phandle {phandle}, which no node has")]
    BadPhandle {
        prop: String,
        node: String,
        phandle: u32,
    },

    #[error("phandle {phandle} is used by both {first} and {second}")]
    DuplicatePhandle {
        phandle: u32,
        first: String,
        second: String,
    },

    #[error("no node with path '{path}'")]
    NoSuchNode { path: String },

    #[error("no alias '{alias}' in /aliases")]
    NoSuchAlias { alias: String },

    #[error("{path} already exists")]
    DuplicateNode { path: String },

    #[error("invalid node name '{name}'")]
    BadNodeName { name: String },
}

pub type TreeResult<T> = Result<T, TreeError>;
