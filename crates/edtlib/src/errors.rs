use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EdtError {
    #[error("no node or alias '{path}'")]
    NotFound { path: String },

    #[error("{prop} points to {path}, which does not exist")]
    ChosenNotFound { prop: String, path: String },

    #[error("'{prop}' property in {node} has length {len}, which is not evenly divisible by {size}")]
    BadLength {
        prop: String,
        node: String,
        len: usize,
        size: usize,
    },

    #[error("'{prop}' property in {node} has {names} strings, but there are {count} {what}")]
    NameCountMismatch {
        prop: String,
        node: String,
        names: usize,
        count: usize,
        what: &'static str,
    },

    #[error("{node} lacks {prop}")]
    MissingCells { node: String, prop: String },

    #[error("{node} has non-hex unit address")]
    NonHexUnitAddr { node: String },

    #[error("unit address of {node} does not fit in {cells} cells")]
    UnitAddrTooWide { node: String, cells: usize },

    #[error("'{prop}' in {node} holds a number wider than 64 bits")]
    NumberTooWide { prop: String, node: String },

    #[error("bad value for '{prop}' in {node}: {what}")]
    Truncated {
        prop: String,
        node: String,
        what: &'static str,
    },

    #[error("bad phandle {phandle} in '{prop}' in {node}")]
    BadPhandle {
        prop: String,
        node: String,
        phandle: u32,
    },

    #[error("child specifier for {child} ({spec}) does not appear in '{prop}' in {node}")]
    NoMapMatch {
        child: String,
        spec: String,
        prop: String,
        node: String,
    },

    #[error("{what} controller {controller} for {node} lacks binding")]
    ControllerLacksBinding {
        what: &'static str,
        controller: String,
        node: String,
    },

    #[error("binding for {what} controller {controller} has no #cells array")]
    MissingCellNames {
        what: &'static str,
        controller: String,
    },

    #[error("unexpected #cells length in binding for {controller}, {got} instead of {expected}")]
    CellCountMismatch {
        controller: String,
        got: usize,
        expected: usize,
    },

    #[error("value ({value}) for property ({prop}) is not in enumerated list {allowed} for node {node}")]
    EnumViolation {
        prop: String,
        node: String,
        value: String,
        allowed: String,
    },

    #[error("no interrupt parent found for {node}")]
    NoInterruptParent { node: String },
}
