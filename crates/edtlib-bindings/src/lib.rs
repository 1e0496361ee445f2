//! Device bindings: YAML documents describing what properties a node with a
//! given `compatible` string is expected to have.
//!
//! ## Loading
//! Binding directories are scanned for `*.yaml` files. Parsing every file
//! would be wasteful, so each file is first checked cheaply for the line
//! that names its compatible string:
//!
//! ```text
//! properties:
//!     compatible:
//!       constraint: "vnd,uart"
//! ```
//!
//! and only files whose compatible string appears in the device tree are
//! parsed.
//!
//! ## `!include` and `inherits`
//! A binding can pull in other binding files by basename:
//!
//! ```text
//! inherits:
//!     !include uart.yaml
//! ```
//!
//! The included file's contents end up as a list under `inherits:`, and are
//! then merged with the including file. Nested mappings are merged key by
//! key, and for everything else the including file wins. Overwriting a value
//! with a different one produces a [`Diagnostic::SuspiciousOverwrite`],
//! except for the `title`/`version`/`description` metadata and for promoting
//! `category: optional` to `category: required`.
//!
//! ## Lookup
//! Bindings are keyed by `(compatible, bus)`, where the bus comes from the
//! binding's own `parent: bus:` key. The same compatible string can have
//! different bindings on different buses.

pub mod binding;
pub mod diagnostics;
pub mod discover;
pub mod errors;
pub mod include;
pub mod merge;
pub mod store;

pub use binding::{Binding, Category, PropertySpec, PropertyType};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use errors::{BindingError, BindingResult};
pub use include::IncludeResolver;
pub use store::{BindingKey, BindingStore};
