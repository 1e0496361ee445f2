//! The raw device tree, as handed to the model builder.
//!
//! Nodes live in an arena owned by [`Tree`] and are addressed by [`NodeId`].
//! Property values are kept as raw bytes; the typed decoders on [`Property`]
//! (`to_num`, `to_strings`, `to_node`, ...) interpret them on demand.
//!
//! The tree is usually produced by a source parser. It can also be built
//! directly:
//!
//! ```
//! use edtlib_tree::{value, Tree};
//!
//! let mut tree = Tree::new();
//! let root = tree.root();
//! tree.set_prop(root, "#address-cells", value::cells(&[1])).unwrap();
//! let uart = tree.add_node(root, "uart@1000").unwrap();
//! tree.set_prop(uart, "compatible", value::strings(&["vnd,uart"])).unwrap();
//!
//! let node = tree.get_node("/uart@1000").unwrap();
//! assert_eq!(node.unit_addr(), "1000");
//! assert_eq!(node.prop("compatible").unwrap().to_strings().unwrap(), ["vnd,uart"]);
//! ```

pub mod errors;
pub mod node;
pub mod prop;
pub mod value;

pub use errors::{TreeError, TreeResult};
pub use node::{Node, NodeId, NodeIter, Tree};
pub use prop::Property;
