use std::fmt::{Debug, Formatter};

use edtlib_util::cells::{be_cells, format_cells, CELL_SIZE};

use crate::errors::{TreeError, TreeResult};
use crate::node::{Node, NodeId, Tree};

/// A property on a node: a name and a raw big-endian byte value.
#[derive(Clone, PartialEq, Eq)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) node: NodeId,
    pub(crate) node_path: String,
    pub(crate) value: Vec<u8>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node carrying this property.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Interpret the value as a single cell.
    pub fn to_num(&self) -> TreeResult<u32> {
        if self.value.len() != CELL_SIZE {
            return Err(TreeError::WrongLength {
                prop: self.name.clone(),
                node: self.node_path.clone(),
                len: self.value.len(),
                expected: CELL_SIZE,
            });
        }
        Ok(u32::from_be_bytes([
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
        ]))
    }

    /// Interpret the value as a list of cells.
    pub fn to_nums(&self) -> TreeResult<Vec<u32>> {
        be_cells(&self.value).ok_or_else(|| TreeError::NotCellAligned {
            prop: self.name.clone(),
            node: self.node_path.clone(),
            len: self.value.len(),
        })
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Interpret the value as exactly one NUL-terminated string.
    pub fn to_string(&self) -> TreeResult<String> {
        match self.to_strings_inner()?.as_slice() {
            [single] => Ok(single.clone()),
            _ => Err(self.bad_string("string")),
        }
    }

    /// Interpret the value as a list of NUL-terminated strings.
    pub fn to_strings(&self) -> TreeResult<Vec<String>> {
        self.to_strings_inner()
    }

    fn to_strings_inner(&self) -> TreeResult<Vec<String>> {
        let Some(body) = self.value.strip_suffix(&[0]) else {
            return Err(self.bad_string("string list"));
        };

        body.split(|&b| b == 0)
            .map(|s| {
                std::str::from_utf8(s)
                    .map(String::from)
                    .map_err(|_| self.bad_string("UTF-8 string"))
            })
            .collect()
    }

    /// Interpret the value as a phandle and look up the node it refers to.
    pub fn to_node<'t>(&self, tree: &'t Tree) -> TreeResult<&'t Node> {
        let phandle = self.to_num()?;
        self.lookup_phandle(tree, phandle)
    }

    /// Interpret the value as a list of phandles.
    pub fn to_nodes<'t>(&self, tree: &'t Tree) -> TreeResult<Vec<&'t Node>> {
        self.to_nums()?
            .into_iter()
            .map(|phandle| self.lookup_phandle(tree, phandle))
            .collect()
    }

    fn lookup_phandle<'t>(&self, tree: &'t Tree, phandle: u32) -> TreeResult<&'t Node> {
        tree.phandle2node(phandle).ok_or_else(|| TreeError::BadPhandle {
            prop: self.name.clone(),
            node: self.node_path.clone(),
            phandle,
        })
    }

    fn bad_string(&self, expected: &'static str) -> TreeError {
        TreeError::BadString {
            prop: self.name.clone(),
            node: self.node_path.clone(),
            expected,
        }
    }
}

impl Debug for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Property '{}' at '{}': {}>",
            self.name,
            self.node_path,
            format_cells(&self.value)
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::value;
    use crate::{Tree, TreeError};
    use pretty_assertions::assert_eq;

    fn tree_with(name: &str, raw: Vec<u8>) -> Tree {
        let mut tree = Tree::new();
        let n = tree.add_node(tree.root(), "n").unwrap();
        tree.set_prop(n, name, raw).unwrap();
        tree
    }

    #[test]
    fn numbers() {
        let tree = tree_with("p", value::cells(&[1, 2]));
        let prop = tree.get_node("/n").unwrap().prop("p").unwrap();
        assert_eq!(prop.to_nums().unwrap(), vec![1, 2]);
        assert!(matches!(
            prop.to_num(),
            Err(TreeError::WrongLength { len: 8, .. })
        ));
    }

    #[test]
    fn unaligned_numbers() {
        let tree = tree_with("p", vec![0, 1, 2]);
        let prop = tree.get_node("/n").unwrap().prop("p").unwrap();
        assert!(matches!(
            prop.to_nums(),
            Err(TreeError::NotCellAligned { len: 3, .. })
        ));
    }

    #[test]
    fn strings() {
        let tree = tree_with("p", value::strings(&["a", "bc"]));
        let prop = tree.get_node("/n").unwrap().prop("p").unwrap();
        assert_eq!(prop.to_strings().unwrap(), vec!["a", "bc"]);
        assert!(prop.to_string().is_err());

        let tree = tree_with("p", value::string("okay"));
        let prop = tree.get_node("/n").unwrap().prop("p").unwrap();
        assert_eq!(prop.to_string().unwrap(), "okay");
    }

    #[test]
    fn unterminated_string() {
        let tree = tree_with("p", b"oops".to_vec());
        let prop = tree.get_node("/n").unwrap().prop("p").unwrap();
        assert!(matches!(prop.to_string(), Err(TreeError::BadString { .. })));
    }

    #[test]
    fn phandles() {
        let mut tree = Tree::new();
        let target = tree.add_node(tree.root(), "intc").unwrap();
        tree.set_prop(target, "phandle", value::cells(&[7])).unwrap();
        let user = tree.add_node(tree.root(), "user").unwrap();
        tree.set_prop(user, "good", value::cells(&[7])).unwrap();
        tree.set_prop(user, "bad", value::cells(&[8])).unwrap();

        let user = tree.node(user);
        assert_eq!(user.prop("good").unwrap().to_node(&tree).unwrap().id(), target);
        assert!(matches!(
            user.prop("bad").unwrap().to_node(&tree),
            Err(TreeError::BadPhandle { phandle: 8, .. })
        ));
    }
}
