use derive_more::{Display, From};
use fxhash::FxHashMap;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::errors::{TreeError, TreeResult};
use crate::prop::Property;

/// Index of a node in its [`Tree`].
#[derive(Debug, Display, From, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("node#{_0}")]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) props: IndexMap<String, Property>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node name, including any `@<unit-address>` part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The text after `@` in the node name, or `""` if there is none.
    pub fn unit_addr(&self) -> &str {
        self.name.split_once('@').map_or("", |(_, addr)| addr)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn props(&self) -> &IndexMap<String, Property> {
        &self.props
    }

    pub fn prop(&self, name: &str) -> Option<&Property> {
        self.props.get(name)
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    phandles: FxHashMap<u32, NodeId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding only the root node `/`.
    pub fn new() -> Self {
        Tree {
            nodes: vec![Node {
                id: NodeId(0),
                name: "/".into(),
                path: "/".into(),
                parent: None,
                children: vec![],
                props: IndexMap::new(),
            }],
            phandles: FxHashMap::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.node(id).parent.map(|p| self.node(p))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node<S: Into<String>>(&mut self, parent: NodeId, name: S) -> TreeResult<NodeId> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(TreeError::BadNodeName { name });
        }

        let parent_node = self.node(parent);
        let path = match parent_node.parent {
            None => format!("/{name}"),
            Some(_) => format!("{}/{name}", parent_node.path),
        };

        if parent_node
            .children
            .iter()
            .any(|&c| self.nodes[c.0].name == name)
        {
            return Err(TreeError::DuplicateNode { path });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            name,
            path,
            parent: Some(parent),
            children: vec![],
            props: IndexMap::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Convenience wrapper around [`Tree::add_node`] and [`Tree::set_prop`].
    pub fn add_node_with_props<'a, S, I>(
        &mut self,
        parent: NodeId,
        name: S,
        props: I,
    ) -> TreeResult<NodeId>
    where
        S: Into<String>,
        I: IntoIterator<Item = (&'a str, Vec<u8>)>,
    {
        let id = self.add_node(parent, name)?;
        for (prop, value) in props {
            self.set_prop(id, prop, value)?;
        }
        Ok(id)
    }

    /// Set (or replace) a property. A `phandle` property also registers the
    /// node in the phandle table.
    pub fn set_prop<S, V>(&mut self, node: NodeId, name: S, value: V) -> TreeResult<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let name = name.into();
        let prop = Property {
            name: name.clone(),
            node,
            node_path: self.node(node).path.clone(),
            value: value.into(),
        };

        if name == "phandle" {
            let phandle = prop.to_num()?;
            if let Some(&other) = self.phandles.get(&phandle) {
                if other != node {
                    return Err(TreeError::DuplicatePhandle {
                        phandle,
                        first: self.node(other).path.clone(),
                        second: self.node(node).path.clone(),
                    });
                }
            }
            self.phandles.insert(phandle, node);
        }

        self.nodes[node.0].props.insert(name, prop);
        Ok(())
    }

    /// Iterate over all nodes in document order. A node is always yielded
    /// before any of its descendants.
    pub fn node_iter(&self) -> NodeIter<'_> {
        NodeIter {
            tree: self,
            stack: vec![self.root()],
        }
    }

    pub fn phandle2node(&self, phandle: u32) -> Option<&Node> {
        self.phandles.get(&phandle).map(|&id| self.node(id))
    }

    /// Look up a node by absolute path (`/soc/uart@1000`) or by alias, with
    /// an optional path relative to the aliased node (`serial0/child`).
    pub fn get_node(&self, path: &str) -> TreeResult<&Node> {
        let (start, rest) = match path.strip_prefix('/') {
            Some(rest) => (self.node(self.root()), rest),
            None => {
                let (alias, rest) = path.split_once('/').unwrap_or((path, ""));
                let aliased = self
                    .alias_target(alias)?
                    .ok_or_else(|| TreeError::NoSuchAlias {
                        alias: alias.into(),
                    })?;
                (aliased, rest)
            }
        };

        self.walk(start, rest).ok_or_else(|| TreeError::NoSuchNode {
            path: path.into(),
        })
    }

    pub fn has_node(&self, path: &str) -> bool {
        self.get_node(path).is_ok()
    }

    fn walk<'t>(&'t self, start: &'t Node, relative: &str) -> Option<&'t Node> {
        relative
            .split('/')
            .filter(|component| !component.is_empty())
            .try_fold(start, |node, component| {
                node.children
                    .iter()
                    .map(|&c| self.node(c))
                    .find(|c| c.name == component)
            })
    }

    fn alias_target(&self, alias: &str) -> TreeResult<Option<&Node>> {
        let Some(aliases) = self.walk(self.node(self.root()), "aliases") else {
            return Ok(None);
        };
        let Some(prop) = aliases.prop(alias) else {
            return Ok(None);
        };

        let target = prop.to_string()?;
        if !target.starts_with('/') {
            return Err(TreeError::NoSuchNode { path: target });
        }
        match self.walk(self.node(self.root()), &target) {
            Some(node) => Ok(Some(node)),
            None => Err(TreeError::NoSuchNode { path: target }),
        }
    }

    /// The alias table built from the `/aliases` node, in declaration order.
    pub fn alias2node(&self) -> TreeResult<IndexMap<String, NodeId>> {
        let Some(aliases) = self.walk(self.node(self.root()), "aliases") else {
            return Ok(IndexMap::new());
        };

        aliases
            .props
            .keys()
            .map(|alias| {
                let node = self
                    .alias_target(alias)?
                    .ok_or_else(|| TreeError::NoSuchAlias {
                        alias: alias.clone(),
                    })?;
                Ok((alias.clone(), node.id))
            })
            .collect()
    }

    /// All aliases that refer to `node`.
    pub fn node_aliases(&self, node: NodeId) -> TreeResult<Vec<String>> {
        Ok(self
            .alias2node()?
            .into_iter()
            .filter(|(_, target)| *target == node)
            .map(|(alias, _)| alias)
            .collect_vec())
    }
}

/// Depth-first, pre-order traversal of a [`Tree`].
pub struct NodeIter<'t> {
    tree: &'t Tree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for NodeIter<'t> {
    type Item = &'t Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.tree.node(self.stack.pop()?);
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;
    use pretty_assertions::assert_eq;

    fn sample() -> Tree {
        let mut tree = Tree::new();
        let root = tree.root();
        let soc = tree.add_node(root, "soc").unwrap();
        let uart = tree.add_node(soc, "uart@4000").unwrap();
        tree.add_node(uart, "child").unwrap();
        tree.add_node(root, "leds").unwrap();
        tree.add_node_with_props(
            root,
            "aliases",
            [("serial0", value::string("/soc/uart@4000"))],
        )
        .unwrap();
        tree
    }

    #[test]
    fn document_order() {
        let tree = sample();
        let paths = tree.node_iter().map(|n| n.path()).collect_vec();
        assert_eq!(
            paths,
            vec![
                "/",
                "/soc",
                "/soc/uart@4000",
                "/soc/uart@4000/child",
                "/leds",
                "/aliases"
            ]
        );
    }

    #[test]
    fn lookup() {
        let tree = sample();
        assert_eq!(tree.get_node("/").unwrap().name(), "/");
        assert_eq!(tree.get_node("/soc/uart@4000").unwrap().unit_addr(), "4000");
        assert_eq!(tree.get_node("serial0").unwrap().path(), "/soc/uart@4000");
        assert_eq!(
            tree.get_node("serial0/child").unwrap().path(),
            "/soc/uart@4000/child"
        );
        assert!(matches!(
            tree.get_node("/soc/uart"),
            Err(TreeError::NoSuchNode { .. })
        ));
        assert!(matches!(
            tree.get_node("serial1"),
            Err(TreeError::NoSuchAlias { .. })
        ));
        assert!(!tree.has_node("/nope"));
    }

    #[test]
    fn aliases() {
        let tree = sample();
        let uart = tree.get_node("/soc/uart@4000").unwrap().id();
        assert_eq!(tree.node_aliases(uart).unwrap(), vec!["serial0"]);
        assert!(tree.node_aliases(tree.root()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_children() {
        let mut tree = Tree::new();
        tree.add_node(tree.root(), "a").unwrap();
        assert!(matches!(
            tree.add_node(tree.root(), "a"),
            Err(TreeError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn duplicate_phandles() {
        let mut tree = Tree::new();
        let a = tree.add_node(tree.root(), "a").unwrap();
        let b = tree.add_node(tree.root(), "b").unwrap();
        tree.set_prop(a, "phandle", value::cells(&[1])).unwrap();
        assert!(matches!(
            tree.set_prop(b, "phandle", value::cells(&[1])),
            Err(TreeError::DuplicatePhandle { phandle: 1, .. })
        ));
    }
}
