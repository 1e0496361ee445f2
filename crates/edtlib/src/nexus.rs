//! Specifier resolution through `<prefix>-map` nexus nodes.
//!
//! A specifier is the list of cells that follows a phandle in properties like
//! `interrupts-extended`, `gpios` or `pwms`. When the node it is addressed to
//! carries a `<prefix>-map` table, the specifier is looked up in the table and
//! rewritten into the address space of the node the matching row points at.
//! That node can be a nexus in turn, so resolution repeats until a node
//! without a map is reached. The same algorithm serves interrupts, GPIOs and
//! PWMs; what differs is how many cells each node expects in its specifier.

use edtlib_tree::{Node, Property, Tree};
use edtlib_util::bytes;
use edtlib_util::cells::{format_cells, CELL_SIZE};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::address::{own_address_cells, raw_unit_addr, slice};
use crate::errors::EdtError;
use crate::EdtResult;

/// A specifier together with the node that finally interprets it.
pub(crate) type Resolved<'t> = (&'t Node, Vec<u8>);

/// Returns the number of specifier bytes a node expects.
type SpecLen<'f> = &'f dyn Fn(&Node) -> EdtResult<usize>;

fn cells(node: &Node, name: &str) -> EdtResult<usize> {
    match node.prop(name) {
        Some(prop) => Ok(prop.to_num()? as usize),
        None => Err(EdtError::MissingCells {
            node: node.path().into(),
            prop: name.into(),
        }
        .into()),
    }
}

pub(crate) fn interrupt_cells(node: &Node) -> EdtResult<usize> {
    cells(node, "#interrupt-cells")
}

pub(crate) fn gpio_cells(node: &Node) -> EdtResult<usize> {
    cells(node, "#gpio-cells")
}

pub(crate) fn pwm_cells(node: &Node) -> EdtResult<usize> {
    cells(node, "#pwm-cells")
}

/// Resolve `child_spec`, which `child` addresses to `parent`, through any
/// `<prefix>-map` nexus chain starting at `parent`.
pub(crate) fn map<'t>(
    tree: &'t Tree,
    prefix: &str,
    child: &Node,
    parent: &'t Node,
    child_spec: Vec<u8>,
    spec_len: SpecLen<'_>,
) -> EdtResult<Resolved<'t>> {
    let map_name = format!("{prefix}-map");
    let Some(map_prop) = parent.prop(&map_name) else {
        return Ok((parent, child_spec));
    };

    let masked = mask(prefix, parent, &child_spec);
    let truncated = |what: &'static str| EdtError::Truncated {
        prop: map_name.clone(),
        node: parent.path().into(),
        what,
    };

    let mut raw = map_prop.value();
    while !raw.is_empty() {
        if raw.len() < child_spec.len() {
            return Err(truncated("missing/truncated child specifier").into());
        }
        let (entry, rest) = raw.split_at(child_spec.len());

        if rest.len() < CELL_SIZE {
            return Err(truncated("missing/truncated phandle").into());
        }
        let (phandle, rest) = rest.split_at(CELL_SIZE);
        let phandle = u32::from_be_bytes([phandle[0], phandle[1], phandle[2], phandle[3]]);
        let map_parent = tree.phandle2node(phandle).ok_or_else(|| EdtError::BadPhandle {
            prop: map_name.clone(),
            node: parent.path().into(),
            phandle,
        })?;

        let parent_len = spec_len(map_parent)?;
        if rest.len() < parent_len {
            return Err(truncated("missing/truncated parent specifier").into());
        }
        let (parent_spec, rest) = rest.split_at(parent_len);
        raw = rest;

        if entry == masked.as_slice() {
            trace!(
                child = child.path(),
                "{} {} -> {} {}",
                parent.path(),
                format_cells(&child_spec),
                map_parent.path(),
                format_cells(parent_spec)
            );
            let parent_spec = pass_thru(prefix, parent, &child_spec, parent_spec);
            return map(tree, prefix, parent, map_parent, parent_spec, spec_len);
        }
    }

    Err(EdtError::NoMapMatch {
        child: child.path().into(),
        spec: format_cells(&child_spec),
        prop: map_name,
        node: parent.path().into(),
    }
    .into())
}

/// AND `child_spec` with the parent's `<prefix>-map-mask`, if it has one.
fn mask(prefix: &str, parent: &Node, child_spec: &[u8]) -> Vec<u8> {
    match parent.prop(&format!("{prefix}-map-mask")) {
        Some(mask) => bytes::and(child_spec, mask.value()),
        None => child_spec.to_vec(),
    }
}

/// Carry the bits selected by the parent's `<prefix>-map-pass-thru` over
/// from `child_spec` into `parent_spec`.
fn pass_thru(prefix: &str, parent: &Node, child_spec: &[u8], parent_spec: &[u8]) -> Vec<u8> {
    let Some(pass_thru) = parent.prop(&format!("{prefix}-map-pass-thru")) else {
        return parent_spec.to_vec();
    };
    let pass_thru = pass_thru.value();

    let res = bytes::or(
        &bytes::and(child_spec, pass_thru),
        &bytes::and(parent_spec, &bytes::not(pass_thru)),
    );
    bytes::truncate_left(&res, parent_spec.len()).to_vec()
}

/// Split a `<phandle> <cells...>` list, where the number of cells after each
/// phandle is given by `cells` applied to the node it refers to.
fn phandle_specifiers<'t, 'p>(
    tree: &'t Tree,
    node: &Node,
    prop: &'p Property,
    cells: fn(&Node) -> EdtResult<usize>,
) -> EdtResult<Vec<(&'t Node, &'p [u8])>> {
    let mut res = Vec::new();
    let mut raw = prop.value();

    while !raw.is_empty() {
        if raw.len() < CELL_SIZE {
            return Err(EdtError::Truncated {
                prop: prop.name().into(),
                node: node.path().into(),
                what: "missing/truncated phandle",
            }
            .into());
        }
        let (phandle, rest) = raw.split_at(CELL_SIZE);
        let phandle = u32::from_be_bytes([phandle[0], phandle[1], phandle[2], phandle[3]]);
        let controller = tree.phandle2node(phandle).ok_or_else(|| EdtError::BadPhandle {
            prop: prop.name().into(),
            node: node.path().into(),
            phandle,
        })?;

        let len = CELL_SIZE * cells(controller)?;
        if rest.len() < len {
            return Err(EdtError::Truncated {
                prop: prop.name().into(),
                node: node.path().into(),
                what: "missing data after phandle",
            }
            .into());
        }
        let (spec, rest) = rest.split_at(len);
        res.push((controller, spec));
        raw = rest;
    }

    Ok(res)
}

/// The node's interrupt parent: the target of the nearest `interrupt-parent`
/// on the node or its ancestors, unless an ancestor declaring
/// `#interrupt-cells` comes first.
pub(crate) fn interrupt_parent<'t>(tree: &'t Tree, node: &Node) -> EdtResult<&'t Node> {
    let mut cur = tree.node(node.id());
    loop {
        if let Some(prop) = cur.prop("interrupt-parent") {
            return Ok(prop.to_node(tree)?);
        }
        let parent = tree.parent(cur.id()).ok_or_else(|| EdtError::NoInterruptParent {
            node: node.path().into(),
        })?;
        if parent.has_prop("#interrupt-cells") {
            return Ok(parent);
        }
        cur = parent;
    }
}

/// The node's interrupts, each resolved to the controller that handles it.
///
/// `interrupts-extended` is used when present. Otherwise `interrupts` is
/// split according to the interrupt parent's `#interrupt-cells`.
pub(crate) fn interrupts<'t>(tree: &'t Tree, node: &Node) -> EdtResult<Vec<Resolved<'t>>> {
    if let Some(prop) = node.prop("interrupts-extended") {
        return phandle_specifiers(tree, node, prop, interrupt_cells)?
            .into_iter()
            .map(|(iparent, spec)| map_interrupt(tree, node, iparent, spec.to_vec()))
            .collect();
    }

    if node.has_prop("interrupts") {
        let iparent = interrupt_parent(tree, node)?;
        let len = CELL_SIZE * interrupt_cells(iparent)?;
        return slice(node, "interrupts", len)?
            .into_iter()
            .map(|spec| map_interrupt(tree, node, iparent, spec.to_vec()))
            .collect();
    }

    Ok(Vec::new())
}

fn map_interrupt<'t>(
    tree: &'t Tree,
    child: &Node,
    parent: &'t Node,
    child_spec: Vec<u8>,
) -> EdtResult<Resolved<'t>> {
    if parent.has_prop("interrupt-controller") {
        return Ok((parent, child_spec));
    }

    // Entries in interrupt-map are keyed on the child's unit address followed
    // by its interrupt specifier.
    let mut spec = raw_unit_addr(tree, child)?;
    spec.extend(child_spec);

    let spec_len = |node: &Node| -> EdtResult<usize> {
        Ok(CELL_SIZE * (own_address_cells(node)? + interrupt_cells(node)?))
    };
    let (controller, spec) = map(tree, "interrupt", child, parent, spec, &spec_len)?;

    let skip = CELL_SIZE * own_address_cells(controller)?;
    if spec.len() < skip {
        return Err(EdtError::Truncated {
            prop: "interrupt-map".into(),
            node: parent.path().into(),
            what: "missing/truncated parent unit address",
        }
        .into());
    }
    Ok((controller, spec[skip..].to_vec()))
}

/// The group name for a GPIO list property, or `None` if `name` isn't one.
/// `reset-gpios` is group `reset`, and plain `gpios` is group `""`.
/// `ngpios` is a line count, not a list.
pub(crate) fn gpio_prefix(name: &str) -> Option<&str> {
    if name.starts_with('#') || name == "ngpios" {
        return None;
    }
    let prefix = name.strip_suffix("gpios")?;
    Some(prefix.strip_suffix('-').unwrap_or(prefix))
}

/// All of the node's `*gpios` properties, grouped by prefix, each GPIO
/// resolved through any `gpio-map` nexus.
pub(crate) fn gpios<'t>(
    tree: &'t Tree,
    node: &Node,
) -> EdtResult<IndexMap<String, Vec<Resolved<'t>>>> {
    let spec_len = |node: &Node| -> EdtResult<usize> { Ok(CELL_SIZE * gpio_cells(node)?) };

    let mut res = IndexMap::new();
    for (name, prop) in node.props() {
        let Some(prefix) = gpio_prefix(name) else {
            continue;
        };
        let resolved = phandle_specifiers(tree, node, prop, gpio_cells)?
            .into_iter()
            .map(|(controller, spec)| map(tree, "gpio", node, controller, spec.to_vec(), &spec_len))
            .collect::<EdtResult<Vec<_>>>()?;
        debug!(node = node.path(), "{} GPIO(s) in '{name}'", resolved.len());
        res.insert(prefix.to_string(), resolved);
    }

    Ok(res)
}

/// The node's `pwms`, each resolved through any `pwm-map` nexus.
pub(crate) fn pwms<'t>(tree: &'t Tree, node: &Node) -> EdtResult<Vec<Resolved<'t>>> {
    let Some(prop) = node.prop("pwms") else {
        return Ok(Vec::new());
    };
    let spec_len = |node: &Node| -> EdtResult<usize> { Ok(CELL_SIZE * pwm_cells(node)?) };

    phandle_specifiers(tree, node, prop, pwm_cells)?
        .into_iter()
        .map(|(controller, spec)| map(tree, "pwm", node, controller, spec.to_vec(), &spec_len))
        .collect()
}
