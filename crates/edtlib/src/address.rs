//! Register parsing and bus address translation.
//!
//! A `reg` entry is `#address-cells` cells of address followed by
//! `#size-cells` cells of size, both counts taken from the node's parent.
//! Addresses are translated to the root address space by walking up through
//! `ranges` properties.

use edtlib_tree::{Node, Tree};
use edtlib_util::cells::{be_num, split_entries, to_be_cells, CELL_SIZE};
use tracing::trace;

use crate::device::{DeviceId, Register};
use crate::errors::EdtError;
use crate::EdtResult;

pub const DEFAULT_ADDRESS_CELLS: usize = 2;
pub const DEFAULT_SIZE_CELLS: usize = 1;

fn cells_prop(node: &Node, name: &str) -> EdtResult<Option<usize>> {
    match node.prop(name) {
        Some(prop) => Ok(Some(prop.to_num()? as usize)),
        None => Ok(None),
    }
}

/// The `#address-cells` that applies to `node`'s own `reg`, which is the
/// value declared on its parent.
pub(crate) fn address_cells(tree: &Tree, node: &Node) -> EdtResult<usize> {
    match tree.parent(node.id()) {
        Some(parent) => Ok(cells_prop(parent, "#address-cells")?.unwrap_or(DEFAULT_ADDRESS_CELLS)),
        None => Ok(DEFAULT_ADDRESS_CELLS),
    }
}

/// Like [`address_cells`], for `#size-cells`.
pub(crate) fn size_cells(tree: &Tree, node: &Node) -> EdtResult<usize> {
    match tree.parent(node.id()) {
        Some(parent) => Ok(cells_prop(parent, "#size-cells")?.unwrap_or(DEFAULT_SIZE_CELLS)),
        None => Ok(DEFAULT_SIZE_CELLS),
    }
}

/// The `#address-cells` declared on `node` itself. Used where a node acts as
/// a nexus or controller and its children's addresses are part of a
/// specifier.
pub(crate) fn own_address_cells(node: &Node) -> EdtResult<usize> {
    cells_prop(node, "#address-cells")?.ok_or_else(|| {
        EdtError::MissingCells {
            node: node.path().into(),
            prop: "#address-cells".into(),
        }
        .into()
    })
}

/// Split property `prop` of `node` into `size`-byte entries.
pub(crate) fn slice<'n>(node: &'n Node, prop: &str, size: usize) -> EdtResult<Vec<&'n [u8]>> {
    let value = node.prop(prop).map_or(&[][..], |p| p.value());
    split_entries(value, size).ok_or_else(|| {
        EdtError::BadLength {
            prop: prop.into(),
            node: node.path().into(),
            len: value.len(),
            size,
        }
        .into()
    })
}

fn num(node: &Node, prop: &str, bytes: &[u8]) -> EdtResult<u64> {
    be_num(bytes).ok_or_else(|| {
        EdtError::NumberTooWide {
            prop: prop.into(),
            node: node.path().into(),
        }
        .into()
    })
}

/// Translate `addr`, an address in `node`'s parent bus, to the root address
/// space.
///
/// Translation stops when the parent has no `ranges` at all. An empty
/// `ranges` maps the child bus one to one onto the parent's, so translation
/// carries on upward. Otherwise the first range whose closed interval
/// `[child_addr, child_addr + len]` covers `addr` rebases it; if none covers
/// it the address is left as is.
pub(crate) fn translate(tree: &Tree, addr: u64, node: &Node) -> EdtResult<u64> {
    let Some(parent) = tree.parent(node.id()) else {
        return Ok(addr);
    };
    let Some(ranges) = parent.prop("ranges") else {
        return Ok(addr);
    };
    if ranges.is_empty() {
        return translate(tree, addr, parent);
    }

    let child_address_cells = address_cells(tree, node)?;
    let parent_address_cells = address_cells(tree, parent)?;
    let child_size_cells = size_cells(tree, node)?;

    let entry_cells = child_address_cells + parent_address_cells + child_size_cells;
    for entry in slice(parent, "ranges", CELL_SIZE * entry_cells)? {
        let (child_addr, rest) = entry.split_at(CELL_SIZE * child_address_cells);
        let (parent_addr, child_len) = rest.split_at(CELL_SIZE * parent_address_cells);

        let child_addr = num(parent, "ranges", child_addr)?;
        let child_len = num(parent, "ranges", child_len)?;

        let end = child_addr.checked_add(child_len);
        if child_addr <= addr && end.map_or(true, |end| addr <= end) {
            let parent_addr = num(parent, "ranges", parent_addr)?;
            let rebased = parent_addr.wrapping_add(addr - child_addr);
            trace!(node = node.path(), "0x{addr:x} -> 0x{rebased:x} via {}", parent.path());
            return translate(tree, rebased, parent);
        }
    }

    Ok(addr)
}

/// Parse `reg` and `reg-names` into translated registers.
pub(crate) fn regs(tree: &Tree, node: &Node, dev: DeviceId) -> EdtResult<Vec<Register>> {
    if !node.has_prop("reg") {
        return Ok(Vec::new());
    }

    let address_cells = address_cells(tree, node)?;
    let size_cells = size_cells(tree, node)?;

    let mut regs = Vec::new();
    for entry in slice(node, "reg", CELL_SIZE * (address_cells + size_cells))? {
        let (addr, size) = entry.split_at(CELL_SIZE * address_cells);
        let addr = translate(tree, num(node, "reg", addr)?, node)?;
        let size = if size_cells == 0 {
            None
        } else {
            Some(num(node, "reg", size)?)
        };
        regs.push(Register {
            dev,
            name: None,
            addr,
            size,
        });
    }

    if let Some(names) = node.prop("reg-names") {
        let names = names.to_strings()?;
        if names.len() != regs.len() {
            return Err(EdtError::NameCountMismatch {
                prop: "reg-names".into(),
                node: node.path().into(),
                names: names.len(),
                count: regs.len(),
                what: "registers",
            }
            .into());
        }
        for (reg, name) in regs.iter_mut().zip(names) {
            reg.name = Some(name);
        }
    }

    Ok(regs)
}

/// The node's unit address (the hex number after `@`), translated to the
/// root address space. `None` if the name has no unit address.
pub(crate) fn unit_addr(tree: &Tree, node: &Node) -> EdtResult<Option<u64>> {
    let text = node.unit_addr();
    if text.is_empty() {
        return Ok(None);
    }
    let addr = parse_hex(node, text)?;
    Ok(Some(translate(tree, addr, node)?))
}

/// The untranslated unit address encoded as `#address-cells` cells, for use
/// as the leading part of an `interrupt-map` child specifier. An absent unit
/// address encodes as zero.
pub(crate) fn raw_unit_addr(tree: &Tree, node: &Node) -> EdtResult<Vec<u8>> {
    let text = node.unit_addr();
    let addr = if text.is_empty() {
        0
    } else {
        parse_hex(node, text)?
    };
    let cells = address_cells(tree, node)?;
    to_be_cells(addr, cells).ok_or_else(|| {
        EdtError::UnitAddrTooWide {
            node: node.path().into(),
            cells,
        }
        .into()
    })
}

fn parse_hex(node: &Node, text: &str) -> EdtResult<u64> {
    u64::from_str_radix(text, 16).map_err(|_| {
        EdtError::NonHexUnitAddr {
            node: node.path().into(),
        }
        .into()
    })
}
