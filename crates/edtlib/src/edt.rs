use std::fmt::{Display, Formatter};
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use edtlib_bindings::{Binding, BindingStore, Diagnostic, Diagnostics};
use edtlib_tree::{Node, NodeId, Tree};
use edtlib_util::cells::be_cells;
use fxhash::FxHashMap;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::{debug, info};

use crate::address::{regs, unit_addr};
use crate::device::{Device, DeviceId, Gpio, Interrupt, Pwm};
use crate::errors::EdtError;
use crate::nexus;
use crate::props::typed_props;
use crate::EdtResult;

/// `/chosen` properties with a dedicated accessor on [`Edt`].
pub const CHOSEN_SRAM: &str = "zephyr,sram";
pub const CHOSEN_CCM: &str = "zephyr,ccm";
pub const CHOSEN_FLASH: &str = "zephyr,flash";

/// The extended device tree: every node of a [`Tree`] as a [`Device`], with
/// bindings applied and cross references resolved.
///
/// The model is built in one go by [`Edt::new`] or [`Edt::from_store`] and is
/// read-only afterwards.
#[derive(Debug)]
pub struct Edt {
    tree: Tree,
    bindings: BindingStore,
    /// Indexed by [`DeviceId`], in document order.
    devices: Vec<Device>,
    by_name: Vec<DeviceId>,
    node2dev: FxHashMap<NodeId, DeviceId>,
    sram_dev: Option<DeviceId>,
    ccm_dev: Option<DeviceId>,
    flash_dev: Option<DeviceId>,
    diagnostics: Diagnostics,
}

impl Edt {
    /// Build the model for `tree`, loading bindings from the YAML files under
    /// `binding_dirs`.
    pub fn new<P: AsRef<Path>>(tree: Tree, binding_dirs: &[P]) -> EdtResult<Edt> {
        let used = used_compats(&tree)?;
        let bindings =
            BindingStore::load(binding_dirs, &used).context("while loading bindings")?;
        Edt::from_store(tree, bindings)
    }

    /// Build the model for `tree` from already loaded bindings.
    pub fn from_store(tree: Tree, bindings: BindingStore) -> EdtResult<Edt> {
        let node2dev: FxHashMap<NodeId, DeviceId> = tree
            .node_iter()
            .enumerate()
            .map(|(i, node)| (node.id(), DeviceId(i)))
            .collect();

        let mut diagnostics = bindings.diagnostics().clone();
        let mut devices = {
            let mut builder = Builder {
                tree: &tree,
                bindings: &bindings,
                node2dev: &node2dev,
                aliases: aliases_by_node(&tree)?,
                devices: Vec::with_capacity(tree.len()),
                diagnostics: &mut diagnostics,
            };
            for node in tree.node_iter() {
                let dev = builder
                    .build(node)
                    .with_context(|| format!("while building device for {}", node.path()))?;
                builder.devices.push(dev);
            }
            builder.devices
        };
        assign_instance_nos(&mut devices);

        let by_name = devices
            .iter()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .map(|dev| dev.id)
            .collect();

        let mut edt = Edt {
            tree,
            bindings,
            devices,
            by_name,
            node2dev,
            sram_dev: None,
            ccm_dev: None,
            flash_dev: None,
            diagnostics,
        };
        edt.sram_dev = edt.chosen_dev(CHOSEN_SRAM)?.map(Device::id);
        edt.ccm_dev = edt.chosen_dev(CHOSEN_CCM)?.map(Device::id);
        edt.flash_dev = edt.chosen_dev(CHOSEN_FLASH)?.map(Device::id);

        info!("built {} devices", edt.devices.len());
        Ok(edt)
    }

    /// All devices, sorted by name.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.by_name.iter().map(|&id| self.device(id))
    }

    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id.0]
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The device at `path`, which is either absolute or starts with an alias.
    /// Fails with [`EdtError::NotFound`] if there is no such node.
    pub fn get_dev(&self, path: &str) -> EdtResult<&Device> {
        self.tree
            .get_node(path)
            .ok()
            .and_then(|node| self.node2dev.get(&node.id()))
            .map(|&id| self.device(id))
            .ok_or_else(|| EdtError::NotFound { path: path.into() }.into())
    }

    pub fn parent(&self, dev: &Device) -> Option<&Device> {
        dev.parent.map(|id| self.device(id))
    }

    /// The device `/chosen/<name>` points to, if that property exists.
    pub fn chosen_dev(&self, name: &str) -> EdtResult<Option<&Device>> {
        let Ok(chosen) = self.tree.get_node("/chosen") else {
            return Ok(None);
        };
        let Some(prop) = chosen.prop(name) else {
            return Ok(None);
        };

        let path = prop.to_string()?;
        let dev = self.get_dev(&path).map_err(|_| EdtError::ChosenNotFound {
            prop: format!("/chosen: {name}"),
            path: path.clone(),
        })?;
        Ok(Some(dev))
    }

    pub fn sram_dev(&self) -> Option<&Device> {
        self.sram_dev.map(|id| self.device(id))
    }

    pub fn ccm_dev(&self) -> Option<&Device> {
        self.ccm_dev.map(|id| self.device(id))
    }

    pub fn flash_dev(&self) -> Option<&Device> {
        self.flash_dev.map(|id| self.device(id))
    }

    /// For a device on an SPI bus, the GPIO its controller's `cs-gpios`
    /// assigns to it, selected by the device's first register address.
    pub fn spi_dev_cs_gpio(&self, dev: &Device) -> Option<&Gpio> {
        if dev.bus() != Some("spi") {
            return None;
        }
        let controller = self.parent(dev)?;
        let cs_gpios = controller.gpios().get("cs")?;
        let index = usize::try_from(dev.regs().first()?.addr).ok()?;
        cs_gpios.get(index)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    /// Everything worth a warning that came up while loading bindings and
    /// building devices.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

impl Display for Edt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<EDT, {} devices>", self.devices.len())
    }
}

/// Every compatible string that appears somewhere in `tree`.
fn used_compats(tree: &Tree) -> EdtResult<IndexSet<String>> {
    let mut used = IndexSet::new();
    for node in tree.node_iter() {
        if let Some(compatible) = node.prop("compatible") {
            used.extend(compatible.to_strings()?);
        }
    }
    Ok(used)
}

fn aliases_by_node(tree: &Tree) -> EdtResult<FxHashMap<NodeId, Vec<String>>> {
    let mut res: FxHashMap<NodeId, Vec<String>> = FxHashMap::default();
    for (alias, node) in tree.alias2node()? {
        res.entry(node).or_default().push(alias);
    }
    Ok(res)
}

/// Record, for each compatible string on a device, how many enabled devices
/// list that string.
fn assign_instance_nos(devices: &mut [Device]) {
    let counts: FxHashMap<String, usize> = devices
        .iter()
        .filter(|dev| dev.enabled)
        .flat_map(|dev| dev.compats.iter().unique().cloned())
        .counts()
        .into_iter()
        .collect();

    for dev in devices {
        dev.instance_no = dev
            .compats
            .iter()
            .map(|compat| (compat.clone(), counts.get(compat).copied().unwrap_or(0)))
            .collect();
    }
}

struct Builder<'a> {
    tree: &'a Tree,
    bindings: &'a BindingStore,
    node2dev: &'a FxHashMap<NodeId, DeviceId>,
    aliases: FxHashMap<NodeId, Vec<String>>,
    /// Devices built so far. Parents are always among them.
    devices: Vec<Device>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Builder<'a> {
    fn dev_id(&self, node: &Node) -> DeviceId {
        self.node2dev[&node.id()]
    }

    /// The already built device for `node`, if it has been reached yet.
    fn built(&self, node: &Node) -> Option<&Device> {
        self.devices.get(self.dev_id(node).0)
    }

    /// The matching compatible and binding for `node`, given the bus its
    /// parent provides.
    fn match_binding(
        &self,
        node: &Node,
        bus: Option<&str>,
    ) -> EdtResult<Option<(String, Rc<Binding>)>> {
        let Some(compatible) = node.prop("compatible") else {
            return Ok(None);
        };
        Ok(compatible
            .to_strings()?
            .into_iter()
            .find_map(|compat| {
                let binding = self.bindings.get(&compat, bus)?.clone();
                Some((compat, binding))
            }))
    }

    /// The binding of an arbitrary node. Controllers referenced by phandle
    /// can come later in the tree than the device referring to them, so this
    /// works out the binding from the parent chain when the node hasn't been
    /// built yet.
    fn binding_of(&self, node: &Node) -> EdtResult<Option<Rc<Binding>>> {
        if let Some(dev) = self.built(node) {
            return Ok(dev.binding.clone());
        }
        let parent_binding = match self.tree.parent(node.id()) {
            Some(parent) => self.binding_of(parent)?,
            None => None,
        };
        let bus = parent_binding.as_deref().and_then(Binding::child_bus);
        Ok(self.match_binding(node, bus)?.map(|(_, binding)| binding))
    }

    fn build(&mut self, node: &Node) -> EdtResult<Device> {
        let id = self.dev_id(node);
        let parent = self.tree.parent(node.id()).map(|p| self.dev_id(p));
        debug_assert!(parent.map_or(true, |p| p < id));

        let compats = match node.prop("compatible") {
            Some(prop) => prop.to_strings()?,
            None => Vec::new(),
        };
        let bus = parent
            .map(|p| &self.devices[p.0])
            .and_then(|p| p.child_bus())
            .map(String::from);
        let (matching_compat, binding) = match self.match_binding(node, bus.as_deref())? {
            Some((compat, binding)) => (Some(compat), Some(binding)),
            None => (None, None),
        };

        let enabled = match node.prop("status") {
            Some(status) => status.to_string()? != "disabled",
            None => true,
        };
        let label = node.prop("label").map(|p| p.to_string()).transpose()?;

        let props = typed_props(node, binding.as_deref(), enabled, self.diagnostics)?;
        let regs = regs(self.tree, node, id)?;
        let unit_addr = match unit_addr(self.tree, node) {
            Ok(addr) => addr,
            Err(err)
                if matches!(
                    err.downcast_ref::<EdtError>(),
                    Some(EdtError::NonHexUnitAddr { .. })
                ) =>
            {
                self.diagnostics.warn(Diagnostic::NonHexUnitAddr {
                    node: node.path().into(),
                });
                None
            }
            Err(err) => return Err(err),
        };
        if let (Some(unit_addr), Some(reg)) = (unit_addr, regs.first()) {
            if unit_addr != reg.addr {
                self.diagnostics.warn(Diagnostic::UnitAddrMismatch {
                    node: node.path().into(),
                    unit_addr,
                    reg: reg.addr,
                });
            }
        }

        let interrupts = self.interrupts(node, id)?;
        let gpios = self.gpios(node)?;
        let pwms = self.pwms(node, id)?;

        match &binding {
            Some(binding) => debug!(
                "{}: '{}' bound to {}",
                node.path(),
                matching_compat.as_deref().unwrap_or_default(),
                binding.path().display()
            ),
            None if !compats.is_empty() => debug!("{}: no binding for {compats:?}", node.path()),
            None => {}
        }

        Ok(Device {
            id,
            node: node.id(),
            name: node.name().into(),
            path: node.path().into(),
            parent,
            unit_addr,
            label,
            aliases: self.aliases.get(&node.id()).cloned().unwrap_or_default(),
            compats,
            matching_compat,
            binding,
            enabled,
            read_only: node.has_prop("read-only"),
            instance_no: FxHashMap::default(),
            props,
            regs,
            interrupts,
            gpios,
            pwms,
        })
    }

    /// Name the cells of a specifier handled by `controller` after the
    /// controller binding's `#cells`.
    fn named_cells(
        &self,
        what: &'static str,
        node: &Node,
        controller: &Node,
        spec: &[u8],
    ) -> EdtResult<IndexMap<String, u32>> {
        let binding =
            self.binding_of(controller)?
                .ok_or_else(|| EdtError::ControllerLacksBinding {
                    what,
                    controller: controller.path().into(),
                    node: node.path().into(),
                })?;
        let names = binding.cells().ok_or_else(|| EdtError::MissingCellNames {
            what,
            controller: controller.path().into(),
        })?;

        let cells = spec_cells(node, what, spec)?;
        if cells.len() != names.len() {
            return Err(EdtError::CellCountMismatch {
                controller: controller.path().into(),
                got: cells.len(),
                expected: names.len(),
            }
            .into());
        }
        Ok(names.iter().cloned().zip(cells).collect())
    }

    fn interrupts(&self, node: &Node, id: DeviceId) -> EdtResult<Vec<Interrupt>> {
        let mut interrupts = nexus::interrupts(self.tree, node)?
            .into_iter()
            .map(|(controller, spec)| {
                Ok(Interrupt {
                    dev: id,
                    name: None,
                    controller: self.dev_id(controller),
                    specifier: self.named_cells("interrupt", node, controller, &spec)?,
                })
            })
            .collect::<EdtResult<Vec<_>>>()?;

        if let Some(names) = node.prop("interrupt-names") {
            let names = names.to_strings()?;
            if names.len() != interrupts.len() {
                return Err(EdtError::NameCountMismatch {
                    prop: "interrupt-names".into(),
                    node: node.path().into(),
                    names: names.len(),
                    count: interrupts.len(),
                    what: "interrupts",
                }
                .into());
            }
            for (interrupt, name) in interrupts.iter_mut().zip(names) {
                interrupt.name = Some(name);
            }
        }

        Ok(interrupts)
    }

    fn gpios(&self, node: &Node) -> EdtResult<IndexMap<String, Vec<Gpio>>> {
        nexus::gpios(self.tree, node)?
            .into_iter()
            .map(|(prefix, resolved)| {
                let gpios = resolved
                    .into_iter()
                    .map(|(controller, spec)| {
                        Ok(Gpio {
                            controller: self.dev_id(controller),
                            cells: spec_cells(node, "gpio", &spec)?,
                        })
                    })
                    .collect::<EdtResult<Vec<_>>>()?;
                Ok((prefix, gpios))
            })
            .collect()
    }

    fn pwms(&self, node: &Node, id: DeviceId) -> EdtResult<Vec<Pwm>> {
        nexus::pwms(self.tree, node)?
            .into_iter()
            .map(|(controller, spec)| {
                Ok(Pwm {
                    dev: id,
                    controller: self.dev_id(controller),
                    specifier: self.named_cells("PWM", node, controller, &spec)?,
                })
            })
            .collect()
    }
}

fn spec_cells(node: &Node, what: &'static str, spec: &[u8]) -> EdtResult<Vec<u32>> {
    be_cells(spec).ok_or_else(|| {
        EdtError::Truncated {
            prop: what.into(),
            node: node.path().into(),
            what: "specifier is not a whole number of cells",
        }
        .into()
    })
}
