use std::fmt::{Display, Formatter};
use std::rc::Rc;

use derive_more::{Display as DeriveDisplay, From};
use edtlib_bindings::Binding;
use edtlib_tree::NodeId;
use fxhash::FxHashMap;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::props::Property;

/// Index of a device in its [`Edt`](crate::Edt). Devices are numbered in
/// device tree document order, so a parent always has a smaller id than its
/// children.
#[derive(Debug, DeriveDisplay, From, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("device#{_0}")]
pub struct DeviceId(pub usize);

/// One entry of a device's `reg` property, with the address translated to
/// the root address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub dev: DeviceId,
    /// From `reg-names`, when present.
    pub name: Option<String>,
    pub addr: u64,
    /// `None` when the parent declares `#size-cells = <0>`.
    pub size: Option<u64>,
}

impl Display for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Register")?;
        if let Some(name) = &self.name {
            write!(f, ", name: {name}")?;
        }
        write!(f, ", addr: 0x{:x}", self.addr)?;
        if let Some(size) = self.size {
            write!(f, ", size: 0x{size:x}")?;
        }
        write!(f, ">")
    }
}

/// An interrupt, resolved through any interrupt nexus down to the controller
/// that handles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupt {
    pub dev: DeviceId,
    /// From `interrupt-names`, when present.
    pub name: Option<String>,
    pub controller: DeviceId,
    /// Specifier cells named by the controller binding's `#cells`.
    pub specifier: IndexMap<String, u32>,
}

impl Display for Interrupt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Interrupt")?;
        if let Some(name) = &self.name {
            write!(f, ", name: {name}")?;
        }
        write!(
            f,
            ", target: {}, specifier: {{{}}}>",
            self.controller,
            self.specifier
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .join(", ")
        )
    }
}

/// A GPIO reference, resolved through any GPIO nexus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gpio {
    pub controller: DeviceId,
    pub cells: Vec<u32>,
}

impl Display for Gpio {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Gpio, controller: {}, cells: [{}]>",
            self.controller,
            self.cells.iter().join(", ")
        )
    }
}

/// A PWM reference from a `pwms` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pwm {
    pub dev: DeviceId,
    pub controller: DeviceId,
    /// Specifier cells named by the controller binding's `#cells`.
    pub specifier: IndexMap<String, u32>,
}

impl Display for Pwm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Pwm, target: {}, specifier: {{{}}}>",
            self.controller,
            self.specifier
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .join(", ")
        )
    }
}

/// A device tree node together with everything derived for it: its binding,
/// typed properties, registers, interrupts, GPIOs and PWMs.
///
/// Every node becomes a device, whether or not a binding matched it.
#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) node: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent: Option<DeviceId>,
    pub(crate) unit_addr: Option<u64>,
    pub(crate) label: Option<String>,
    pub(crate) aliases: Vec<String>,
    pub(crate) compats: Vec<String>,
    pub(crate) matching_compat: Option<String>,
    pub(crate) binding: Option<Rc<Binding>>,
    pub(crate) enabled: bool,
    pub(crate) read_only: bool,
    pub(crate) instance_no: FxHashMap<String, usize>,
    pub(crate) props: IndexMap<String, Property>,
    pub(crate) regs: Vec<Register>,
    pub(crate) interrupts: Vec<Interrupt>,
    pub(crate) gpios: IndexMap<String, Vec<Gpio>>,
    pub(crate) pwms: Vec<Pwm>,
}

impl Device {
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// The tree node this device was built from.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<DeviceId> {
        self.parent
    }

    /// The unit address from the node name, translated to the root address
    /// space.
    pub fn unit_addr(&self) -> Option<u64> {
        self.unit_addr
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn compats(&self) -> &[String] {
        &self.compats
    }

    /// The first entry of `compats` a binding was found for.
    pub fn matching_compat(&self) -> Option<&str> {
        self.matching_compat.as_deref()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_deref()
    }

    /// The bus this device sits on, from its binding's `parent: bus:`.
    pub fn bus(&self) -> Option<&str> {
        self.binding.as_ref().and_then(|b| b.parent_bus())
    }

    /// The bus this device provides to its children, from its binding's
    /// `child: bus:`.
    pub fn child_bus(&self) -> Option<&str> {
        self.binding.as_ref().and_then(|b| b.child_bus())
    }

    /// `false` only when `status = "disabled"`.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// For each compatible string, the number of enabled devices in the
    /// model that list it.
    pub fn instance_no(&self) -> &FxHashMap<String, usize> {
        &self.instance_no
    }

    pub fn props(&self) -> &IndexMap<String, Property> {
        &self.props
    }

    pub fn prop(&self, name: &str) -> Option<&Property> {
        self.props.get(name)
    }

    pub fn regs(&self) -> &[Register] {
        &self.regs
    }

    pub fn interrupts(&self) -> &[Interrupt] {
        &self.interrupts
    }

    /// GPIOs grouped by the prefix of their `*-gpios` property. The plain
    /// `gpios` property has the empty prefix.
    pub fn gpios(&self) -> &IndexMap<String, Vec<Gpio>> {
        &self.gpios
    }

    pub fn pwms(&self) -> &[Pwm] {
        &self.pwms
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Device {}", self.path)?;
        if let Some(binding) = &self.binding {
            write!(f, ", binding {}", binding.path().display())?;
        } else {
            write!(f, ", no binding")?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn display() {
        let reg = Register {
            dev: DeviceId(1),
            name: Some("ctrl".into()),
            addr: 0x4000,
            size: Some(0x100),
        };
        assert_eq!(reg.to_string(), "<Register, name: ctrl, addr: 0x4000, size: 0x100>");

        let reg = Register {
            name: None,
            size: None,
            ..reg
        };
        assert_eq!(reg.to_string(), "<Register, addr: 0x4000>");

        let specifier: IndexMap<String, u32> = hashmap! {"irq" => 5}
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let irq = Interrupt {
            dev: DeviceId(1),
            name: None,
            controller: DeviceId(0),
            specifier,
        };
        assert_eq!(irq.to_string(), "<Interrupt, target: device#0, specifier: {irq: 5}>");

        let gpio = Gpio {
            controller: DeviceId(2),
            cells: vec![3, 1],
        };
        assert_eq!(gpio.to_string(), "<Gpio, controller: device#2, cells: [3, 1]>");
    }
}
