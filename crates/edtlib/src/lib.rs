//! A typed device model built from a device tree and YAML bindings.
//!
//! [`Edt`] turns every node of an [`edtlib_tree::Tree`] into a [`Device`].
//! For each node, the first of its `compatible` strings that has a binding
//! for the bus the node sits on selects the node's binding, which then drives
//! property typing. Independently of bindings, `reg` is translated to root
//! addresses through `ranges`, and interrupts, GPIOs and PWMs are resolved
//! through any `*-map` nexus nodes down to their controllers.
//!
//! ```no_run
//! use edtlib::Edt;
//! # fn tree() -> edtlib_tree::Tree { unimplemented!() }
//!
//! let edt = Edt::new(tree(), &["dts/bindings"])?;
//! for dev in edt.devices() {
//!     println!("{dev}");
//!     for reg in dev.regs() {
//!         println!("    {reg}");
//!     }
//! }
//! if let Some(flash) = edt.flash_dev() {
//!     println!("flash is {}", flash.path());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Failures that make the model meaningless (dangling phandles, malformed
//! property lengths, a missing `!include` target, ...) abort the build with an
//! error that can be downcast to [`EdtError`],
//! [`edtlib_bindings::BindingError`] or [`edtlib_tree::TreeError`]. Things
//! that are merely suspicious are collected in [`Edt::diagnostics`] and logged
//! with `tracing`.

pub mod address;
pub mod device;
pub mod edt;
pub mod errors;
mod nexus;
pub mod props;

pub use device::{Device, DeviceId, Gpio, Interrupt, Pwm, Register};
pub use edt::Edt;
pub use errors::EdtError;
pub use props::{PropValue, Property};

pub type EdtResult<T> = anyhow::Result<T>;
