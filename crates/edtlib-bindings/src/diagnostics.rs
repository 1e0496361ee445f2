use derive_more::Display;

/// A problem worth reporting that does not stop the model from being built.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[display("'{path}' lacks '{field}' property")]
    MissingMetadata { path: String, field: &'static str },

    #[display(
        "{path} (in '{parent}'): '{prop}' from inherited binding overwritten ('{old}' replaced with '{new}')"
    )]
    SuspiciousOverwrite {
        path: String,
        parent: String,
        prop: String,
        old: String,
        new: String,
    },

    #[display("{prop} lacks 'generation' in binding for {node}")]
    MissingGeneration { node: String, prop: String },

    #[display("'{prop}' in binding for {node} has unknown type '{type_name}'")]
    UnknownPropertyType {
        node: String,
        prop: String,
        type_name: String,
    },

    #[display(
        "required property '{prop}' appears in 'properties' in binding for {node}, but not in its device tree node"
    )]
    MissingRequiredProperty { node: String, prop: String },

    #[display("unit-address (0x{unit_addr:x}) and first reg (0x{reg:x}) don't match for {node}")]
    UnitAddrMismatch { node: String, unit_addr: u64, reg: u64 },

    #[display("{node} has non-hex unit address, ignoring it")]
    NonHexUnitAddr { node: String },
}

/// Collected soft diagnostics. Each one is also logged when recorded.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.0.push(diagnostic);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move all of `other`'s diagnostics into `self` without logging them
    /// a second time.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
