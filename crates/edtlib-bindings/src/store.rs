use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use fxhash::FxHashMap;
use indexmap::IndexSet;
use serde_yaml::Value;
use tracing::debug;

use crate::binding::Binding;
use crate::diagnostics::Diagnostics;
use crate::discover::{binding_compat, find_bindings};
use crate::errors::{BindingError, BindingResult};
use crate::include::IncludeResolver;
use crate::merge::merge_binding;

/// `(compatible, bus)` lookup key. The bus is the one the binding says its
/// devices sit on, or `None` for bindings that don't name one.
pub type BindingKey = (String, Option<String>);

/// Merged bindings for the compatible strings a device tree actually uses.
#[derive(Debug, Default)]
pub struct BindingStore {
    files: Vec<PathBuf>,
    bindings: FxHashMap<BindingKey, Rc<Binding>>,
    diagnostics: Diagnostics,
}

impl BindingStore {
    /// Scan `dirs` for binding files and load those matching `used_compats`.
    pub fn load<P: AsRef<Path>>(dirs: &[P], used_compats: &IndexSet<String>) -> BindingResult<Self> {
        let mut files = vec![];
        for dir in dirs {
            files.extend(
                find_bindings(dir)
                    .with_context(|| format!("while scanning {}", dir.as_ref().display()))?,
            );
        }
        Self::from_files(files, used_compats)
    }

    /// Load the bindings among `files` that match `used_compats`. All of
    /// `files` take part in `!include` resolution.
    pub fn from_files(files: Vec<PathBuf>, used_compats: &IndexSet<String>) -> BindingResult<Self> {
        let mut bindings = FxHashMap::default();
        let mut diagnostics = Diagnostics::new();

        {
            let resolver = IncludeResolver::new(&files);

            for path in &files {
                // Cheap check first, so that only relevant files get parsed
                let Some(compat) = binding_compat(path)? else {
                    continue;
                };
                if !used_compats.contains(&compat) {
                    continue;
                }

                debug!("loading binding {} for '{compat}'", path.display());

                let binding = load_binding(&resolver, path, &mut diagnostics)
                    .with_context(|| format!("while loading binding {}", path.display()))?;
                let key = (compat, binding.parent_bus().map(String::from));
                if let Some(previous) = bindings.insert(key, Rc::new(binding)) {
                    debug!("{} replaces {}", path.display(), previous.path().display());
                }
            }
        }

        Ok(BindingStore {
            files,
            bindings,
            diagnostics,
        })
    }

    /// The binding for `compat` on `bus`, if one was loaded.
    pub fn get(&self, compat: &str, bus: Option<&str>) -> Option<&Rc<Binding>> {
        self.bindings
            .get(&(compat.to_string(), bus.map(String::from)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BindingKey, &Rc<Binding>)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Every binding file that was scanned.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

/// Load, `!include`-expand, merge and decode one top-level binding file.
pub fn load_binding(
    resolver: &IncludeResolver,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> BindingResult<Binding> {
    let Value::Mapping(top) = resolver.load(path)? else {
        return Err(BindingError::Malformed {
            path: path.display().to_string(),
            what: "top level must be a mapping".into(),
        }
        .into());
    };

    let merged = merge_binding(path, top, diagnostics)?;
    Binding::from_yaml(path, merged)
}
