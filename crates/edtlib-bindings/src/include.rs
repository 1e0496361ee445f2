use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use scopeguard::defer;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};

use crate::errors::{BindingError, BindingResult};

/// Resolves `!include` tags against one fixed set of binding files.
///
/// `!include foo.yaml` becomes a one-element list holding the parsed
/// contents of `foo.yaml`, and `!include [a.yaml, b.yaml]` a list with one
/// entry per file. Targets are looked up by basename, which must be unique
/// within the file set.
///
/// Every store builds its own resolver, so concurrent builds over different
/// binding directories never see each other's files.
#[derive(Debug)]
pub struct IncludeResolver<'a> {
    files: &'a [PathBuf],
    // Files currently being loaded, innermost last
    stack: RefCell<Vec<PathBuf>>,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(files: &'a [PathBuf]) -> Self {
        IncludeResolver {
            files,
            stack: RefCell::new(vec![]),
        }
    }

    /// Parse the YAML file at `path`, expanding any `!include`s in it.
    pub fn load(&self, path: &Path) -> BindingResult<Value> {
        if self.stack.borrow().iter().any(|p| p == path) {
            let chain = self
                .stack
                .borrow()
                .iter()
                .chain(std::iter::once(&path.to_path_buf()))
                .map(|p| p.display().to_string())
                .join(" -> ");
            return Err(BindingError::IncludeCycle { chain }.into());
        }

        let text = fs::read_to_string(path).map_err(|source| BindingError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&text).map_err(|source| BindingError::Yaml {
            path: path.display().to_string(),
            source,
        })?;

        self.stack.borrow_mut().push(path.to_path_buf());
        defer! {
            self.stack.borrow_mut().pop();
        }

        self.resolve(path, value)
    }

    /// The unique file in the set whose basename is `name`.
    pub fn find(&self, name: &str) -> BindingResult<&'a Path> {
        let candidates = self
            .files
            .iter()
            .filter(|p| p.file_name().is_some_and(|f| f == name))
            .collect_vec();

        match candidates.as_slice() {
            [] => Err(BindingError::IncludeNotFound { name: name.into() }.into()),
            [single] => Ok(single.as_path()),
            _ => Err(BindingError::IncludeAmbiguous {
                name: name.into(),
                candidates: candidates.iter().map(|p| p.display()).join(", "),
            }
            .into()),
        }
    }

    fn resolve(&self, path: &Path, value: Value) -> BindingResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) if is_include(&tagged) => self.include(path, tagged.value)?,
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                Value::Tagged(Box::new(TaggedValue {
                    tag,
                    value: self.resolve(path, value)?,
                }))
            }
            Value::Mapping(mapping) => Value::Mapping(
                mapping
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.resolve(path, v)?)))
                    .collect::<BindingResult<Mapping>>()?,
            ),
            Value::Sequence(seq) => Value::Sequence(
                seq.into_iter()
                    .map(|v| self.resolve(path, v))
                    .collect::<BindingResult<_>>()?,
            ),
            other => other,
        })
    }

    fn include(&self, path: &Path, target: Value) -> BindingResult<Value> {
        let names = match target {
            Value::String(name) => vec![name],
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| match v {
                    Value::String(name) => Ok(name),
                    _ => Err(bad_include(path)),
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(bad_include(path).into()),
        };

        names
            .iter()
            .map(|name| self.load(self.find(name)?))
            .collect::<BindingResult<Vec<_>>>()
            .map(Value::Sequence)
    }
}

fn is_include(tagged: &TaggedValue) -> bool {
    tagged.tag.to_string().trim_start_matches('!') == "include"
}

fn bad_include(path: &Path) -> BindingError {
    BindingError::BadInclude {
        path: path.display().to_string(),
    }
}
