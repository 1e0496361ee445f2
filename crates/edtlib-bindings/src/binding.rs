use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use phf::phf_map;
use serde_yaml::{Mapping, Value};

use crate::errors::{BindingError, BindingResult};

/// The kinds of property value a binding can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Boolean,
    Int,
    Array,
    Uint8Array,
    String,
    StringArray,
    /// A type name this library doesn't know how to decode.
    Unknown,
}

static PROPERTY_TYPES: phf::Map<&'static str, PropertyType> = phf_map! {
    "boolean" => PropertyType::Boolean,
    "int" => PropertyType::Int,
    "array" => PropertyType::Array,
    "uint8-array" => PropertyType::Uint8Array,
    "string" => PropertyType::String,
    "string-array" => PropertyType::StringArray,
};

impl PropertyType {
    pub fn from_name(name: &str) -> PropertyType {
        PROPERTY_TYPES
            .get(name)
            .copied()
            .unwrap_or(PropertyType::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    Required,
    Optional,
}

/// One entry of a binding's `properties:` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub ty: PropertyType,
    /// The type as spelled in the binding.
    pub type_name: String,
    pub category: Category,
    pub enum_values: Option<Vec<Value>>,
    pub generation: Option<String>,
    pub constraint: Option<String>,
    pub description: Option<String>,
}

impl PropertySpec {
    pub fn is_optional(&self) -> bool {
        self.category == Category::Optional
    }
}

/// A fully merged binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    path: PathBuf,
    title: Option<String>,
    version: Option<String>,
    description: Option<String>,
    properties: IndexMap<String, PropertySpec>,
    parent_bus: Option<String>,
    child_bus: Option<String>,
    cells: Option<Vec<String>>,
    raw: Mapping,
}

impl Binding {
    /// Decode a merged binding (see [`crate::merge::merge_binding`]).
    pub fn from_yaml(path: &Path, raw: Mapping) -> BindingResult<Binding> {
        let malformed = |what: &str| BindingError::Malformed {
            path: path.display().to_string(),
            what: what.into(),
        };

        let properties = match raw.get("properties") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Mapping(props)) => props
                .iter()
                .map(|(name, spec)| -> BindingResult<(String, PropertySpec)> {
                    let name = name
                        .as_str()
                        .ok_or_else(|| malformed("property names must be strings"))?;
                    Ok((name.to_string(), decode_property(path, name, spec)?))
                })
                .collect::<BindingResult<_>>()?,
            Some(_) => return Err(malformed("'properties' must be a mapping").into()),
        };

        let cells = match raw.get("#cells") {
            None => None,
            Some(Value::Sequence(names)) => Some(
                names
                    .iter()
                    .map(|n| scalar_string(n).ok_or_else(|| malformed("malformed #cells array")))
                    .collect::<Result<Vec<String>, _>>()?,
            ),
            Some(_) => return Err(malformed("malformed #cells array").into()),
        };

        Ok(Binding {
            path: path.to_path_buf(),
            title: raw.get("title").and_then(scalar_string),
            version: raw.get("version").and_then(scalar_string),
            description: raw.get("description").and_then(scalar_string),
            properties,
            parent_bus: bus(path, &raw, "parent")?,
            child_bus: bus(path, &raw, "child")?,
            cells,
            raw,
        })
    }

    /// The top-level file this binding was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn properties(&self) -> &IndexMap<String, PropertySpec> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    /// The bus a device with this binding sits on (`parent: bus:`).
    pub fn parent_bus(&self) -> Option<&str> {
        self.parent_bus.as_deref()
    }

    /// The bus a device with this binding provides to its children
    /// (`child: bus:`).
    pub fn child_bus(&self) -> Option<&str> {
        self.child_bus.as_deref()
    }

    /// Names for the cells of a specifier that targets this device, from
    /// `#cells`. Only controllers have these.
    pub fn cells(&self) -> Option<&[String]> {
        self.cells.as_deref()
    }

    /// The merged YAML, for keys this type doesn't model.
    pub fn raw(&self) -> &Mapping {
        &self.raw
    }
}

fn decode_property(path: &Path, name: &str, spec: &Value) -> BindingResult<PropertySpec> {
    let malformed = |what: String| BindingError::Malformed {
        path: path.display().to_string(),
        what,
    };

    let Value::Mapping(spec) = spec else {
        return Err(malformed(format!("property '{name}' must be a mapping")).into());
    };

    let type_name = match spec.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(_) => return Err(malformed(format!("'type' of '{name}' must be a string")).into()),
        None => {
            return Err(BindingError::MissingType {
                prop: name.into(),
                path: path.display().to_string(),
            }
            .into())
        }
    };

    let enum_values = match spec.get("enum") {
        None => None,
        Some(Value::Sequence(values)) => Some(values.clone()),
        Some(_) => return Err(malformed(format!("'enum' of '{name}' must be a list")).into()),
    };

    let category = match spec.get("category").and_then(Value::as_str) {
        Some("optional") => Category::Optional,
        _ => Category::Required,
    };

    Ok(PropertySpec {
        name: name.into(),
        ty: PropertyType::from_name(&type_name),
        type_name,
        category,
        enum_values,
        generation: spec.get("generation").and_then(scalar_string),
        constraint: spec.get("constraint").and_then(scalar_string),
        description: spec.get("description").and_then(scalar_string),
    })
}

fn bus(path: &Path, raw: &Mapping, key: &str) -> BindingResult<Option<String>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(m)) => match m.get("bus") {
            None => Ok(None),
            Some(Value::String(bus)) => Ok(Some(bus.clone())),
            Some(_) => Err(BindingError::Malformed {
                path: path.display().to_string(),
                what: format!("'{key}: bus' must be a string"),
            }
            .into()),
        },
        Some(_) => Err(BindingError::Malformed {
            path: path.display().to_string(),
            what: format!("'{key}' must be a mapping"),
        }
        .into()),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
