use std::fmt::{Display, Formatter};

use edtlib_bindings::{Binding, Diagnostic, Diagnostics, PropertySpec, PropertyType};
use edtlib_tree::{Node, Property as RawProperty};
use edtlib_util::cells::cells_to_bytes;
use indexmap::IndexMap;
use itertools::Itertools;
use serde_yaml::Value;

use crate::errors::EdtError;
use crate::EdtResult;

/// A property value decoded according to the type its binding declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Bool(bool),
    Int(u32),
    Array(Vec<u32>),
    Uint8Array(Vec<u8>),
    String(String),
    StringArray(Vec<String>),
}

impl PropValue {
    /// Decode `raw` as `ty`. A missing property decodes only for booleans
    /// (as `false`); for every other type `None` is returned.
    pub(crate) fn decode(raw: Option<&RawProperty>, ty: PropertyType) -> EdtResult<Option<PropValue>> {
        if ty == PropertyType::Boolean {
            return Ok(Some(PropValue::Bool(raw.is_some())));
        }
        let Some(raw) = raw else {
            return Ok(None);
        };

        let value = match ty {
            PropertyType::Int => PropValue::Int(raw.to_num()?),
            PropertyType::Array => PropValue::Array(raw.to_nums()?),
            PropertyType::Uint8Array => PropValue::Uint8Array(raw.to_bytes().to_vec()),
            PropertyType::String => PropValue::String(raw.to_string()?),
            PropertyType::StringArray => PropValue::StringArray(raw.to_strings()?),
            PropertyType::Boolean | PropertyType::Unknown => return Ok(None),
        };
        Ok(Some(value))
    }

    pub fn ty(&self) -> PropertyType {
        match self {
            PropValue::Bool(_) => PropertyType::Boolean,
            PropValue::Int(_) => PropertyType::Int,
            PropValue::Array(_) => PropertyType::Array,
            PropValue::Uint8Array(_) => PropertyType::Uint8Array,
            PropValue::String(_) => PropertyType::String,
            PropValue::StringArray(_) => PropertyType::StringArray,
        }
    }

    /// The raw device tree encoding of this value. `Bool(false)` means the
    /// property is absent, so it has no encoding.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            PropValue::Bool(false) => return None,
            PropValue::Bool(true) => Vec::new(),
            PropValue::Int(n) => n.to_be_bytes().to_vec(),
            PropValue::Array(cells) => cells_to_bytes(cells),
            PropValue::Uint8Array(bytes) => bytes.clone(),
            PropValue::String(s) => nul_terminated([s]),
            PropValue::StringArray(list) => nul_terminated(list),
        };
        Some(bytes)
    }

    /// Whether this value equals an entry of a binding's `enum:` list.
    pub fn matches(&self, allowed: &Value) -> bool {
        match (self, allowed) {
            (PropValue::Bool(b), Value::Bool(a)) => b == a,
            (PropValue::Int(n), Value::Number(a)) => a.as_u64() == Some(u64::from(*n)),
            (PropValue::String(s), Value::String(a)) => s == a,
            (PropValue::Array(cells), Value::Sequence(a)) => {
                cells.len() == a.len()
                    && cells
                        .iter()
                        .zip(a)
                        .all(|(c, v)| v.as_u64() == Some(u64::from(*c)))
            }
            (PropValue::Uint8Array(bytes), Value::Sequence(a)) => {
                bytes.len() == a.len()
                    && bytes
                        .iter()
                        .zip(a)
                        .all(|(b, v)| v.as_u64() == Some(u64::from(*b)))
            }
            (PropValue::StringArray(list), Value::Sequence(a)) => {
                list.len() == a.len() && list.iter().zip(a).all(|(s, v)| v.as_str() == Some(s))
            }
            _ => false,
        }
    }
}

fn nul_terminated<S: AsRef<str>>(strings: impl IntoIterator<Item = S>) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        out.extend_from_slice(s.as_ref().as_bytes());
        out.push(0);
    }
    out
}

impl Display for PropValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(n) => write!(f, "{n}"),
            PropValue::Array(cells) => write!(f, "[{}]", cells.iter().join(", ")),
            PropValue::Uint8Array(bytes) => {
                write!(f, "[{}]", bytes.iter().map(|b| format!("{b:02x}")).join(" "))
            }
            PropValue::String(s) => write!(f, "{s:?}"),
            PropValue::StringArray(list) => {
                write!(f, "[{}]", list.iter().map(|s| format!("{s:?}")).join(", "))
            }
        }
    }
}

/// A typed property on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: PropValue,
    /// Position of `value` in the binding's `enum:` list, if it has one.
    pub enum_index: Option<usize>,
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Property, name: {}, value: {}>", self.name, self.value)
    }
}

/// Binding entries that describe tree structure rather than device
/// configuration, and so never become typed properties.
fn is_structural(name: &str) -> bool {
    name.starts_with('#')
        || name.ends_with("-map")
        || name.ends_with("-map-mask")
        || name.ends_with("-map-pass-thru")
}

/// Type every property the binding declares, in binding order.
pub(crate) fn typed_props(
    node: &Node,
    binding: Option<&Binding>,
    enabled: bool,
    diagnostics: &mut Diagnostics,
) -> EdtResult<IndexMap<String, Property>> {
    let mut props = IndexMap::new();
    let Some(binding) = binding else {
        return Ok(props);
    };

    for (name, spec) in binding.properties() {
        if is_structural(name) {
            continue;
        }
        if let Some(prop) = typed_prop(node, spec, enabled, diagnostics)? {
            props.insert(name.clone(), prop);
        }
    }

    Ok(props)
}

fn typed_prop(
    node: &Node,
    spec: &PropertySpec,
    enabled: bool,
    diagnostics: &mut Diagnostics,
) -> EdtResult<Option<Property>> {
    if spec.generation.is_none() {
        diagnostics.warn(Diagnostic::MissingGeneration {
            node: node.path().into(),
            prop: spec.name.clone(),
        });
    }

    if spec.ty == PropertyType::Unknown {
        diagnostics.warn(Diagnostic::UnknownPropertyType {
            node: node.path().into(),
            prop: spec.name.clone(),
            type_name: spec.type_name.clone(),
        });
        return Ok(None);
    }

    let raw = node.prop(&spec.name);
    let Some(value) = PropValue::decode(raw, spec.ty)? else {
        if enabled && !spec.is_optional() {
            diagnostics.warn(Diagnostic::MissingRequiredProperty {
                node: node.path().into(),
                prop: spec.name.clone(),
            });
        }
        return Ok(None);
    };

    let enum_index = match &spec.enum_values {
        Some(allowed) => Some(
            allowed
                .iter()
                .position(|a| value.matches(a))
                .ok_or_else(|| EdtError::EnumViolation {
                    prop: spec.name.clone(),
                    node: node.path().into(),
                    value: value.to_string(),
                    allowed: format!("[{}]", allowed.iter().map(render_yaml).join(", ")),
                })?,
        ),
        None => None,
    };

    Ok(Some(Property {
        name: spec.name.clone(),
        value,
        enum_index,
    }))
}

fn render_yaml(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{s:?}"),
        Value::Sequence(seq) => format!("[{}]", seq.iter().map(render_yaml).join(", ")),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use edtlib_tree::{value, Tree};
    use pretty_assertions::assert_eq;

    use super::*;

    fn raw(value: Vec<u8>) -> (Tree, edtlib_tree::NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let node = tree.add_node(root, "n").unwrap();
        tree.set_prop(node, "p", value).unwrap();
        (tree, node)
    }

    fn decode(value: Vec<u8>, ty: PropertyType) -> EdtResult<Option<PropValue>> {
        let (tree, node) = raw(value);
        PropValue::decode(tree.node(node).prop("p"), ty)
    }

    #[test]
    fn decode_each_type() {
        assert_eq!(
            decode(value::cells(&[7]), PropertyType::Int).unwrap(),
            Some(PropValue::Int(7))
        );
        assert_eq!(
            decode(value::cells(&[1, 2]), PropertyType::Array).unwrap(),
            Some(PropValue::Array(vec![1, 2]))
        );
        assert_eq!(
            decode(value::bytes(&[0xde, 0xad, 0xbe]), PropertyType::Uint8Array).unwrap(),
            Some(PropValue::Uint8Array(vec![0xde, 0xad, 0xbe]))
        );
        assert_eq!(
            decode(value::string("okay"), PropertyType::String).unwrap(),
            Some(PropValue::String("okay".into()))
        );
        assert_eq!(
            decode(value::strings(&["a", "b"]), PropertyType::StringArray).unwrap(),
            Some(PropValue::StringArray(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            decode(value::empty(), PropertyType::Boolean).unwrap(),
            Some(PropValue::Bool(true))
        );
    }

    #[test]
    fn missing_boolean_is_false() {
        assert_eq!(
            PropValue::decode(None, PropertyType::Boolean).unwrap(),
            Some(PropValue::Bool(false))
        );
        assert_eq!(PropValue::decode(None, PropertyType::Int).unwrap(), None);
    }

    #[test]
    fn int_must_be_one_cell() {
        assert!(decode(value::cells(&[1, 2]), PropertyType::Int).is_err());
    }

    #[test]
    fn to_bytes_matches_raw_encoding() {
        let cases = [
            (value::cells(&[0x1000]), PropertyType::Int),
            (value::cells(&[1, 2, 3]), PropertyType::Array),
            (value::bytes(&[1, 2, 3]), PropertyType::Uint8Array),
            (value::string("hello"), PropertyType::String),
            (value::strings(&["x", "yz"]), PropertyType::StringArray),
            (value::empty(), PropertyType::Boolean),
        ];

        for (bytes, ty) in cases {
            let decoded = decode(bytes.clone(), ty).unwrap().unwrap();
            assert_eq!(decoded.ty(), ty);
            assert_eq!(decoded.to_bytes(), Some(bytes));
        }
        assert_eq!(PropValue::Bool(false).to_bytes(), None);
    }

    #[test]
    fn enum_matching() {
        let allowed: Value = serde_yaml::from_str("[8, 16, \"x\"]").unwrap();
        let allowed = allowed.as_sequence().unwrap();

        assert!(PropValue::Int(16).matches(&allowed[1]));
        assert!(!PropValue::Int(16).matches(&allowed[0]));
        assert!(PropValue::String("x".into()).matches(&allowed[2]));
        assert!(!PropValue::String("8".into()).matches(&allowed[0]));
    }

    #[test]
    fn structural_names() {
        assert!(is_structural("#gpio-cells"));
        assert!(is_structural("interrupt-map"));
        assert!(is_structural("gpio-map-mask"));
        assert!(is_structural("gpio-map-pass-thru"));
        assert!(!is_structural("current-speed"));
        assert!(!is_structural("mapping"));
    }
}
