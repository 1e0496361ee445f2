//! Inheritance merging for bindings.
//!
//! By the time a binding gets here its `!include`s have been expanded, which
//! leaves the contents of the included files as a list under `inherits:`.
//! The including file's own keys then override those of the files it
//! inherits from, which is why [`merge_props`] merges "into" the inherited
//! binding rather than the other way around.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::{BindingError, BindingResult};

/// Metadata keys every binding is expected to carry. Derived bindings
/// override them deliberately.
pub const METADATA_KEYS: [&str; 3] = ["title", "version", "description"];

/// Recursively fold `top` into the bindings listed in its `inherits:` key.
pub fn merge_binding(
    path: &Path,
    mut top: Mapping,
    diagnostics: &mut Diagnostics,
) -> BindingResult<Mapping> {
    check_expected_props(path, &top, diagnostics);

    let Some(inherits) = top.remove("inherits") else {
        return Ok(top);
    };

    for inherited in inherited_bindings(path, inherits)? {
        let mut inherited = merge_binding(path, inherited, diagnostics)?;
        merge_props(path, None, &mut inherited, &top, diagnostics);
        top = inherited;
    }

    Ok(top)
}

fn inherited_bindings(path: &Path, inherits: Value) -> BindingResult<Vec<Mapping>> {
    let malformed = || BindingError::Malformed {
        path: path.display().to_string(),
        what: "'inherits' must be a list of bindings".into(),
    };

    let Value::Sequence(entries) = inherits else {
        return Err(malformed().into());
    };

    let mut out = vec![];
    for entry in entries {
        match entry {
            Value::Mapping(m) => out.push(m),
            // `- !include foo.yaml` nests the included list one level deeper
            Value::Sequence(nested) => {
                for inner in nested {
                    match inner {
                        Value::Mapping(m) => out.push(m),
                        _ => return Err(malformed().into()),
                    }
                }
            }
            _ => return Err(malformed().into()),
        }
    }
    Ok(out)
}

fn check_expected_props(path: &Path, top: &Mapping, diagnostics: &mut Diagnostics) {
    for field in METADATA_KEYS {
        if !top.contains_key(field) {
            diagnostics.warn(Diagnostic::MissingMetadata {
                path: path.display().to_string(),
                field,
            });
        }
    }
}

/// Merge `from` into `to`. Nested mappings present on both sides are merged
/// key by key; anything else in `from` replaces the value in `to`.
pub fn merge_props(
    path: &Path,
    parent_prop: Option<&str>,
    to: &mut Mapping,
    from: &Mapping,
    diagnostics: &mut Diagnostics,
) {
    for (key, from_value) in from {
        if let (Value::Mapping(from_map), Some(Value::Mapping(to_map))) =
            (from_value, to.get_mut(key))
        {
            merge_props(path, key.as_str(), to_map, from_map, diagnostics);
            continue;
        }

        if let Some(old) = to.get(key) {
            if is_bad_overwrite(key, old, from_value) {
                diagnostics.warn(Diagnostic::SuspiciousOverwrite {
                    path: path.display().to_string(),
                    parent: parent_prop.unwrap_or("<top>").to_string(),
                    prop: render(key),
                    old: render(old),
                    new: render(from_value),
                });
            }
        }

        to.insert(key.clone(), from_value.clone());
    }
}

/// Whether replacing `old` with `new` under `key` looks unintended.
fn is_bad_overwrite(key: &Value, old: &Value, new: &Value) -> bool {
    if old == new {
        return false;
    }

    let Some(key) = key.as_str() else {
        return true;
    };

    if METADATA_KEYS.contains(&key) {
        return false;
    }

    // Tightening a property from optional to required is fine
    if key == "category" && old.as_str() == Some("optional") && new.as_str() == Some("required") {
        return false;
    }

    true
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".into(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    fn merge(to: &str, from: &str) -> (Mapping, Diagnostics) {
        let mut to = yaml(to);
        let mut diagnostics = Diagnostics::new();
        merge_props(
            Path::new("test.yaml"),
            None,
            &mut to,
            &yaml(from),
            &mut diagnostics,
        );
        (to, diagnostics)
    }

    #[test]
    fn nested_mappings_merge() {
        let (merged, diagnostics) = merge(
            "properties: {foo: {type: int}}",
            "properties: {bar: {type: string}}",
        );
        assert_eq!(
            merged,
            yaml("properties: {foo: {type: int}, bar: {type: string}}")
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn derived_value_wins_with_warning() {
        let (merged, diagnostics) = merge(
            "properties: {foo: {type: int}}",
            "properties: {foo: {type: string}}",
        );
        assert_eq!(merged, yaml("properties: {foo: {type: string}}"));
        assert_eq!(
            diagnostics.iter().cloned().collect::<Vec<_>>(),
            vec![Diagnostic::SuspiciousOverwrite {
                path: "test.yaml".into(),
                parent: "foo".into(),
                prop: "type".into(),
                old: "int".into(),
                new: "string".into(),
            }]
        );
    }

    #[test]
    fn exempt_overwrites() {
        let (merged, diagnostics) = merge(
            "{title: base, version: 1, description: d, p: {category: optional}}",
            "{title: derived, version: 2, description: e, p: {category: required}}",
        );
        assert_eq!(merged["title"], Value::from("derived"));
        assert_eq!(merged["p"]["category"], Value::from("required"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn required_to_optional_warns() {
        let (_, diagnostics) = merge("{category: required}", "{category: optional}");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn mapping_replaces_scalar() {
        let (merged, diagnostics) = merge("{child: none}", "{child: {bus: spi}}");
        assert_eq!(merged, yaml("{child: {bus: spi}}"));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn inherits_is_folded_in_order() {
        let top = yaml(
            r#"
title: derived
version: 1
description: derived binding
inherits:
  - {title: a, version: 1, description: a, properties: {a: {type: int}}}
  - {title: b, version: 1, description: b, properties: {b: {type: array}}}
properties:
  c: {type: boolean}
"#,
        );
        let mut diagnostics = Diagnostics::new();
        let merged = merge_binding(Path::new("d.yaml"), top, &mut diagnostics).unwrap();

        let props = merged["properties"].as_mapping().unwrap();
        let keys: Vec<_> = props.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(merged["title"], Value::from("derived"));
        assert!(!merged.contains_key("inherits"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn missing_metadata_is_reported() {
        let mut diagnostics = Diagnostics::new();
        merge_binding(Path::new("bare.yaml"), yaml("{title: t}"), &mut diagnostics).unwrap();
        let fields: Vec<_> = diagnostics
            .iter()
            .map(|d| match d {
                Diagnostic::MissingMetadata { field, .. } => *field,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(fields, vec!["version", "description"]);
    }

    #[test]
    fn malformed_inherits() {
        let mut diagnostics = Diagnostics::new();
        let err = merge_binding(
            Path::new("bad.yaml"),
            yaml("{inherits: nope}"),
            &mut diagnostics,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BindingError>(),
            Some(BindingError::Malformed { .. })
        ));
    }
}
