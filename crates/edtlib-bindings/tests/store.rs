use std::collections::HashSet;
use std::path::PathBuf;

use edtlib_bindings::{BindingError, BindingStore, Category, Diagnostic, PropertyType};
use indexmap::IndexSet;
use maplit::hashset;
use pretty_assertions::assert_eq;

fn bindings_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/bindings")
}

fn load(compats: &[&str]) -> anyhow::Result<BindingStore> {
    let used: IndexSet<String> = compats.iter().map(|c| c.to_string()).collect();
    BindingStore::load(&[bindings_dir()], &used)
}

fn binding_error(err: &anyhow::Error) -> &BindingError {
    err.downcast_ref::<BindingError>()
        .unwrap_or_else(|| panic!("not a BindingError: {err:?}"))
}

#[test_log::test]
fn inherited_properties_merge_without_warnings() {
    let store = load(&["vnd,derived"]).unwrap();
    let binding = store.get("vnd,derived", None).unwrap();

    assert_eq!(binding.property("foo").unwrap().ty, PropertyType::Int);
    assert_eq!(binding.property("bar").unwrap().ty, PropertyType::String);
    assert_eq!(binding.title(), Some("Derived with bar"));
    assert!(store
        .diagnostics()
        .iter()
        .all(|d| !matches!(d, Diagnostic::SuspiciousOverwrite { .. })));
}

#[test]
fn include_merges_base_properties() {
    let store = load(&["vnd,serial"]).unwrap();
    let binding = store.get("vnd,serial", None).unwrap();

    let speed = binding.property("current-speed").unwrap();
    assert_eq!(speed.category, Category::Required);
    assert_eq!(speed.description.as_deref(), Some("Initial baud rate"));
    assert!(binding.property("label").is_some());
    assert!(binding.raw().get("inherits").is_none());
    assert!(store.diagnostics().is_empty());
}

#[test]
fn include_list() {
    let store = load(&["vnd,multi"]).unwrap();
    let binding = store.get("vnd,multi", None).unwrap();
    let names: HashSet<&str> = binding.properties().keys().map(String::as_str).collect();
    assert_eq!(names, hashset! {"label", "current-speed", "foo", "compatible"});
}

#[test]
fn only_used_compats_are_loaded() {
    // broken.yaml is not valid YAML, but nothing asks for 'vnd,unused'
    let store = load(&["vnd,serial", "vnd,not-in-any-binding"]).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.get("vnd,derived", None).is_none());
    assert!(store.files().len() > 10);
}

#[test]
fn unparsable_binding_is_an_error() {
    let err = load(&["vnd,unused"]).unwrap_err();
    assert!(matches!(binding_error(&err), BindingError::Yaml { .. }));
}

#[test]
fn bus_is_part_of_the_key() {
    let store = load(&["vnd,sensor"]).unwrap();
    assert_eq!(store.len(), 2);

    let spi = store.get("vnd,sensor", Some("spi")).unwrap();
    assert!(spi.property("spi-max-frequency").is_some());
    assert_eq!(
        store.get("vnd,sensor", Some("i2c")).unwrap().title(),
        Some("Sensor (I2C)")
    );
    assert!(store.get("vnd,sensor", None).is_none());
}

#[test]
fn ambiguous_include() {
    let err = load(&["vnd,ambiguous"]).unwrap_err();
    assert!(matches!(
        binding_error(&err),
        BindingError::IncludeAmbiguous { name, .. } if name == "dup.yaml"
    ));
}

#[test]
fn missing_include() {
    let err = load(&["vnd,missing"]).unwrap_err();
    assert!(matches!(
        binding_error(&err),
        BindingError::IncludeNotFound { name } if name == "nope.yaml"
    ));
}

#[test]
fn include_cycle() {
    let err = load(&["vnd,cycle"]).unwrap_err();
    assert!(matches!(binding_error(&err), BindingError::IncludeCycle { .. }));
}

#[test]
fn missing_metadata_is_not_fatal() {
    let store = load(&["vnd,bare"]).unwrap();
    assert!(store.get("vnd,bare", None).is_some());

    let missing: Vec<_> = store
        .diagnostics()
        .iter()
        .filter_map(|d| match d {
            Diagnostic::MissingMetadata { field, .. } => Some(*field),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec!["title", "version", "description"]);
}

#[test]
fn independent_stores() {
    // Each store resolves includes against its own file set
    let full = load(&["vnd,serial"]).unwrap();
    let only_top = BindingStore::from_files(
        vec![bindings_dir().join("serial.yaml")],
        &["vnd,serial".to_string()].into_iter().collect(),
    )
    .unwrap_err();

    assert!(full.get("vnd,serial", None).is_some());
    assert!(matches!(
        binding_error(&only_top),
        BindingError::IncludeNotFound { .. }
    ));
}
