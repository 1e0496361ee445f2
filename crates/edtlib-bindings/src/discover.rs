use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{BindingError, BindingResult};

static CONSTRAINT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s+constraint:\s*"([^"]*)""#).unwrap());

/// Recursively collect every `*.yaml` file below `dir`, sorted by path.
pub fn find_bindings<P: AsRef<Path>>(dir: P) -> BindingResult<Vec<PathBuf>> {
    let mut found = vec![];
    walk(dir.as_ref(), &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> BindingResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| BindingError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let path = entry
            .with_context(|| format!("unable to list {}", dir.display()))?
            .path();

        if path.is_dir() {
            walk(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "yaml") {
            found.push(path);
        }
    }

    Ok(())
}

/// Extract the compatible string a binding file matches on, without parsing
/// the file: the first line of the form `    constraint: "<compat>"`.
pub fn binding_compat<P: AsRef<Path>>(path: P) -> BindingResult<Option<String>> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| BindingError::Io {
        path: path.display().to_string(),
        source,
    })?;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| BindingError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if let Some(captures) = CONSTRAINT_REGEX.captures(&line) {
            return Ok(Some(captures[1].to_string()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_line() {
        assert_eq!(
            CONSTRAINT_REGEX
                .captures(r#"      constraint: "nordic,nrf-uart""#)
                .map(|c| c[1].to_string()),
            Some("nordic,nrf-uart".into())
        );

        // Must be indented, i.e. nested under a property
        assert!(CONSTRAINT_REGEX
            .captures(r#"constraint: "top-level""#)
            .is_none());
    }
}
