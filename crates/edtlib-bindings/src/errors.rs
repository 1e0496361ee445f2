use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("unable to read {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to parse {path}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("'{name}' not found in !include")]
    IncludeNotFound { name: String },

    #[error("multiple candidates for '{name}' in !include: {candidates}")]
    IncludeAmbiguous { name: String, candidates: String },

    #[error("unrecognised node type in !include statement in {path}")]
    BadInclude { path: String },

    #[error("!include cycle: {chain}")]
    IncludeCycle { chain: String },

    #[error("'{prop}' lacks 'type' in binding {path}")]
    MissingType { prop: String, path: String },

    #[error("malformed binding {path}: {what}")]
    Malformed { path: String, what: String },
}

pub type BindingResult<T> = anyhow::Result<T>;
