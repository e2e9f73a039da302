use alloc::string::String;
use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigErrorKind {
    #[error("Type id is empty")]
    EmptyTypeId,
    #[error("Config file not found: {}", path.display())]
    MissingFile { path: PathBuf },
    #[error("Failed to read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Failed to serialize config of {id}: {source}")]
    Marshal { id: String, source: serde_json::Error },
    #[error("Config provider failed: {0}")]
    Provider(#[source] anyhow::Error),
}
