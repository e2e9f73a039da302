use alloc::string::String;

use super::{config::ConfigErrorKind, registry::RegistryErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("No factory for type {type_id}")]
    NoFactory { type_id: String },
    #[error(transparent)]
    Registry(#[from] RegistryErrorKind),
    #[error(transparent)]
    Config(#[from] ConfigErrorKind),
    #[error("Factory of {id} failed: {source}")]
    Factory {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Create of {id} failed: {source}")]
    Create {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Injected hook of {id} failed: {source}")]
    Injected {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}
