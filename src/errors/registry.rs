use alloc::string::String;

use super::config::ConfigErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum RegistryErrorKind {
    #[error("Already exists: {id}")]
    AlreadyExists { id: String },
    #[error("Not found: {id}")]
    NotFound { id: String },
    #[error("Container {id} can't be its own ancestor")]
    ParentCycle { id: usize },
    #[error(transparent)]
    Config(#[from] ConfigErrorKind),
}

impl RegistryErrorKind {
    #[inline]
    pub(crate) fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    #[inline]
    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
