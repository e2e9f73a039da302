use alloc::{string::String, vec::Vec};
use core::fmt::{self, Display, Formatter};

use super::registry::RegistryErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum InjectErrorKind {
    #[error("Instance {id} has no live object to inject into")]
    NilParameter { id: String },
    #[error("{name} doesn't expose injectable fields")]
    NotAStruct { name: &'static str },
    #[error("Field `{field}` can't be resolved: {source}")]
    Lookup {
        field: &'static str,
        #[source]
        source: RegistryErrorKind,
    },
    #[error("Field `{field}` expects `{expected}`, which the resolved object doesn't provide")]
    InvalidAssignment { field: &'static str, expected: &'static str },
    #[error(transparent)]
    Multiple(MultipleInjectErrors),
}

impl InjectErrorKind {
    /// Folds the errors of one injection pass into a single error.
    pub(crate) fn fold(mut errors: Vec<InjectErrorKind>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(MultipleInjectErrors(errors))),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub struct MultipleInjectErrors(pub Vec<InjectErrorKind>);

impl Display for MultipleInjectErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} injection errors:", self.0.len())?;
        for err in &self.0 {
            write!(f, " [{err}]")?;
        }
        Ok(())
    }
}
