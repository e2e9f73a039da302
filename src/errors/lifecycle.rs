use alloc::string::String;

#[derive(thiserror::Error, Debug)]
pub enum LifecycleErrorKind {
    #[error("Start of {id} failed: {source}")]
    Start {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Stop of {id} failed: {source}")]
    Stop {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Destroy of {id} failed: {source}")]
    Destroy {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LifecycleErrorKind {
    /// Instance the failure came from.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Start { id, .. } | Self::Stop { id, .. } | Self::Destroy { id, .. } => id,
        }
    }
}
