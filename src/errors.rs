mod config;
mod inject;
mod instantiate;
mod lifecycle;
mod registry;

pub use config::ConfigErrorKind;
pub use inject::{InjectErrorKind, MultipleInjectErrors};
pub use instantiate::InstantiateErrorKind;
pub use lifecycle::LifecycleErrorKind;
pub use registry::RegistryErrorKind;
