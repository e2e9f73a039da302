extern crate alloc;
extern crate self as wireup;

pub(crate) mod any;
pub(crate) mod component;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod global;
pub(crate) mod hooks;
pub(crate) mod ids;
pub(crate) mod inject;
pub(crate) mod instance;
pub(crate) mod instantiator;
pub(crate) mod lifecycle;
pub(crate) mod logging;
pub(crate) mod metadata;
pub(crate) mod object;
pub(crate) mod registry;

pub use any::{Capabilities, CapabilityId};
pub use component::{
    AfterAllDestroyed, AfterAllInjected, AfterAllStarted, BeforeAllStop, Component, ContainerBinder, Creator, Destroyer,
    IdentityBinder, Injected, Starter, Stopper,
};
pub use config::{ComponentConfig, Config, ConfigProvider, InstanceConfig, JsonConfig, MetadataConfig, CONFIG_FILE_ENV};
pub use container::{Container, ContainerBuilder, Dump, DumpedInstance, WeakContainer};
pub use dependency_resolver::{resolve, Resolution};
pub use errors::{
    ConfigErrorKind, InjectErrorKind, InstantiateErrorKind, LifecycleErrorKind, MultipleInjectErrors, RegistryErrorKind,
};
pub use global::default_container;
pub use hooks::{Hook, HookRegistry, Hooks};
pub use ids::{InstanceId, TypeId};
pub use inject::{Field, Inject, Injectable, Slot};
pub use instance::{Instance, State};
pub use instantiator::{Factory, FactoryArgs};
pub use logging::{LogConfig, LogProvider, TracingLog, LOG_FILTER_ENV};
pub use metadata::{Metadata, TypeInstances};
pub use object::Object;

#[cfg(feature = "macros")]
pub use wireup_macros::Injectable;
