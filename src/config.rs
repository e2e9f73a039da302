use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    any::Capabilities,
    component::{Component, Creator},
    errors::ConfigErrorKind,
    ids::{InstanceId, TypeId},
    logging::LogConfig,
    metadata::Metadata,
    Container,
};

/// Environment variable naming the config file of [`JsonConfig::from_env`].
pub const CONFIG_FILE_ENV: &str = "WIREUP_CONFIG";

/// Configuration document of a container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub components: Vec<ComponentConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    pub metadata: MetadataConfig,
    pub instances: Vec<InstanceConfig>,
}

/// Serializable part of [`Metadata`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub type_id: TypeId,
    pub version: String,
    pub name: String,
    pub show_name: String,
    pub single: bool,
    pub depends_on: Vec<TypeId>,
}

impl MetadataConfig {
    /// Applies the configured fields to `existing`, keeping its factory and default constructor.
    #[must_use]
    pub fn merge(&self, existing: Option<Metadata>) -> Metadata {
        let mut metadata = existing.unwrap_or_default();
        metadata.type_id.clone_from(&self.type_id);
        metadata.version.clone_from(&self.version);
        metadata.name.clone_from(&self.name);
        metadata.show_name.clone_from(&self.show_name);
        metadata.single = self.single;
        metadata.depends_on.clone_from(&self.depends_on);
        metadata
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub instance_id: InstanceId,
    /// Field name → instance id injected into the field.
    pub dependencies: BTreeMap<String, InstanceId>,
    /// Payload handed to the factory of the instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Config {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind::Parse`] if the document doesn't match the config model.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, ConfigErrorKind> {
        serde_json::from_value(raw).map_err(ConfigErrorKind::Parse)
    }

    /// Finds the config of an instance.
    ///
    /// With an empty `type_id` every component is searched by instance id.
    /// Otherwise only the component of `type_id` is, falling back to its default instance.
    /// An instance configured without an id is the default instance of its component.
    #[must_use]
    pub fn find(&self, type_id: &TypeId, instance_id: &InstanceId) -> Option<&InstanceConfig> {
        if type_id.is_empty() {
            return self.components.iter().find_map(|component| component.instance(instance_id));
        }

        let component = self.components.iter().find(|component| &component.metadata.type_id == type_id)?;
        component
            .instance(instance_id)
            .or_else(|| component.instance(&InstanceId::from(type_id)))
    }
}

impl ComponentConfig {
    fn instance(&self, instance_id: &InstanceId) -> Option<&InstanceConfig> {
        self.instances.iter().find(|instance| {
            if instance.instance_id.is_empty() {
                instance_id.is_default_of(&self.metadata.type_id)
            } else {
                &instance.instance_id == instance_id
            }
        })
    }
}

/// Source of the configuration document.
pub trait ConfigProvider: Send + Sync {
    /// File the document is loaded from, if any.
    fn config_file(&self) -> Option<PathBuf>;

    /// Loaded document, `None` if there is none.
    fn raw(&self) -> Option<serde_json::Value>;
}

/// Reads the configuration from a JSON file when created.
#[derive(Debug, Default)]
pub struct JsonConfig {
    path: Option<PathBuf>,
    raw: RwLock<Option<serde_json::Value>>,
}

impl JsonConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            raw: RwLock::new(None),
        }
    }

    /// Uses the file named by the `WIREUP_CONFIG` environment variable, or no file if it isn't set.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            path: env::var_os(CONFIG_FILE_ENV).map(PathBuf::from),
            raw: RwLock::new(None),
        }
    }

    /// In-memory document, for tests and embedded configuration.
    #[must_use]
    pub fn from_value(raw: serde_json::Value) -> Self {
        Self {
            path: None,
            raw: RwLock::new(Some(raw)),
        }
    }

    /// Loads the file.
    ///
    /// # Errors
    /// - [`ConfigErrorKind::MissingFile`] if the file doesn't exist
    /// - [`ConfigErrorKind::Read`] / [`ConfigErrorKind::Parse`] if it can't be read or isn't JSON
    pub fn load(&self) -> Result<(), ConfigErrorKind> {
        let Some(path) = &self.path else {
            debug!("No config file");
            return Ok(());
        };
        let raw = read_json(path)?;
        debug!(path = %path.display(), "Config loaded");
        *self.raw.write() = Some(raw);
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, ConfigErrorKind> {
    if !path.exists() {
        return Err(ConfigErrorKind::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigErrorKind::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(ConfigErrorKind::Parse)
}

impl ConfigProvider for JsonConfig {
    fn config_file(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn raw(&self) -> Option<serde_json::Value> {
        self.raw.read().clone()
    }
}

impl Creator for JsonConfig {
    fn create(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(self.load()?)
    }
}

impl Component for JsonConfig {
    fn provide(this: &Arc<Self>, capabilities: &mut Capabilities) {
        capabilities.insert(this.clone() as Arc<dyn ConfigProvider>);
    }

    fn as_creator(&self) -> Option<&dyn Creator> {
        Some(self)
    }
}
