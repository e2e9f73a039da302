use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::fmt;

use crate::{
    component::Component,
    errors::{ConfigErrorKind, RegistryErrorKind},
    ids::TypeId,
    instance::Instance,
    instantiator::{Factory, FactoryArgs},
    object::Object,
};

fn default_object<C: Component + Default>() -> Object {
    Object::new(C::default())
}

/// Registration record of a component type.
#[derive(Clone, Default)]
pub struct Metadata {
    pub type_id: TypeId,
    pub version: String,
    pub name: String,
    pub show_name: String,
    pub single: bool,
    /// Types whose default instances the type's default instance depends on.
    pub depends_on: Vec<TypeId>,
    pub factory: Option<Factory>,
    /// Fallback constructor used when there is no factory.
    pub default_ctor: Option<fn() -> Object>,
}

impl Metadata {
    #[inline]
    #[must_use]
    pub fn new(type_id: impl Into<TypeId>) -> Self {
        Self {
            type_id: type_id.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_show_name(mut self, show_name: impl Into<String>) -> Self {
        self.show_name = show_name.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn single(mut self, single: bool) -> Self {
        self.single = single;
        self
    }

    #[inline]
    #[must_use]
    pub fn depends_on(mut self, type_id: impl Into<TypeId>) -> Self {
        self.depends_on.push(type_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Uses `C::default()` as the fallback constructor of the type.
    #[inline]
    #[must_use]
    pub fn with_default<C: Component + Default>(mut self) -> Self {
        self.default_ctor = Some(default_object::<C>);
        self
    }

    /// Builds an object with the metadata factory, falling back to the default constructor.
    /// Returns `None` if the type has neither.
    pub(crate) fn new_object(&self, args: FactoryArgs) -> Option<anyhow::Result<Object>> {
        match (&self.factory, self.default_ctor) {
            (Some(factory), _) => Some(factory.call(args)),
            (None, Some(ctor)) => Some(Ok(ctor())),
            (None, None) => None,
        }
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("type_id", &self.type_id)
            .field("version", &self.version)
            .field("name", &self.name)
            .field("show_name", &self.show_name)
            .field("single", &self.single)
            .field("depends_on", &self.depends_on)
            .field("factory", &self.factory.is_some())
            .field("default_ctor", &self.default_ctor.is_some())
            .finish()
    }
}

/// Metadata keyed by type id.
#[derive(Default)]
pub(crate) struct Metas {
    map: BTreeMap<TypeId, Metadata>,
}

impl Metas {
    /// Inserts the metadata, replacing the previous record of the same type.
    pub(crate) fn upsert_or_add(&mut self, metadata: Metadata) -> Result<(), RegistryErrorKind> {
        if metadata.type_id.is_empty() {
            return Err(ConfigErrorKind::EmptyTypeId.into());
        }
        self.map.insert(metadata.type_id.clone(), metadata);
        Ok(())
    }

    pub(crate) fn get(&self, type_id: &TypeId) -> Result<&Metadata, RegistryErrorKind> {
        self.map.get(type_id).ok_or_else(|| RegistryErrorKind::not_found(type_id.as_str()))
    }

    pub(crate) fn remove(&mut self, type_id: &TypeId) -> Option<Metadata> {
        self.map.remove(type_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Metadata> {
        self.map.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// A type together with instances to pre-register for it.
#[derive(Clone, Debug)]
pub struct TypeInstances {
    pub metadata: Metadata,
    pub instances: Vec<Instance>,
}

impl TypeInstances {
    #[inline]
    #[must_use]
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            instances: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, f: impl FnOnce(Metadata) -> Metadata) -> Self {
        self.metadata = f(self.metadata);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_instance(mut self, instance: Instance) -> Self {
        self.instances.push(instance);
        self
    }
}
