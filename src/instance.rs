use alloc::{collections::BTreeMap, string::String};
use core::fmt;

use crate::{
    errors::RegistryErrorKind,
    ids::{InstanceId, TypeId},
    object::Object,
};

/// Lifecycle state of an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    #[default]
    Unstarted,
    Created,
    Started,
    Stopped,
    Destroyed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Unstarted => "unstarted",
            State::Created => "created",
            State::Started => "started",
            State::Stopped => "stopped",
            State::Destroyed => "destroyed",
        })
    }
}

/// Registration record of one instance.
#[derive(Clone, Debug, Default)]
pub struct Instance {
    /// Owning type. Empty for objects added directly by instance id.
    pub type_id: TypeId,
    pub instance_id: InstanceId,
    /// Explicit dependencies: field name → instance id injected into that field.
    ///
    /// These are the only edges the dependency resolver orders by. Dependencies found by capability
    /// at injection time don't affect the order.
    pub dependencies: BTreeMap<String, InstanceId>,
    /// Live object, set once the instance is created.
    pub object: Option<Object>,
    pub state: State,
}

impl Instance {
    #[inline]
    #[must_use]
    pub fn new(type_id: impl Into<TypeId>, instance_id: impl Into<InstanceId>) -> Self {
        Self {
            type_id: type_id.into(),
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_dependency(mut self, field: impl Into<String>, instance_id: impl Into<InstanceId>) -> Self {
        self.dependencies.insert(field.into(), instance_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_object(mut self, object: Object) -> Self {
        self.object = Some(object);
        self
    }
}

/// Instances keyed by instance id.
#[derive(Default)]
pub(crate) struct Instances {
    pub(crate) map: BTreeMap<InstanceId, Instance>,
}

impl Instances {
    /// Adds the instance.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::AlreadyExists`] if the instance id is already registered, use [`Self::replace`] for that.
    pub(crate) fn upsert_or_add(&mut self, instance: Instance) -> Result<(), RegistryErrorKind> {
        use alloc::collections::btree_map::Entry::{Occupied, Vacant};

        match self.map.entry(instance.instance_id.clone()) {
            Occupied(entry) => Err(RegistryErrorKind::already_exists(entry.key().as_str())),
            Vacant(entry) => {
                entry.insert(instance);
                Ok(())
            }
        }
    }

    pub(crate) fn replace(&mut self, instance: Instance) -> Option<Instance> {
        self.map.insert(instance.instance_id.clone(), instance)
    }

    pub(crate) fn get(&self, instance_id: &InstanceId) -> Result<&Instance, RegistryErrorKind> {
        self.map
            .get(instance_id)
            .ok_or_else(|| RegistryErrorKind::not_found(instance_id.as_str()))
    }

    pub(crate) fn get_mut(&mut self, instance_id: &InstanceId) -> Result<&mut Instance, RegistryErrorKind> {
        self.map
            .get_mut(instance_id)
            .ok_or_else(|| RegistryErrorKind::not_found(instance_id.as_str()))
    }

    pub(crate) fn remove_by_id(&mut self, instance_id: &InstanceId) -> Result<Instance, RegistryErrorKind> {
        self.map
            .remove(instance_id)
            .ok_or_else(|| RegistryErrorKind::not_found(instance_id.as_str()))
    }

    pub(crate) fn has_type(&self, type_id: &TypeId) -> bool {
        self.map.values().any(|instance| &instance.type_id == type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Instance, Instances, State};
    use crate::errors::RegistryErrorKind;

    #[test]
    fn test_duplicate_instance() {
        let mut instances = Instances::default();
        instances.upsert_or_add(Instance::new("log", "log")).unwrap();

        let err = instances.upsert_or_add(Instance::new("log", "log")).unwrap_err();
        assert!(matches!(err, RegistryErrorKind::AlreadyExists { ref id } if id == "log"));

        instances.replace(Instance::new("log", "log").with_dependency("cfg", "cfg"));
        assert_eq!(instances.get(&"log".into()).unwrap().dependencies.len(), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let mut instances = Instances::default();
        instances.upsert_or_add(Instance::new("a", "a1")).unwrap();

        assert!(instances.has_type(&"a".into()));
        instances.remove_by_id(&"a1".into()).unwrap();
        assert!(!instances.has_type(&"a".into()));
        assert!(matches!(instances.get(&"a1".into()), Err(RegistryErrorKind::NotFound { .. })));
        assert!(instances.remove_by_id(&"a1".into()).is_err());
    }

    #[test]
    fn test_default_state() {
        assert_eq!(Instance::new("a", "a").state, State::Unstarted);
        assert!(State::Created < State::Destroyed);
    }
}
