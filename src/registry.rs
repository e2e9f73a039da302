use alloc::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::{
    any::CapabilityId,
    config::Config,
    errors::{InjectErrorKind, RegistryErrorKind},
    ids::{InstanceId, TypeId},
    instance::Instances,
    instantiator::Factory,
    metadata::Metas,
    object::Object,
};

/// Registration state of a container, guarded by one lock.
///
/// The type cache is derived from created instances: it's rebuilt by every instantiation pass
/// and never consulted to decide what exists.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) metadata: Metas,
    pub(crate) instances: Instances,
    pub(crate) types: BTreeMap<CapabilityId, Object>,
    pub(crate) factories_by_instance: BTreeMap<InstanceId, Factory>,
    pub(crate) factories_by_type: BTreeMap<TypeId, Factory>,
    pub(crate) config: Config,
    /// Field failures of the last injection pass.
    pub(crate) injection_error: Option<Arc<InjectErrorKind>>,
}

impl Registry {
    /// Binds every capability of `object` in the type cache.
    pub(crate) fn bind_type(&mut self, object: &Object) {
        for capability in object.capabilities() {
            if let Some(prev) = self.types.insert(capability, object.clone()) {
                if !prev.ptr_eq(object) {
                    debug!(%capability, object = object.name(), prev = prev.name(), "Type binding replaced");
                }
            }
        }
    }

    pub(crate) fn unbind_type(&mut self, object: &Object) {
        self.types.retain(|_, bound| !bound.ptr_eq(object));
    }

    pub(crate) fn add_factory_by_instance(&mut self, instance_id: &InstanceId, factory: Factory) -> Result<(), RegistryErrorKind> {
        if self.factories_by_instance.contains_key(instance_id) {
            return Err(RegistryErrorKind::already_exists(instance_id.as_str()));
        }
        self.factories_by_instance.insert(instance_id.clone(), factory);
        Ok(())
    }

    pub(crate) fn add_factory_by_type(&mut self, type_id: &TypeId, factory: Factory) -> Result<(), RegistryErrorKind> {
        if self.factories_by_type.contains_key(type_id) {
            return Err(RegistryErrorKind::already_exists(type_id.as_str()));
        }
        self.factories_by_type.insert(type_id.clone(), factory);
        Ok(())
    }
}
