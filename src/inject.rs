use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};
use core::{any::type_name, fmt};
use parking_lot::RwLock;
use tracing::{debug, error, info_span, warn};

use crate::{
    any::CapabilityId,
    errors::{InjectErrorKind, InstantiateErrorKind, RegistryErrorKind},
    ids::InstanceId,
    instance::Instance,
    object::Object,
    Container,
};

/// Field filled by the container with another instance, looked up as capability `T`.
///
/// `T` is usually a trait object: `Inject<dyn Logger>`.
pub struct Inject<T: ?Sized> {
    value: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Inject<T> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().clone()
    }

    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }

    #[inline]
    pub fn set(&self, value: Arc<T>) -> Option<Arc<T>> {
        self.value.write().replace(value)
    }
}

impl<T: ?Sized> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("capability", &type_name::<T>())
            .field("set", &self.is_set())
            .finish()
    }
}

/// Type-erased injection target.
pub trait Slot: Send + Sync {
    /// Capability the slot expects.
    fn capability(&self) -> CapabilityId;

    /// Stores `object` in the slot. Returns `false` if the object doesn't provide the expected capability.
    fn assign(&self, object: &Object) -> bool;
}

impl<T: ?Sized + Send + Sync + 'static> Slot for Inject<T> {
    fn capability(&self) -> CapabilityId {
        CapabilityId::of::<T>()
    }

    fn assign(&self, object: &Object) -> bool {
        match object.get::<T>() {
            Some(value) => {
                self.set(value);
                true
            }
            None => false,
        }
    }
}

/// Descriptor of one injectable field.
pub struct Field<'a> {
    pub name: &'static str,
    /// Instance to inject. Without one the field is resolved by its capability.
    pub instance_id: Option<&'static str>,
    pub slot: &'a dyn Slot,
}

impl<'a> Field<'a> {
    #[inline]
    #[must_use]
    pub fn new(name: &'static str, slot: &'a dyn Slot) -> Self {
        Self {
            name,
            instance_id: None,
            slot,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: &'static str) -> Self {
        self.instance_id = Some(instance_id);
        self
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("capability", &self.slot.capability())
            .finish()
    }
}

/// A component with fields filled by the container. Usually derived with `#[derive(Injectable)]`.
pub trait Injectable {
    fn fields(&self) -> Vec<Field<'_>>;
}

impl Container {
    /// Injects the fields of `object`, using the explicit instance ids of the fields and capability matching.
    ///
    /// # Errors
    /// - [`InjectErrorKind::NotAStruct`] if the object doesn't expose injectable fields
    /// - [`InjectErrorKind::Lookup`] / [`InjectErrorKind::InvalidAssignment`] for each field that couldn't be filled,
    ///   folded into [`InjectErrorKind::Multiple`] if there is more than one
    pub fn inject(&self, object: &Object) -> Result<(), InjectErrorKind> {
        self.inject_fields(object, None)
    }

    /// Injects the live object of `instance`. The instance dependencies override the ids declared by the fields.
    ///
    /// # Errors
    /// Returns [`InjectErrorKind::NilParameter`] if the instance wasn't created yet, see also [`Self::inject`].
    pub fn inject_instance(&self, instance: &Instance) -> Result<(), InjectErrorKind> {
        let Some(object) = &instance.object else {
            return Err(InjectErrorKind::NilParameter {
                id: String::from(instance.instance_id.as_str()),
            });
        };
        self.inject_fields(object, Some(&instance.dependencies))
    }

    fn inject_fields(&self, object: &Object, overrides: Option<&BTreeMap<String, InstanceId>>) -> Result<(), InjectErrorKind> {
        let Some(injectable) = object.component().and_then(|component| component.as_injectable()) else {
            return Err(InjectErrorKind::NotAStruct { name: object.name() });
        };

        let mut errors = Vec::new();
        for field in injectable.fields() {
            let resolved = self.resolve_field(&field, overrides).map_err(|source| InjectErrorKind::Lookup {
                field: field.name,
                source,
            });

            match resolved {
                Ok(dependency) => {
                    if field.slot.assign(&dependency) {
                        debug!(field = field.name, dependency = dependency.name(), "Injected");
                    } else {
                        errors.push(InjectErrorKind::InvalidAssignment {
                            field: field.name,
                            expected: field.slot.capability().name,
                        });
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        match InjectErrorKind::fold(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Override map, then explicit id of the field, then capability.
    fn resolve_field(
        &self,
        field: &Field<'_>,
        overrides: Option<&BTreeMap<String, InstanceId>>,
    ) -> Result<Object, RegistryErrorKind> {
        if let Some(instance_id) = overrides.and_then(|overrides| overrides.get(field.name)) {
            match self.get_by_instance_id(instance_id) {
                Ok(object) => return Ok(object),
                Err(err) => warn!(field = field.name, "Override can't be resolved, falling back: {}", err),
            }
        }
        if let Some(instance_id) = field.instance_id {
            return self.get_by_instance_id(&InstanceId::from(instance_id));
        }
        self.get_object_by_capability(&field.slot.capability())
    }

    /// Injects every created instance of `order`, then runs the after-all-injected hooks if nothing failed.
    ///
    /// Field failures don't stop the pass and aren't fatal: the fields stay unset, the failures are logged
    /// and returned folded once every instance was processed.
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::Injected`] if an injected hook fails.
    pub(crate) fn inject_all(&self, order: &[Instance]) -> Result<Option<InjectErrorKind>, InstantiateErrorKind> {
        let span = info_span!("inject", container = self.id());
        let _guard = span.enter();

        let mut errors = Vec::new();
        for instance in order {
            let Some(component) = instance.object.as_ref().and_then(Object::component) else {
                continue;
            };

            if component.as_injectable().is_some() {
                if let Err(err) = self.inject_instance(instance) {
                    error!(instance_id = %instance.instance_id, "{}", err);
                    errors.push(err);
                }
            }

            if let Some(injected) = component.as_injected() {
                injected.injected(self).map_err(|source| {
                    let err = InstantiateErrorKind::Injected {
                        id: String::from(instance.instance_id.as_str()),
                        source,
                    };
                    error!("{}", err);
                    err
                })?;
            }
        }

        if let Some(err) = InjectErrorKind::fold(errors) {
            warn!("Skipping after-all-injected hooks");
            return Ok(Some(err));
        }

        for instance in order {
            if let Some(hook) = instance
                .object
                .as_ref()
                .and_then(Object::component)
                .and_then(|component| component.as_after_all_injected())
            {
                hook.after_all_injected(self);
            }
        }

        Ok(None)
    }
}
