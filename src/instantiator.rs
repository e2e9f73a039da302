use alloc::{string::String, sync::Arc, vec::Vec};
use core::fmt;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info_span, warn};

use crate::{
    component::Component,
    config::InstanceConfig,
    errors::{ConfigErrorKind, InjectErrorKind, InstantiateErrorKind},
    hooks::Transition,
    ids::{InstanceId, TypeId},
    instance::{Instance, State},
    object::Object,
    Container,
};

/// Arguments passed to a [`Factory`]: the ids of the instance being built and its serialized config payload.
#[derive(Clone, Debug)]
pub struct FactoryArgs {
    pub type_id: TypeId,
    pub instance_id: InstanceId,
    payload: Vec<u8>,
}

impl FactoryArgs {
    #[inline]
    #[must_use]
    pub fn new(type_id: TypeId, instance_id: InstanceId, payload: Vec<u8>) -> Self {
        Self {
            type_id,
            instance_id,
            payload,
        }
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// `true` if no config was found for the instance.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty() || self.payload == b"null"
    }

    /// Deserializes the config payload of the instance.
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind::Parse`] if the payload is missing or doesn't match `T`.
    pub fn config<T: DeserializeOwned>(&self) -> Result<T, ConfigErrorKind> {
        serde_json::from_slice(&self.payload).map_err(ConfigErrorKind::Parse)
    }

    /// Like [`Self::config`], but falls back to `T::default()` when the instance has no config.
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind::Parse`] if the payload is present but doesn't match `T`.
    pub fn config_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigErrorKind> {
        if self.is_empty() {
            return Ok(T::default());
        }
        self.config()
    }
}

/// Constructs live objects of a type or of one instance.
///
/// Clones share the same function, so it's cloned out of the registry and called without holding the lock.
#[derive(Clone)]
pub struct Factory(Arc<dyn Fn(FactoryArgs) -> anyhow::Result<Object> + Send + Sync>);

impl Factory {
    #[inline]
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(FactoryArgs) -> anyhow::Result<Object> + Send + Sync + 'static,
    {
        Self(Arc::new(factory))
    }

    /// Factory building `C` from the instance config, or from `C::default()` when there is none.
    #[must_use]
    pub fn from_config<C>() -> Self
    where
        C: Component + DeserializeOwned + Default,
    {
        Self::new(|args: FactoryArgs| Ok(Object::new(args.config_or_default::<C>()?)))
    }

    #[inline]
    pub(crate) fn call(&self, args: FactoryArgs) -> anyhow::Result<Object> {
        (self.0)(args)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Factory").finish_non_exhaustive()
    }
}

pub(crate) fn marshal_config(instance: &Instance, config: Option<&InstanceConfig>) -> Result<Vec<u8>, ConfigErrorKind> {
    let Some(payload) = config.and_then(|config| config.config.as_ref()) else {
        return Ok(Vec::new());
    };
    serde_json::to_vec(payload).map_err(|source| ConfigErrorKind::Marshal {
        id: String::from(instance.instance_id.as_str()),
        source,
    })
}

impl Container {
    /// Constructs the live object of every instance in `order` that doesn't have one yet, then injects all of them.
    ///
    /// Construction uses the first existing strategy of: factory registered for the instance id,
    /// factory registered for the type id, the metadata factory, the metadata default constructor.
    /// The first failure aborts the pass.
    ///
    /// # Errors
    /// - [`InstantiateErrorKind::NoFactory`] if no strategy exists for an instance
    /// - [`InstantiateErrorKind::Config`] if an instance config can't be serialized
    /// - [`InstantiateErrorKind::Factory`] / [`InstantiateErrorKind::Create`] with the failing instance
    /// - [`InstantiateErrorKind::Injected`] if an injected hook fails
    ///
    /// Fields that can't be injected aren't fatal, see [`Self::injection_error`].
    pub fn create_objects(&self, mut order: Vec<Instance>) -> Result<(), InstantiateErrorKind> {
        let span = info_span!("create_objects", container = self.id(), instances = order.len());
        let _guard = span.enter();

        for instance in &mut order {
            if instance.object.is_some() {
                continue;
            }

            debug!(type_id = %instance.type_id, instance_id = %instance.instance_id, "Create");

            match self.construct(instance) {
                Ok(object) => {
                    instance.object = Some(object);
                    self.store_object(instance);
                    self.run_create(instance)?;
                }
                Err(err) => {
                    error!(type_id = %instance.type_id, instance_id = %instance.instance_id, "{}", err);
                    return Err(err);
                }
            }
        }

        self.bind_types(&order);
        let injection_error = self.inject_all(&order)?.map(Arc::new);
        self.inner.registry.lock().injection_error = injection_error;
        Ok(())
    }

    /// Field failures of the last injection pass of [`Self::create_objects`], `None` if every field was filled.
    #[must_use]
    pub fn injection_error(&self) -> Option<Arc<InjectErrorKind>> {
        self.inner.registry.lock().injection_error.clone()
    }

    fn construct(&self, instance: &Instance) -> Result<Object, InstantiateErrorKind> {
        let (factory, metadata, config) = {
            let registry = self.inner.registry.lock();
            let factory = registry
                .factories_by_instance
                .get(&instance.instance_id)
                .or_else(|| registry.factories_by_type.get(&instance.type_id))
                .cloned();
            let metadata = registry.metadata.get(&instance.type_id).ok().cloned();
            let config = registry.config.find(&instance.type_id, &instance.instance_id).cloned();
            (factory, metadata, config)
        };

        let payload = marshal_config(instance, config.as_ref())?;
        let args = FactoryArgs::new(instance.type_id.clone(), instance.instance_id.clone(), payload);

        let result = if let Some(factory) = factory {
            factory.call(args)
        } else {
            match metadata.and_then(|metadata| metadata.new_object(args)) {
                Some(result) => result,
                None => {
                    return Err(InstantiateErrorKind::NoFactory {
                        type_id: String::from(instance.type_id.as_str()),
                    })
                }
            }
        };

        result.map_err(|source| InstantiateErrorKind::Factory {
            id: String::from(instance.instance_id.as_str()),
            source,
        })
    }

    fn store_object(&self, instance: &Instance) {
        let mut registry = self.inner.registry.lock();
        if let Ok(stored) = registry.instances.get_mut(&instance.instance_id) {
            stored.object.clone_from(&instance.object);
        } else {
            warn!(instance_id = %instance.instance_id, "Instance removed while it was being created");
        }
    }

    fn run_create(&self, instance: &mut Instance) -> Result<(), InstantiateErrorKind> {
        let object = instance.object.clone();
        let Some(component) = object.as_ref().and_then(Object::component) else {
            self.set_state(instance, State::Created);
            return Ok(());
        };

        if let Some(binder) = component.as_container_binder() {
            binder.bind_container(self);
        }
        if let Some(binder) = component.as_identity_binder() {
            binder.bind_identity(&instance.type_id, &instance.instance_id);
        }

        self.fire_before(Transition::Create, instance);
        if let Some(creator) = component.as_creator() {
            if let Err(source) = creator.create(self) {
                let err = InstantiateErrorKind::Create {
                    id: String::from(instance.instance_id.as_str()),
                    source,
                };
                error!("{}", err);
                return Err(err);
            }
        }
        self.set_state(instance, State::Created);
        self.fire_after(Transition::Create, instance);

        Ok(())
    }

    /// Binds the config and log providers and every default instance in the type cache.
    fn bind_types(&self, order: &[Instance]) {
        let mut registry = self.inner.registry.lock();
        for object in self.inner.providers.objects() {
            registry.bind_type(&object);
        }
        for instance in order {
            if let Some(object) = &instance.object {
                if instance.instance_id.is_default_of(&instance.type_id) {
                    registry.bind_type(object);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Factory, FactoryArgs};
    use crate::{
        component::{Component, ContainerBinder, Creator, IdentityBinder},
        errors::{ConfigErrorKind, InstantiateErrorKind},
        ids::{InstanceId, TypeId},
        metadata::{Metadata, TypeInstances},
        object::Object,
        Container, Instance,
    };

    use alloc::{format, string::String, sync::Arc, vec, vec::Vec};
    use core::sync::atomic::{AtomicU8, Ordering};
    use parking_lot::Mutex;
    use serde::Deserialize;
    use tracing_test::traced_test;

    #[derive(Default, Deserialize)]
    struct Port {
        port: u16,
    }

    impl Component for Port {}

    struct Tagged(&'static str);

    impl Component for Tagged {}

    fn single(type_id: &str) -> TypeInstances {
        TypeInstances::new(Metadata::new(type_id))
    }

    #[test]
    fn test_factory_args_config() {
        let args = FactoryArgs::new("a".into(), "a".into(), br#"{"port": 8080}"#.to_vec());
        assert_eq!(args.config::<Port>().unwrap().port, 8080);

        let empty = FactoryArgs::new("a".into(), "a".into(), Vec::new());
        assert_eq!(empty.config_or_default::<Port>().unwrap().port, 0);
        assert!(matches!(empty.config::<Port>(), Err(ConfigErrorKind::Parse(_))));
    }

    #[test]
    #[traced_test]
    fn test_factory_precedence() {
        let container = Container::builder().build();
        container
            .pre_add(vec![single("t").with_instance(Instance::new("t", "t")).with_instance(Instance::new("t", "other"))])
            .unwrap();
        container.upsert_metadata(Metadata::new("t").with_factory(Factory::new(|_| Ok(Object::new(Tagged("meta")))))).unwrap();
        container.add_factory_by_type(&"t".into(), Factory::new(|_| Ok(Object::new(Tagged("type"))))).unwrap();
        container.add_factory_by_instance(&"t".into(), Factory::new(|_| Ok(Object::new(Tagged("instance"))))).unwrap();

        container.create_objects(container.resolve().order).unwrap();

        let tag = |id: &str| container.get::<Tagged>(&id.into()).unwrap().0;
        assert_eq!(tag("t"), "instance");
        assert_eq!(tag("other"), "type");
    }

    #[test]
    #[traced_test]
    fn test_failing_higher_factory_is_not_bypassed() {
        let container = Container::builder().build();
        container.pre_add(vec![single("t").with_instance(Instance::new("t", "t"))]).unwrap();
        container.upsert_metadata(Metadata::new("t").with_default::<Port>()).unwrap();
        container
            .add_factory_by_type(&"t".into(), Factory::new(|_| Err(anyhow::anyhow!("boom"))))
            .unwrap();

        let err = container.create_objects(container.resolve().order).unwrap_err();
        assert!(matches!(err, InstantiateErrorKind::Factory { ref id, .. } if id == "t"));
    }

    #[test]
    #[traced_test]
    fn test_no_factory() {
        let container = Container::builder().build();
        container.pre_add(vec![single("t").with_instance(Instance::new("t", "t"))]).unwrap();

        let err = container.create_objects(container.resolve().order).unwrap_err();
        assert!(matches!(err, InstantiateErrorKind::NoFactory { ref type_id } if type_id == "t"));
    }

    #[test]
    #[traced_test]
    fn test_create_failure_aborts_pass() {
        struct Failing;

        impl Creator for Failing {
            fn create(&self, _container: &Container) -> anyhow::Result<()> {
                anyhow::bail!("can't create")
            }
        }

        impl Component for Failing {
            fn as_creator(&self) -> Option<&dyn Creator> {
                Some(self)
            }
        }

        let built = Arc::new(AtomicU8::new(0));
        let container = Container::builder().build();
        container
            .pre_add(vec![
                single("a")
                    .with_metadata(|meta| meta.with_factory(Factory::new(|_| Ok(Object::new(Failing)))))
                    .with_instance(Instance::new("a", "a")),
                single("b")
                    .with_metadata(|meta| {
                        meta.with_factory(Factory::new({
                            let built = built.clone();
                            move |_| {
                                built.fetch_add(1, Ordering::SeqCst);
                                Ok(Object::new(Tagged("b")))
                            }
                        }))
                    })
                    .with_instance(Instance::new("b", "b").with_dependency("a", "a")),
            ])
            .unwrap();

        let err = container.create_objects(container.resolve().order).unwrap_err();
        assert!(matches!(err, InstantiateErrorKind::Create { ref id, .. } if id == "a"));
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[traced_test]
    fn test_create_hooks_order() {
        struct Recorder(Arc<Mutex<Vec<&'static str>>>);

        impl Creator for Recorder {
            fn create(&self, _container: &Container) -> anyhow::Result<()> {
                self.0.lock().push("create");
                Ok(())
            }
        }

        impl Component for Recorder {
            fn as_creator(&self) -> Option<&dyn Creator> {
                Some(self)
            }
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let container = Container::builder().build();
        let hook = |name: &'static str| {
            let calls = calls.clone();
            move |_: &Instance, _: &Container| calls.lock().push(name)
        };
        container.hooks().add_type_hooks(
            TypeId::from("r"),
            crate::Hooks::new().before_create(hook("type before")).after_create(hook("type after")),
        );
        container.hooks().add_instance_hooks(
            "r".into(),
            crate::Hooks::new().before_create(hook("instance before")).after_create(hook("instance after")),
        );
        container
            .pre_add(vec![single("r")
                .with_metadata(|meta| {
                    meta.with_factory(Factory::new({
                        let calls = calls.clone();
                        move |_| Ok(Object::new(Recorder(calls.clone())))
                    }))
                })
                .with_instance(Instance::new("r", "r"))])
            .unwrap();

        container.create_objects(container.resolve().order).unwrap();

        assert_eq!(
            *calls.lock(),
            ["type before", "instance before", "create", "instance after", "type after"]
        );
    }

    #[test]
    #[traced_test]
    fn test_binders_run_before_creator() {
        struct Bound {
            calls: Arc<Mutex<Vec<String>>>,
        }

        impl ContainerBinder for Bound {
            fn bind_container(&self, container: &Container) {
                let weak = container.downgrade();
                let same = weak.upgrade().is_some_and(|upgraded| upgraded.ptr_eq(container));
                self.calls.lock().push(format!("container {same}"));
            }
        }

        impl IdentityBinder for Bound {
            fn bind_identity(&self, type_id: &TypeId, instance_id: &InstanceId) {
                self.calls.lock().push(format!("identity {type_id}/{instance_id}"));
            }
        }

        impl Creator for Bound {
            fn create(&self, _container: &Container) -> anyhow::Result<()> {
                self.calls.lock().push(String::from("create"));
                Ok(())
            }
        }

        impl Component for Bound {
            fn as_container_binder(&self) -> Option<&dyn ContainerBinder> {
                Some(self)
            }

            fn as_identity_binder(&self) -> Option<&dyn IdentityBinder> {
                Some(self)
            }

            fn as_creator(&self) -> Option<&dyn Creator> {
                Some(self)
            }
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let container = Container::builder().build();
        container
            .pre_add(vec![single("bound")
                .with_metadata(|meta| {
                    meta.with_factory(Factory::new({
                        let calls = calls.clone();
                        move |_| Ok(Object::new(Bound { calls: calls.clone() }))
                    }))
                })
                .with_instance(Instance::new("bound", "main"))])
            .unwrap();

        container.create_objects(container.resolve().order).unwrap();

        assert_eq!(*calls.lock(), ["container true", "identity bound/main", "create"]);
    }

    #[test]
    #[traced_test]
    fn test_factory_state_is_shared() {
        let built = Arc::new(AtomicU8::new(0));
        let factory = Factory::new({
            let built = built.clone();
            move |_| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Object::new(Tagged("counted")))
            }
        });

        let container = Container::builder().build();
        container
            .pre_add(vec![single("t")
                .with_instance(Instance::new("t", "one"))
                .with_instance(Instance::new("t", "two"))])
            .unwrap();
        container.add_factory_by_type(&"t".into(), factory.clone()).unwrap();

        container.create_objects(container.resolve().order).unwrap();
        factory.call(FactoryArgs::new("t".into(), "three".into(), Vec::new())).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 3);
    }
}
