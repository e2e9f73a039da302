use alloc::{
    string::String,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    any::CapabilityId,
    component::Component,
    config::{Config, ConfigProvider, InstanceConfig, JsonConfig},
    errors::{ConfigErrorKind, InstantiateErrorKind, RegistryErrorKind},
    global,
    hooks::HookRegistry,
    ids::{InstanceId, TypeId},
    instance::{Instance, State},
    instantiator::Factory,
    logging::{LogProvider, TracingLog},
    metadata::{Metadata, TypeInstances},
    object::Object,
    registry::Registry,
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Handle to a component container. Cloning the handle shares the container.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

/// Non-owning handle, for components keeping a back-reference to their container.
#[derive(Clone, Default)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer").field("alive", &(self.inner.strong_count() > 0)).finish()
    }
}

pub(crate) struct Provider<T: ?Sized> {
    pub(crate) object: Object,
    pub(crate) provider: Arc<T>,
}

/// Config and log providers. They bracket the lifecycle of every other instance.
#[derive(Default)]
pub(crate) struct Providers {
    pub(crate) config: Option<Provider<dyn ConfigProvider>>,
    pub(crate) log: Option<Provider<dyn LogProvider>>,
}

impl Providers {
    /// Config provider first, then log provider.
    pub(crate) fn objects(&self) -> Vec<Object> {
        let config = self.config.as_ref().map(|provider| provider.object.clone());
        let log = self.log.as_ref().map(|provider| provider.object.clone());
        config.into_iter().chain(log).collect()
    }
}

pub(crate) struct ContainerInner {
    pub(crate) id: usize,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) hooks: HookRegistry,
    pub(crate) providers: Providers,
    pub(crate) parent: RwLock<Option<Container>>,
}

pub struct ContainerBuilder {
    providers: Providers,
    parent: Option<Container>,
}

impl ContainerBuilder {
    /// Builder with the default providers: [`JsonConfig::from_env`] and [`TracingLog`].
    #[must_use]
    pub fn new() -> Self {
        Self::empty()
            .config_provider(JsonConfig::from_env())
            .log_provider(TracingLog::default())
    }

    /// Builder without config and log providers.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            providers: Providers::default(),
            parent: None,
        }
    }

    #[must_use]
    pub fn config_provider<C: Component + ConfigProvider>(mut self, provider: C) -> Self {
        let provider = Arc::new(provider);
        self.providers.config = Some(Provider {
            object: Object::from_arc(provider.clone()),
            provider,
        });
        self
    }

    #[must_use]
    pub fn log_provider<L: Component + LogProvider>(mut self, provider: L) -> Self {
        let provider = Arc::new(provider);
        self.providers.log = Some(Provider {
            object: Object::from_arc(provider.clone()),
            provider,
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn without_log_provider(mut self) -> Self {
        self.providers.log = None;
        self
    }

    /// Parent searched by lookups missing in the built container.
    #[inline]
    #[must_use]
    pub fn parent(mut self, parent: Container) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builds the container. The first container built in the process becomes the default one.
    #[must_use]
    pub fn build(self) -> Container {
        let container = Container {
            inner: Arc::new(ContainerInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                registry: Mutex::new(Registry::default()),
                hooks: HookRegistry::default(),
                providers: self.providers,
                parent: RwLock::new(self.parent),
            }),
        };
        if global::set_default(&container) {
            debug!(container = container.id(), "Default container set");
        }
        container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Process-unique id of the container, used in logs.
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Loads the config, configures logging, registers the configured components
    /// and creates every registered instance in dependency order.
    ///
    /// # Errors
    /// - [`InstantiateErrorKind::Config`] if the config provider fails or the document is invalid
    /// - [`InstantiateErrorKind::Registry`] if a configured component can't be registered
    /// - any error of [`Self::create_objects`]
    pub fn create(&self) -> Result<(), InstantiateErrorKind> {
        let span = info_span!("create", container = self.id());
        let _guard = span.enter();

        let config = self.load_config()?;
        self.configure_log(&config);
        self.inner.registry.lock().config = config;

        self.ingest_config()?;
        self.auto_make_instance_ids();

        let resolution = self.resolve();
        self.create_objects(resolution.order)?;

        info!("{}", self.dump());
        Ok(())
    }

    fn load_config(&self) -> Result<Config, ConfigErrorKind> {
        let Some(Provider { object, provider }) = &self.inner.providers.config else {
            debug!("No config provider");
            return Ok(Config::default());
        };

        if let Some(creator) = object.component().and_then(|component| component.as_creator()) {
            creator.create(self).map_err(ConfigErrorKind::Provider)?;
        }
        match provider.raw() {
            Some(raw) => Config::from_json(raw),
            None => {
                debug!(file = ?provider.config_file(), "Empty config");
                Ok(Config::default())
            }
        }
    }

    fn configure_log(&self, config: &Config) {
        let Some(Provider { object, provider }) = &self.inner.providers.log else {
            return;
        };

        if let Some(creator) = object.component().and_then(|component| component.as_creator()) {
            if let Err(err) = creator.create(self) {
                warn!("Log provider create failed: {}", err);
            }
        }
        if let Err(err) = provider.configure(&config.log) {
            warn!("Log provider configure failed: {}", err);
        }
    }

    /// Registers the metadata and instances of every configured component.
    ///
    /// A component without configured instances gets its default instance, depending on the default instances
    /// of its type dependencies. Instances already registered take the configured dependencies.
    fn ingest_config(&self) -> Result<(), RegistryErrorKind> {
        let mut registry = self.inner.registry.lock();
        let components = registry.config.components.clone();

        for component in components {
            let type_id = component.metadata.type_id.clone();
            if type_id.is_empty() {
                let err = RegistryErrorKind::from(ConfigErrorKind::EmptyTypeId);
                error!("{}", err);
                return Err(err);
            }

            let existing = registry.metadata.remove(&type_id);
            registry.metadata.upsert_or_add(component.metadata.merge(existing))?;

            let instances: Vec<Instance> = if component.instances.is_empty() {
                let mut instance = Instance::new(type_id.clone(), &type_id);
                for dependency in &component.metadata.depends_on {
                    instance = instance.with_dependency(dependency.as_str(), dependency);
                }
                alloc::vec![instance]
            } else {
                component
                    .instances
                    .into_iter()
                    .map(|configured| {
                        let instance_id = if configured.instance_id.is_empty() {
                            InstanceId::from(&type_id)
                        } else {
                            configured.instance_id
                        };
                        Instance {
                            dependencies: configured.dependencies,
                            ..Instance::new(type_id.clone(), instance_id)
                        }
                    })
                    .collect()
            };

            for instance in instances {
                match registry.instances.get_mut(&instance.instance_id) {
                    Ok(existing) => {
                        debug!(instance_id = %instance.instance_id, "Merging configured instance");
                        if existing.type_id.is_empty() {
                            existing.type_id = instance.type_id;
                        }
                        existing.dependencies.extend(instance.dependencies);
                    }
                    Err(_) => registry.instances.upsert_or_add(instance)?,
                }
            }
        }

        Ok(())
    }

    /// Adds the default instance of every type without instances.
    fn auto_make_instance_ids(&self) {
        let mut registry = self.inner.registry.lock();
        let missing: Vec<(TypeId, Vec<TypeId>)> = registry
            .metadata
            .iter()
            .filter(|metadata| !registry.instances.has_type(&metadata.type_id))
            .map(|metadata| (metadata.type_id.clone(), metadata.depends_on.clone()))
            .collect();

        for (type_id, depends_on) in missing {
            let mut instance = Instance::new(type_id.clone(), &type_id);
            for dependency in &depends_on {
                instance = instance.with_dependency(dependency.as_str(), dependency);
            }
            debug!(instance_id = %instance.instance_id, "Default instance added");
            if let Err(err) = registry.instances.upsert_or_add(instance) {
                debug!("{}", err);
            }
        }
    }

    /// Registers types together with their instances.
    ///
    /// Instances without a type id take the one of their metadata, instances without an instance id take the type id.
    /// Registration continues past failures.
    ///
    /// # Errors
    /// Returns the last failure, the earlier ones are only logged.
    pub fn pre_add(&self, types: Vec<TypeInstances>) -> Result<(), RegistryErrorKind> {
        let mut last = None;
        let mut record = |err: RegistryErrorKind| {
            if let Some(prev) = last.replace(err) {
                error!("{}", prev);
            }
        };

        let mut registry = self.inner.registry.lock();
        for TypeInstances { metadata, instances } in types {
            let type_id = metadata.type_id.clone();
            if let Err(err) = registry.metadata.upsert_or_add(metadata) {
                record(err);
                continue;
            }

            for mut instance in instances {
                if instance.type_id.is_empty() {
                    instance.type_id = type_id.clone();
                }
                if instance.instance_id.is_empty() {
                    instance.instance_id = InstanceId::from(&type_id);
                }
                if let Err(err) = registry.instances.upsert_or_add(instance) {
                    record(err);
                }
            }
        }
        drop(registry);

        match last {
            Some(err) => {
                error!("{}", err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Inserts or replaces the metadata of a type.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::Config`] if the type id is empty.
    pub fn upsert_metadata(&self, metadata: Metadata) -> Result<(), RegistryErrorKind> {
        self.inner.registry.lock().metadata.upsert_or_add(metadata)
    }

    #[must_use]
    pub fn metadata(&self, type_id: &TypeId) -> Option<Metadata> {
        self.inner.registry.lock().metadata.get(type_id).ok().cloned()
    }

    /// Registers a factory used for every instance of `type_id` instead of the metadata one.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::AlreadyExists`] if the type already has one.
    pub fn add_factory_by_type(&self, type_id: &TypeId, factory: Factory) -> Result<(), RegistryErrorKind> {
        self.inner.registry.lock().add_factory_by_type(type_id, factory)
    }

    /// Registers a factory used for the instance `instance_id` only.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::AlreadyExists`] if the instance already has one.
    pub fn add_factory_by_instance(&self, instance_id: &InstanceId, factory: Factory) -> Result<(), RegistryErrorKind> {
        self.inner.registry.lock().add_factory_by_instance(instance_id, factory)
    }

    pub fn remove_factory_by_type(&self, type_id: &TypeId) -> Option<Factory> {
        self.inner.registry.lock().factories_by_type.remove(type_id)
    }

    pub fn remove_factory_by_instance(&self, instance_id: &InstanceId) -> Option<Factory> {
        self.inner.registry.lock().factories_by_instance.remove(instance_id)
    }

    /// Gets the live object of an instance, searching the parent containers if it isn't registered here.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotFound`] if no container has a created instance with this id.
    pub fn get_by_instance_id(&self, instance_id: &InstanceId) -> Result<Object, RegistryErrorKind> {
        let local = self
            .inner
            .registry
            .lock()
            .instances
            .get(instance_id)
            .ok()
            .and_then(|instance| instance.object.clone());
        if let Some(object) = local {
            return Ok(object);
        }

        match self.parent() {
            Some(parent) => {
                debug!(%instance_id, parent = parent.id(), "Not found, searching parent");
                parent.get_by_instance_id(instance_id)
            }
            None => Err(RegistryErrorKind::not_found(instance_id.as_str())),
        }
    }

    /// Gets the object bound to `capability`, searching the parent containers if it isn't bound here.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotFound`] if no container binds the capability.
    pub fn get_object_by_capability(&self, capability: &CapabilityId) -> Result<Object, RegistryErrorKind> {
        let local = self.inner.registry.lock().types.get(capability).cloned();
        if let Some(object) = local {
            return Ok(object);
        }

        match self.parent() {
            Some(parent) => {
                debug!(%capability, parent = parent.id(), "Not bound, searching parent");
                parent.get_object_by_capability(capability)
            }
            None => Err(RegistryErrorKind::not_found(capability.name)),
        }
    }

    /// Gets the object bound to capability `T`.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotFound`] if no container binds `T`.
    pub fn get_by_capability<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, RegistryErrorKind> {
        let span = info_span!("get", capability = core::any::type_name::<T>());
        let _guard = span.enter();

        let capability = CapabilityId::of::<T>();
        self.get_object_by_capability(&capability)?
            .get::<T>()
            .ok_or_else(|| RegistryErrorKind::not_found(capability.name))
    }

    /// Gets instance `instance_id` as capability `T`.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotFound`] if the instance doesn't exist, isn't created or doesn't provide `T`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, instance_id: &InstanceId) -> Result<Arc<T>, RegistryErrorKind> {
        let span = info_span!("get", %instance_id, capability = core::any::type_name::<T>());
        let _guard = span.enter();

        let object = self.get_by_instance_id(instance_id)?;
        match object.get::<T>() {
            Some(value) => Ok(value),
            None => {
                let err = RegistryErrorKind::not_found(alloc::format!("{instance_id} as {}", core::any::type_name::<T>()));
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Copy of the registration record of an instance.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotFound`] if the instance isn't registered in this container.
    pub fn instance(&self, instance_id: &InstanceId) -> Result<Instance, RegistryErrorKind> {
        self.inner.registry.lock().instances.get(instance_id).cloned()
    }

    /// Binds every capability of `object` in the type cache.
    pub fn replace_or_add_by_type(&self, object: Object) {
        self.inner.registry.lock().bind_type(&object);
    }

    /// Binds `value` as capability `T` only.
    pub fn replace_or_add_by_capability<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> Option<Object> {
        self.inner
            .registry
            .lock()
            .types
            .insert(CapabilityId::of::<T>(), Object::from_value(value))
    }

    /// Sets the live object of an instance, registering the instance if needed.
    /// The object doesn't go through a factory, it's considered created.
    pub fn replace_or_add_by_instance_id(&self, object: Object, instance_id: impl Into<InstanceId>) -> Option<Object> {
        let instance_id = instance_id.into();
        let mut registry = self.inner.registry.lock();
        match registry.instances.get_mut(&instance_id) {
            Ok(existing) => {
                existing.state = State::Created;
                existing.object.replace(object)
            }
            Err(_) => {
                let mut instance = Instance::new(TypeId::default(), instance_id).with_object(object);
                instance.state = State::Created;
                registry.instances.replace(instance);
                None
            }
        }
    }

    pub fn remove_by_capability(&self, capability: &CapabilityId) -> Option<Object> {
        self.inner.registry.lock().types.remove(capability)
    }

    /// Removes an instance along with the type bindings of its object.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotFound`] if the instance isn't registered.
    pub fn remove_by_instance_id(&self, instance_id: &InstanceId) -> Result<Instance, RegistryErrorKind> {
        let mut registry = self.inner.registry.lock();
        let instance = registry.instances.remove_by_id(instance_id)?;
        if let Some(object) = &instance.object {
            registry.unbind_type(object);
        }
        Ok(instance)
    }

    #[must_use]
    pub fn parent(&self) -> Option<Container> {
        self.inner.parent.read().clone()
    }

    /// Replaces the parent searched by lookups missing here.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::ParentCycle`] if this container is `parent` or one of its ancestors.
    pub fn set_parent(&self, parent: Option<Container>) -> Result<(), RegistryErrorKind> {
        let mut ancestor = parent.clone();
        while let Some(container) = ancestor {
            if container.ptr_eq(self) {
                let err = RegistryErrorKind::ParentCycle { id: self.id() };
                error!("{}", err);
                return Err(err);
            }
            ancestor = container.parent();
        }

        *self.inner.parent.write() = parent;
        Ok(())
    }

    /// Loaded configuration document.
    #[must_use]
    pub fn config(&self) -> Config {
        self.inner.registry.lock().config.clone()
    }

    /// Configuration of an instance, see [`Config::find`].
    #[must_use]
    pub fn instance_config(&self, instance_id: &InstanceId) -> Option<InstanceConfig> {
        let registry = self.inner.registry.lock();
        let type_id = registry
            .instances
            .get(instance_id)
            .map(|instance| instance.type_id.clone())
            .unwrap_or_default();
        registry.config.find(&type_id, instance_id).cloned()
    }

    /// Snapshot of the instances and type bindings, for diagnostics.
    #[must_use]
    pub fn dump(&self) -> Dump {
        let registry = self.inner.registry.lock();
        Dump {
            instances: registry
                .instances
                .map
                .values()
                .map(|instance| DumpedInstance {
                    type_id: instance.type_id.clone(),
                    instance_id: instance.instance_id.clone(),
                    state: instance.state,
                    created: instance.object.is_some(),
                })
                .collect(),
            types: registry
                .types
                .iter()
                .map(|(capability, object)| (*capability, object.name()))
                .collect(),
        }
    }

    /// Sets the state of `instance` and of its stored record.
    pub(crate) fn set_state(&self, instance: &mut Instance, state: State) {
        instance.state = state;
        match self.inner.registry.lock().instances.get_mut(&instance.instance_id) {
            Ok(stored) => stored.state = state,
            Err(_) => debug!(instance_id = %instance.instance_id, %state, "State of a removed instance"),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("hooks", &self.inner.hooks)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct DumpedInstance {
    pub type_id: TypeId,
    pub instance_id: InstanceId,
    pub state: State,
    pub created: bool,
}

/// Instances and type bindings of a container.
#[derive(Clone, Debug)]
pub struct Dump {
    pub instances: Vec<DumpedInstance>,
    /// Bound capability → type name of the object.
    pub types: Vec<(CapabilityId, &'static str)>,
}

impl fmt::Display for Dump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instances - {}:", self.instances.len())?;
        for instance in &self.instances {
            write!(f, " {}", instance.instance_id)?;
            if !instance.type_id.is_empty() && !instance.instance_id.is_default_of(&instance.type_id) {
                write!(f, " ({})", instance.type_id)?;
            }
            write!(f, " [{}]", instance.state)?;
        }
        write!(f, "; types - {}:", self.types.len())?;
        for (capability, name) in &self.types {
            write!(f, " {} -> {}", capability.short_name(), short_type_name(name))?;
        }
        Ok(())
    }
}

fn short_type_name(name: &str) -> String {
    let (path, generics) = name.split_once('<').map_or((name, ""), |(path, rest)| (path, rest));
    let short = path.rsplit_once("::").map_or(path, |(_, short)| short);
    if generics.is_empty() {
        String::from(short)
    } else {
        alloc::format!("{short}<{generics}")
    }
}
