use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::fmt;
use parking_lot::RwLock;

use crate::{
    ids::{InstanceId, TypeId},
    instance::Instance,
    Container,
};

/// Observational callback fired around a lifecycle transition.
pub type Hook = Arc<dyn Fn(&Instance, &Container) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Create,
    Start,
    Stop,
    Destroy,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Create => "create",
            Transition::Start => "start",
            Transition::Stop => "stop",
            Transition::Destroy => "destroy",
        })
    }
}

/// Optional before/after callbacks of the four lifecycle phases.
#[derive(Clone, Default)]
pub struct Hooks {
    before_create: Option<Hook>,
    after_create: Option<Hook>,
    before_start: Option<Hook>,
    after_start: Option<Hook>,
    before_stop: Option<Hook>,
    after_stop: Option<Hook>,
    before_destroy: Option<Hook>,
    after_destroy: Option<Hook>,
}

macro_rules! hook_setters {
    ($($name:ident),+ $(,)?) => {
        $(
            #[inline]
            #[must_use]
            pub fn $name(mut self, hook: impl Fn(&Instance, &Container) + Send + Sync + 'static) -> Self {
                self.$name = Some(Arc::new(hook));
                self
            }
        )+
    };
}

impl Hooks {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    hook_setters!(
        before_create,
        after_create,
        before_start,
        after_start,
        before_stop,
        after_stop,
        before_destroy,
        after_destroy,
    );

    fn before(&self, transition: Transition) -> Option<&Hook> {
        match transition {
            Transition::Create => self.before_create.as_ref(),
            Transition::Start => self.before_start.as_ref(),
            Transition::Stop => self.before_stop.as_ref(),
            Transition::Destroy => self.before_destroy.as_ref(),
        }
    }

    fn after(&self, transition: Transition) -> Option<&Hook> {
        match transition {
            Transition::Create => self.after_create.as_ref(),
            Transition::Start => self.after_start.as_ref(),
            Transition::Stop => self.after_stop.as_ref(),
            Transition::Destroy => self.after_destroy.as_ref(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_create", &self.before_create.is_some())
            .field("after_create", &self.after_create.is_some())
            .field("before_start", &self.before_start.is_some())
            .field("after_start", &self.after_start.is_some())
            .field("before_stop", &self.before_stop.is_some())
            .field("after_stop", &self.after_stop.is_some())
            .field("before_destroy", &self.before_destroy.is_some())
            .field("after_destroy", &self.after_destroy.is_some())
            .finish()
    }
}

/// Hooks registered by type id and by instance id, in registration order.
#[derive(Default)]
pub struct HookRegistry {
    by_type: RwLock<BTreeMap<TypeId, Vec<Hooks>>>,
    by_instance: RwLock<BTreeMap<InstanceId, Vec<Hooks>>>,
}

impl HookRegistry {
    pub fn add_type_hooks(&self, type_id: TypeId, hooks: Hooks) {
        self.by_type.write().entry(type_id).or_default().push(hooks);
    }

    pub fn add_instance_hooks(&self, instance_id: InstanceId, hooks: Hooks) {
        self.by_instance.write().entry(instance_id).or_default().push(hooks);
    }

    pub fn remove_type_hooks(&self, type_id: &TypeId) -> Vec<Hooks> {
        self.by_type.write().remove(type_id).unwrap_or_default()
    }

    pub fn remove_instance_hooks(&self, instance_id: &InstanceId) -> Vec<Hooks> {
        self.by_instance.write().remove(instance_id).unwrap_or_default()
    }

    #[must_use]
    pub fn type_hooks(&self, type_id: &TypeId) -> Vec<Hooks> {
        self.by_type.read().get(type_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn instance_hooks(&self, instance_id: &InstanceId) -> Vec<Hooks> {
        self.by_instance.read().get(instance_id).cloned().unwrap_or_default()
    }

    fn collect(&self, instance: &Instance, transition: Transition, before: bool) -> (Vec<Hook>, Vec<Hook>) {
        let pick = |hooks: &Vec<Hooks>| -> Vec<Hook> {
            hooks
                .iter()
                .filter_map(|hooks| if before { hooks.before(transition) } else { hooks.after(transition) })
                .cloned()
                .collect()
        };

        let by_type = self.by_type.read().get(&instance.type_id).map(pick).unwrap_or_default();
        let by_instance = self.by_instance.read().get(&instance.instance_id).map(pick).unwrap_or_default();
        (by_type, by_instance)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("types", &self.by_type.read().len())
            .field("instances", &self.by_instance.read().len())
            .finish()
    }
}

impl Container {
    /// Hooks of this container.
    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Fires the before-hooks of `transition`: type hooks, then instance hooks.
    ///
    /// Hooks are cloned out of the registry first, so they may register more hooks.
    pub(crate) fn fire_before(&self, transition: Transition, instance: &Instance) {
        let (by_type, by_instance) = self.inner.hooks.collect(instance, transition, true);
        for hook in by_type.iter().chain(&by_instance) {
            hook(instance, self);
        }
    }

    /// Fires the after-hooks of `transition`: instance hooks, then type hooks.
    pub(crate) fn fire_after(&self, transition: Transition, instance: &Instance) {
        let (by_type, by_instance) = self.inner.hooks.collect(instance, transition, false);
        for hook in by_instance.iter().chain(&by_type) {
            hook(instance, self);
        }
    }
}
