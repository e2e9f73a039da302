use alloc::sync::Arc;

use crate::{
    any::Capabilities,
    ids::{InstanceId, TypeId},
    inject::Injectable,
    Container,
};

/// A component managed by the container.
///
/// Lifecycle steps and hooks are optional capabilities: a component implements only the narrow traits
/// it needs ([`Creator`], [`Starter`], ...) and exposes each of them by overriding the matching `as_*` method,
/// for example `fn as_starter(&self) -> Option<&dyn Starter> { Some(self) }`.
/// The container checks these methods before every step and skips the ones returning `None`.
///
/// Components are shared between the container and every object injected with them,
/// so lifecycle methods take `&self` and mutable state lives behind interior mutability.
pub trait Component: Send + Sync + 'static {
    /// Publishes additional capabilities of this component, usually trait objects it implements:
    /// `capabilities.insert(this.clone() as Arc<dyn Logger>);`
    ///
    /// The concrete type is always published.
    #[inline]
    fn provide(this: &Arc<Self>, capabilities: &mut Capabilities)
    where
        Self: Sized,
    {
        let _ = (this, capabilities);
    }

    #[inline]
    fn as_container_binder(&self) -> Option<&dyn ContainerBinder> {
        None
    }

    #[inline]
    fn as_identity_binder(&self) -> Option<&dyn IdentityBinder> {
        None
    }

    #[inline]
    fn as_creator(&self) -> Option<&dyn Creator> {
        None
    }

    #[inline]
    fn as_injectable(&self) -> Option<&dyn Injectable> {
        None
    }

    #[inline]
    fn as_injected(&self) -> Option<&dyn Injected> {
        None
    }

    #[inline]
    fn as_after_all_injected(&self) -> Option<&dyn AfterAllInjected> {
        None
    }

    #[inline]
    fn as_starter(&self) -> Option<&dyn Starter> {
        None
    }

    #[inline]
    fn as_after_all_started(&self) -> Option<&dyn AfterAllStarted> {
        None
    }

    #[inline]
    fn as_before_all_stop(&self) -> Option<&dyn BeforeAllStop> {
        None
    }

    #[inline]
    fn as_stopper(&self) -> Option<&dyn Stopper> {
        None
    }

    #[inline]
    fn as_destroyer(&self) -> Option<&dyn Destroyer> {
        None
    }

    #[inline]
    fn as_after_all_destroyed(&self) -> Option<&dyn AfterAllDestroyed> {
        None
    }
}

/// Receives a back-reference to the container right after construction.
///
/// Keep [`Container::downgrade`] rather than a clone of the container,
/// otherwise the component and the container keep each other alive.
pub trait ContainerBinder {
    fn bind_container(&self, container: &Container);
}

/// Receives the ids the component was registered under.
pub trait IdentityBinder {
    fn bind_identity(&self, type_id: &TypeId, instance_id: &InstanceId);
}

pub trait Creator {
    /// Called once after construction. The container can be used to look up instances created earlier.
    fn create(&self, container: &Container) -> anyhow::Result<()>;
}

/// Called right after the fields of this component were injected.
pub trait Injected {
    fn injected(&self, container: &Container) -> anyhow::Result<()>;
}

/// Called after every created instance was injected, if no injection failed.
pub trait AfterAllInjected {
    fn after_all_injected(&self, container: &Container);
}

pub trait Starter {
    /// `ignore` is the policy the container was started with, for components driving their own children.
    fn start(&self, ignore: bool) -> anyhow::Result<()>;
}

pub trait AfterAllStarted {
    fn after_all_started(&self, container: &Container);
}

pub trait BeforeAllStop {
    fn before_all_stop(&self, container: &Container);
}

pub trait Stopper {
    fn stop(&self, ignore: bool) -> anyhow::Result<()>;
}

pub trait Destroyer {
    fn destroy(&self, ignore: bool) -> anyhow::Result<()>;
}

pub trait AfterAllDestroyed {
    fn after_all_destroyed(&self, container: &Container);
}
