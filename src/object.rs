use alloc::{sync::Arc, vec::Vec};
use core::{any::type_name, fmt};

use crate::{
    any::{Capabilities, CapabilityId},
    component::Component,
};

/// Shared handle to a live object.
///
/// Cloning the handle never copies the object: every clone and every capability looked up through it
/// points into the same allocation.
#[derive(Clone)]
pub struct Object {
    component: Option<Arc<dyn Component>>,
    capabilities: Arc<Capabilities>,
    name: &'static str,
    addr: usize,
}

impl Object {
    #[inline]
    #[must_use]
    pub fn new<C: Component>(component: C) -> Self {
        Self::from_arc(Arc::new(component))
    }

    #[must_use]
    pub fn from_arc<C: Component>(component: Arc<C>) -> Self {
        let addr = Arc::as_ptr(&component).cast::<()>() as usize;
        let mut capabilities = Capabilities::new();
        capabilities.insert(component.clone());
        C::provide(&component, &mut capabilities);

        Self {
            component: Some(component as Arc<dyn Component>),
            capabilities: Arc::new(capabilities),
            name: type_name::<C>(),
            addr,
        }
    }

    /// Wraps a plain value without lifecycle capabilities, published only as `T`.
    #[must_use]
    pub fn from_value<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let addr = Arc::as_ptr(&value).cast::<()>() as usize;
        let mut capabilities = Capabilities::new();
        capabilities.insert(value);

        Self {
            component: None,
            capabilities: Arc::new(capabilities),
            name: type_name::<T>(),
            addr,
        }
    }

    /// Type name of the wrapped component.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn component(&self) -> Option<&dyn Component> {
        self.component.as_deref()
    }

    /// Gets the object as capability `T`, a concrete type or a trait object it published.
    #[inline]
    #[must_use]
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.capabilities.get()
    }

    #[inline]
    #[must_use]
    pub fn provides(&self, capability: &CapabilityId) -> bool {
        self.capabilities.contains(capability)
    }

    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> Vec<CapabilityId> {
        self.capabilities.ids()
    }

    /// `true` if both handles point to the same object.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}
