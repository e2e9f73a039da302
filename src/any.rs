use alloc::{boxed::Box, collections::BTreeMap, sync::Arc, vec::Vec};
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt,
};

/// Stable identifier of a capability: either a concrete component type or a trait object type
/// (`dyn Logger`) that components publish through [`crate::Component::provide`].
#[derive(Clone, Copy)]
pub struct CapabilityId {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for CapabilityId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CapabilityId {}

impl PartialOrd for CapabilityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CapabilityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl CapabilityId {
    #[inline]
    #[must_use]
    pub fn new<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self::new::<T>(type_name::<T>())
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit_once("::").map_or(self.name, |(_, name)| name)
    }
}

/// Capabilities published by one live object.
///
/// Every entry holds an `Arc<T>` pointing into the same allocation as the object itself,
/// so lookups by any capability preserve identity.
#[derive(Default)]
pub struct Capabilities {
    map: BTreeMap<CapabilityId, Box<dyn Any + Send + Sync>>,
}

impl Capabilities {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    /// Publishes `value` under the capability `T`, returning the previous value if any.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        self.map
            .insert(CapabilityId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast::<Arc<T>>().ok())
            .map(|boxed| *boxed)
    }

    #[must_use]
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&CapabilityId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, capability: &CapabilityId) -> bool {
        self.map.contains_key(capability)
    }

    #[inline]
    #[must_use]
    pub fn ids(&self) -> Vec<CapabilityId> {
        self.map.keys().copied().collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, CapabilityId};

    use alloc::sync::Arc;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn test_capability_id_names() {
        let id = CapabilityId::of::<English>();
        assert_eq!(id.short_name(), "English");
        assert_eq!(id, CapabilityId::of::<English>());
        assert_ne!(id, CapabilityId::of::<dyn Greeter>());
    }

    #[test]
    fn test_trait_capability_keeps_identity() {
        let english = Arc::new(English);

        let mut capabilities = Capabilities::new();
        capabilities.insert(english.clone());
        capabilities.insert(english.clone() as Arc<dyn Greeter>);

        let greeter = capabilities.get::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert_eq!(Arc::as_ptr(&greeter).cast::<()>(), Arc::as_ptr(&english).cast::<()>());
        assert!(Arc::ptr_eq(&capabilities.get::<English>().unwrap(), &english));
        assert_eq!(capabilities.len(), 2);
    }

    #[test]
    fn test_missing_capability() {
        let capabilities = Capabilities::new();
        assert!(capabilities.get::<dyn Greeter>().is_none());
        assert!(!capabilities.contains(&CapabilityId::of::<English>()));
    }
}
