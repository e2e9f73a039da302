use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
use tracing::{debug, debug_span, warn};

use crate::{ids::InstanceId, instance::Instance, Container};

/// Execution order computed from the explicit dependencies of the registered instances.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Instance ids grouped by level. Every dependency of a level-`k` instance is in a level below `k`.
    /// Ids inside a level are sorted, but callers shouldn't rely on that.
    pub levels: Vec<Vec<InstanceId>>,
    /// Every instance exactly once: the leveled instances first, then the unresolved ones.
    pub order: Vec<Instance>,
    /// Instances in a dependency cycle or depending on an instance that doesn't exist or can't be leveled.
    pub unresolved: Vec<Instance>,
}

impl Resolution {
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Instance ids of [`Self::order`].
    #[must_use]
    pub fn ids(&self) -> Vec<&InstanceId> {
        self.order.iter().map(|instance| &instance.instance_id).collect()
    }
}

/// Sorts `instances` into dependency levels.
///
/// An instance is placed in the first level after all of its dependencies were placed.
/// Unknown dependency ids are never satisfied, so their dependents end up unresolved along with cycle members.
#[must_use]
pub fn resolve(instances: Vec<Instance>) -> Resolution {
    let mut by_id: BTreeMap<InstanceId, Instance> = BTreeMap::new();
    for instance in instances {
        by_id.insert(instance.instance_id.clone(), instance);
    }

    let mut dependents: BTreeMap<&InstanceId, Vec<&InstanceId>> = BTreeMap::new();
    let mut pending: BTreeMap<&InstanceId, usize> = BTreeMap::new();
    let mut blocked: BTreeSet<&InstanceId> = BTreeSet::new();

    for (id, instance) in &by_id {
        let dependencies: BTreeSet<&InstanceId> = instance.dependencies.values().collect();
        for dependency in &dependencies {
            if by_id.contains_key(*dependency) {
                dependents.entry(*dependency).or_default().push(id);
            } else {
                debug!(instance_id = %id, dependency = %dependency, "Unknown dependency");
                blocked.insert(id);
            }
        }
        pending.insert(id, dependencies.len());
    }

    let mut levels: Vec<Vec<InstanceId>> = Vec::new();
    let mut current: Vec<&InstanceId> = pending
        .iter()
        .filter(|(id, count)| **count == 0 && !blocked.contains(*id))
        .map(|(id, _)| *id)
        .collect();

    while !current.is_empty() {
        let mut next = BTreeSet::new();
        for id in &current {
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 && !blocked.contains(dependent) {
                        next.insert(*dependent);
                    }
                }
            }
        }
        levels.push(current.iter().map(|id| (*id).clone()).collect());
        current = next.into_iter().collect();
    }

    let placed: BTreeSet<&InstanceId> = levels.iter().flatten().collect();
    let unresolved_ids: Vec<InstanceId> = by_id.keys().filter(|id| !placed.contains(id)).cloned().collect();

    let mut order = Vec::with_capacity(by_id.len());
    for id in levels.iter().flatten() {
        if let Some(instance) = by_id.get(id) {
            order.push(instance.clone());
        }
    }
    let mut unresolved = Vec::with_capacity(unresolved_ids.len());
    for id in &unresolved_ids {
        if let Some(instance) = by_id.remove(id) {
            order.push(instance.clone());
            unresolved.push(instance);
        }
    }

    Resolution {
        levels,
        order,
        unresolved,
    }
}

impl Container {
    /// Computes the execution order of the instances registered right now.
    ///
    /// Only explicit instance dependencies are ordered by. A dependency an instance finds by capability
    /// while being injected doesn't move it, so it may be injected with an instance that starts after it.
    #[must_use]
    pub fn resolve(&self) -> Resolution {
        let span = debug_span!("resolve", container = self.id());
        let _guard = span.enter();

        let snapshot: Vec<Instance> = self.inner.registry.lock().instances.map.values().cloned().collect();
        let resolution = resolve(snapshot);

        if !resolution.is_complete() {
            let ids: Vec<&str> = resolution.unresolved.iter().map(|instance| instance.instance_id.as_str()).collect();
            warn!(unresolved = ?ids, "Instances with unresolved dependencies are ordered last");
        }
        debug!(levels = resolution.levels.len(), instances = resolution.order.len(), "Resolved");

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::resolve;
    use crate::{ids::InstanceId, instance::Instance};

    use alloc::{vec, vec::Vec};

    fn position(order: &[Instance], id: &str) -> usize {
        order.iter().position(|instance| instance.instance_id.as_str() == id).unwrap()
    }

    fn ids(instances: &[Instance]) -> Vec<&str> {
        instances.iter().map(|instance| instance.instance_id.as_str()).collect()
    }

    #[test]
    fn test_acyclic_order() {
        let resolution = resolve(vec![
            Instance::new("svc", "svc").with_dependency("log", "log").with_dependency("db", "db"),
            Instance::new("db", "db").with_dependency("cfg", "cfg"),
            Instance::new("log", "log").with_dependency("cfg", "cfg"),
            Instance::new("cfg", "cfg"),
            Instance::new("metrics", "metrics"),
        ]);

        assert!(resolution.is_complete());
        assert_eq!(resolution.order.len(), 5);
        assert_eq!(
            resolution.levels,
            [
                vec![InstanceId::from("cfg"), InstanceId::from("metrics")],
                vec![InstanceId::from("db"), InstanceId::from("log")],
                vec![InstanceId::from("svc")],
            ]
        );

        for instance in &resolution.order {
            for dependency in instance.dependencies.values() {
                assert!(position(&resolution.order, dependency.as_str()) < position(&resolution.order, instance.instance_id.as_str()));
            }
        }
    }

    #[test]
    fn test_diamond_is_placed_after_longest_path() {
        let resolution = resolve(vec![
            Instance::new("a", "a"),
            Instance::new("b", "b").with_dependency("a", "a"),
            Instance::new("c", "c").with_dependency("b", "b"),
            Instance::new("d", "d").with_dependency("a", "a").with_dependency("c", "c"),
        ]);

        assert_eq!(ids(&resolution.order), ["a", "b", "c", "d"]);
        assert_eq!(resolution.levels.len(), 4);
    }

    #[test]
    fn test_cycle_members_are_unresolved() {
        let resolution = resolve(vec![
            Instance::new("cfg", "cfg"),
            Instance::new("a", "a").with_dependency("b", "b"),
            Instance::new("b", "b").with_dependency("a", "a").with_dependency("cfg", "cfg"),
            Instance::new("c", "c").with_dependency("a", "a"),
        ]);

        assert_eq!(resolution.order.len(), 4);
        assert_eq!(ids(&resolution.order)[0], "cfg");
        assert_eq!(ids(&resolution.unresolved), ["a", "b", "c"]);
        assert!(!resolution.is_complete());
    }

    #[test]
    fn test_self_dependency() {
        let resolution = resolve(vec![Instance::new("a", "a").with_dependency("me", "a"), Instance::new("b", "b")]);

        assert_eq!(ids(&resolution.order), ["b", "a"]);
        assert_eq!(ids(&resolution.unresolved), ["a"]);
    }

    #[test]
    fn test_unknown_dependency() {
        let resolution = resolve(vec![
            Instance::new("a", "a").with_dependency("ghost", "ghost"),
            Instance::new("b", "b").with_dependency("a", "a"),
        ]);

        assert!(resolution.levels.is_empty());
        assert_eq!(ids(&resolution.unresolved), ["a", "b"]);
        assert_eq!(resolution.order.len(), 2);
    }

    #[test]
    fn test_duplicate_dependency_fields() {
        let resolution = resolve(vec![
            Instance::new("a", "a"),
            Instance::new("b", "b").with_dependency("primary", "a").with_dependency("fallback", "a"),
        ]);

        assert!(resolution.is_complete());
        assert_eq!(ids(&resolution.order), ["a", "b"]);
    }

    #[test]
    fn test_empty() {
        let resolution = resolve(Vec::new());
        assert!(resolution.order.is_empty());
        assert!(resolution.levels.is_empty());
    }
}
