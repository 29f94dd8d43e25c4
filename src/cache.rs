use std::{collections::VecDeque, mem};

use crate::{
    any::{self, RcAny, TypeInfo},
    finalizer::BoxedCloneFinalizer,
};

/// Instances created for one container (singletons) or one scope (scoped services).
///
/// Holds at most one instance per service. Scope caches also keep the resolved instances
/// that have a finalizer, in creation order.
#[derive(Default)]
pub(crate) struct Cache {
    map: any::Map,
    resolved: ResolvedSet,
}

impl Cache {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, service: &TypeInfo) -> Option<RcAny> {
        self.map.get(service).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, service: &TypeInfo) -> bool {
        self.map.contains_key(service)
    }

    /// Stores the instance of `service`.
    ///
    /// # Errors
    /// Returns the already cached instance if there is one, the passed instance is discarded.
    pub(crate) fn add(&mut self, service: TypeInfo, dependency: RcAny) -> Result<(), RcAny> {
        use std::collections::btree_map::Entry::{Occupied, Vacant};

        match self.map.entry(service) {
            Occupied(entry) => Err(entry.get().clone()),
            Vacant(entry) => {
                entry.insert(dependency);
                Ok(())
            }
        }
    }

    #[inline]
    pub(crate) fn remove(&mut self, service: &TypeInfo) -> Option<RcAny> {
        self.map.remove(service)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn push_resolved(&mut self, resolved: Resolved) {
        self.resolved.push(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn take_resolved_set(&mut self) -> ResolvedSet {
        mem::take(&mut self.resolved)
    }
}

pub(crate) struct Resolved {
    pub(crate) service: TypeInfo,
    pub(crate) dependency: RcAny,
    pub(crate) finalizer: BoxedCloneFinalizer,
}

#[derive(Default)]
pub(crate) struct ResolvedSet(pub(crate) VecDeque<Resolved>);

impl ResolvedSet {
    #[inline]
    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push_back(resolved);
    }

    /// Most recently resolved first.
    #[inline]
    pub(crate) fn pop_last(&mut self) -> Option<Resolved> {
        self.0.pop_back()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Cache, Resolved};
    use crate::{
        any::{RcAny, TypeInfo},
        finalizer::boxed_finalizer_factory,
    };

    struct Service(u8);

    #[test]
    fn test_add_keeps_first_instance() {
        let mut cache = Cache::new();
        let service = TypeInfo::of::<Service>();

        assert!(cache.get(&service).is_none());
        assert!(cache.add(service, Arc::new(Service(1))).is_ok());

        let existing = cache.add(service, Arc::new(Service(2))).unwrap_err();
        assert_eq!(existing.downcast::<Service>().unwrap().0, 1);
        assert_eq!(cache.get(&service).unwrap().downcast::<Service>().unwrap().0, 1);
        assert!(cache.contains(&service));
        assert_eq!(cache.len(), 1);

        assert!(cache.remove(&service).is_some());
        assert!(cache.add(service, Arc::new(Service(3))).is_ok());
    }

    #[test]
    fn test_resolved_set_is_lifo() {
        let mut cache = Cache::new();
        for val in 0..3u8 {
            let dependency: RcAny = Arc::new(Service(val));
            cache.push_resolved(Resolved {
                service: TypeInfo::of::<Service>(),
                dependency,
                finalizer: boxed_finalizer_factory(|_: Arc<Service>| Ok(())),
            });
        }

        let mut resolved = cache.take_resolved_set();
        assert!(cache.take_resolved_set().pop_last().is_none());

        let order: Vec<u8> = std::iter::from_fn(|| resolved.pop_last())
            .map(|resolved| resolved.dependency.downcast::<Service>().unwrap().0)
            .collect();
        assert_eq!(order, [2, 1, 0]);
    }
}
