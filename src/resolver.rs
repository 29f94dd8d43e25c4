use std::{
    collections::HashMap,
    sync::Arc,
    thread::{self, ThreadId},
};

use parking_lot::Mutex;
use tracing::{debug, debug_span, error};

use crate::{
    any::{RcAny, TypeInfo},
    container::Container,
    errors::ResolveErrorKind,
    inject::ParameterKind,
    instantiator::{Argument, Instantiation},
    life::ServiceLife,
    overrides::Overrides,
    registry::ServiceEntry,
    scope::Scope,
    service::Service as _,
};

/// Services under construction on every thread, in the order their construction started.
///
/// Shared by all resolutions of a container, so a constructor that calls back into the container
/// for a service it's building gets a cycle error instead of recursing.
#[derive(Default)]
pub(crate) struct Trails {
    trails: Mutex<HashMap<ThreadId, Vec<TypeInfo>>>,
}

impl Trails {
    /// Marks `service` as under construction on this thread until the guard is dropped.
    ///
    /// # Errors
    /// Returns the trail of this thread if `service` is already under construction on it.
    fn enter(&self, service: TypeInfo) -> Result<TrailGuard<'_>, Box<[TypeInfo]>> {
        let mut trails = self.trails.lock();
        let trail = trails.entry(thread::current().id()).or_default();
        if trail.contains(&service) {
            return Err(trail.clone().into_boxed_slice());
        }
        trail.push(service);

        Ok(TrailGuard { trails: self })
    }
}

/// Pops the service it was created for, also when the construction fails or panics.
struct TrailGuard<'a> {
    trails: &'a Trails,
}

impl Drop for TrailGuard<'_> {
    fn drop(&mut self) {
        let thread_id = thread::current().id();
        let mut trails = self.trails.trails.lock();

        if let Some(trail) = trails.get_mut(&thread_id) {
            trail.pop();
            if trail.is_empty() {
                trails.remove(&thread_id);
            }
        }
    }
}

/// Builds one requested service and its dependency graph.
///
/// Scoped services are resolved in the passed scope only.
/// Overrides apply to the requested service, its dependencies are resolved without them.
pub(crate) struct Resolver<'a> {
    container: &'a Container,
    scope: Option<&'a Scope>,
}

impl<'a> Resolver<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(container: &'a Container, scope: Option<&'a Scope>) -> Self {
        Self { container, scope }
    }

    pub(crate) fn resolve_typed<Dep: Send + Sync + 'static>(self, overrides: &Overrides) -> Result<Arc<Dep>, ResolveErrorKind> {
        let service = TypeInfo::of::<Dep>();
        let (dependency, entry) = self.resolve_entry(service, overrides)?;

        dependency.downcast::<Dep>().map_err(|_| {
            let err = ResolveErrorKind::IncorrectType {
                expected: service,
                actual: entry.provides(),
            };
            error!("{}", err);
            err
        })
    }

    #[inline]
    pub(crate) fn resolve(&self, service: TypeInfo, overrides: &Overrides) -> Result<RcAny, ResolveErrorKind> {
        self.resolve_entry(service, overrides).map(|(dependency, _)| dependency)
    }

    fn resolve_entry(&self, service: TypeInfo, overrides: &Overrides) -> Result<(RcAny, Arc<ServiceEntry>), ResolveErrorKind> {
        let span = debug_span!("resolve", service = %service);
        let _guard = span.enter();

        let _trail = self.container.inner.trails.enter(service).map_err(|trail| {
            let err = ResolveErrorKind::CircularDependency { service, trail };
            error!("{}", err);
            err
        })?;

        let entry = self.container.inner.registry.read().get(&service)?;
        let cache_provides = entry.config().cache_provides;

        match entry.life() {
            ServiceLife::Singleton if cache_provides => {
                let cached = self.container.inner.singletons.lock().get(&service);
                if let Some(dependency) = cached {
                    debug!("Found in singleton cache");
                    return Ok((dependency, entry));
                }
            }
            ServiceLife::Scoped => {
                let scope = self.scope(service)?;
                match scope.cached(service)? {
                    Some(dependency) if cache_provides => {
                        debug!("Found in scope cache");
                        return Ok((dependency, entry));
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        debug!(life = %entry.life(), "Not found in cache");

        let arguments = self.arguments(&entry, overrides)?;
        let dependency = entry.instantiator.call(Instantiation {
            container: self.container.clone(),
            service,
            arguments,
        })?;

        if (*dependency).type_id() != service.id {
            let err = ResolveErrorKind::IncorrectType {
                expected: service,
                actual: entry.provides(),
            };
            error!("{}", err);
            return Err(err);
        }

        let dependency = match entry.life() {
            ServiceLife::Transient => dependency,
            ServiceLife::Singleton if !cache_provides => dependency,
            ServiceLife::Singleton => {
                let added = self.container.inner.singletons.lock().add(service, dependency.clone());
                match added {
                    Ok(()) => dependency,
                    Err(existing) => {
                        debug!("Resolved concurrently, the cached instance is kept");
                        existing
                    }
                }
            }
            ServiceLife::Scoped => self
                .scope(service)?
                .store(service, dependency, entry.finalizer.clone(), cache_provides)?,
        };

        debug!("Resolved");
        Ok((dependency, entry))
    }

    fn scope(&self, service: TypeInfo) -> Result<&'a Scope, ResolveErrorKind> {
        self.scope.ok_or_else(|| {
            let err = ResolveErrorKind::NoActiveScope { service };
            error!("{}", err);
            err
        })
    }

    fn arguments(&self, entry: &ServiceEntry, overrides: &Overrides) -> Result<Vec<Argument>, ResolveErrorKind> {
        let mut arguments = Vec::with_capacity(entry.parameters.len());

        for parameter in entry.parameters.iter() {
            let value = if let Some(value) = overrides.get(parameter.name) {
                debug!(parameter = parameter.name, "Overridden");
                value
            } else {
                match parameter.kind {
                    ParameterKind::Deferred { make, .. } => make(self.container.downgrade(), self.scope.map(Scope::downgrade)),
                    ParameterKind::Dependency(dependency) if self.container.is_registered_info(&dependency) => {
                        self.resolve(dependency, &Overrides::new())?
                    }
                    ParameterKind::Dependency(_) => match &parameter.default {
                        Some(default) => default.clone(),
                        None => {
                            let err = ResolveErrorKind::Unresolvable {
                                parameter: parameter.name,
                                service: entry.service(),
                            };
                            error!("{}", err);
                            return Err(err);
                        }
                    },
                }
            };

            arguments.push(Argument {
                name: parameter.name,
                value,
            });
        }

        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::Arc,
    };

    use tracing_test::traced_test;

    use crate::{Container, Factory, InstantiatorResult, Provider, ResolveErrorKind, ServiceEntry, ServiceLife, TypeInfo};

    struct Broken;
    struct Recursive;
    struct Session;

    fn is_trail_empty(container: &Container) -> bool {
        container.inner.trails.trails.lock().is_empty()
    }

    #[test]
    #[traced_test]
    fn test_trail_popped_on_panic() {
        let container = Container::new();
        container.add_transient(Provider::new([], || -> InstantiatorResult<Broken> { panic!("constructor panicked") }));

        for _ in 0..2 {
            let result = panic::catch_unwind(AssertUnwindSafe(|| container.get::<Broken>()));
            assert!(result.is_err());
            assert!(is_trail_empty(&container));
        }
    }

    #[test]
    #[traced_test]
    fn test_trail_popped_on_reentrant_cycle() {
        let container = Container::new();
        container.add_transient(Provider::new(["make"], |make: Factory<Recursive>| -> InstantiatorResult<Recursive> {
            make.call().map_err(anyhow::Error::from)?;
            Ok(Recursive)
        }));

        assert!(matches!(container.get::<Recursive>(), Err(ResolveErrorKind::Instantiate { .. })));
        assert!(is_trail_empty(&container));
        assert!(logs_contain("Cyclic dependency detected: Recursive -> Recursive"));
    }

    #[test]
    #[traced_test]
    fn test_cached_instance_of_another_type() {
        let container = Container::new();
        container.register_entry(ServiceEntry::new_erased(
            TypeInfo::of::<Session>(),
            Provider::new([], || Ok(1u8)),
            ServiceLife::Singleton,
        ));
        let added = container.inner.singletons.lock().add(TypeInfo::of::<Session>(), Arc::new(2u8));
        assert!(added.is_ok());

        match container.get::<Session>() {
            Err(ResolveErrorKind::IncorrectType { expected, actual }) => {
                assert_eq!(expected, TypeInfo::of::<Session>());
                assert_eq!(actual, TypeInfo::of::<u8>());
            }
            _ => panic!("expected an incorrect type"),
        }
    }
}
