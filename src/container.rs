use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info_span};

use crate::{
    any::TypeInfo,
    cache::Cache,
    errors::ResolveErrorKind,
    factory::{Factory, Lazy},
    instantiator::Provider,
    life::ServiceLife,
    overrides::Overrides,
    registry::{Registry, ServiceEntry},
    resolver::{Resolver, Trails},
    scope::{Scope, ScopeStack},
};

pub(crate) struct ContainerInner {
    pub(crate) registry: RwLock<Registry>,
    pub(crate) singletons: Mutex<Cache>,
    pub(crate) scopes: ScopeStack,
    pub(crate) trails: Trails,
}

/// Registry of services, cache of singletons and scope stacks of the threads that use it.
///
/// Cloning is cheap, every clone is a handle to the same container.
/// The container is registered as a singleton of itself, so services can depend on [`Container`].
/// A cached instance that holds a [`Container`] keeps the container alive,
/// [`Factory`] and [`Lazy`] hold it weakly.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::new();
        registry.set(ServiceEntry::container());

        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(registry),
                singletons: Mutex::new(Cache::new()),
                scopes: ScopeStack::default(),
                trails: Trails::default(),
            }),
        }
    }

    /// Registers `provider` as the recipe of `Dep`, replacing the previous registration if there's one.
    pub fn register<Dep: Send + Sync + 'static>(&self, provider: Provider<Dep>, life: ServiceLife) -> &Self {
        self.register_entry(ServiceEntry::new(provider, life))
    }

    /// Registers an entry built for an identifier known at runtime, see [`ServiceEntry::new_erased`].
    pub fn register_entry(&self, entry: ServiceEntry) -> &Self {
        let service = entry.service();
        let life = entry.life();

        let replaced = self.inner.registry.write().set(entry);
        // The instance of the replaced registration must not outlive it
        let evicted = self.inner.singletons.lock().remove(&service);

        if replaced.is_some() {
            debug!(service = %service, %life, "Registration replaced");
        } else {
            debug!(service = %service, %life, "Registered");
        }
        drop(evicted);
        self
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NotRegistered`] if `Dep` isn't registered.
    pub fn unregister<Dep: 'static>(&self) -> Result<(), ResolveErrorKind> {
        let service = TypeInfo::of::<Dep>();

        let removed = self.inner.registry.write().remove(&service)?;
        let evicted = self.inner.singletons.lock().remove(&service);
        debug!(service = %service, "Unregistered");

        drop((removed, evicted));
        Ok(())
    }

    #[inline]
    pub fn add_transient<Dep: Send + Sync + 'static>(&self, provider: Provider<Dep>) -> &Self {
        self.register(provider, ServiceLife::Transient)
    }

    #[inline]
    pub fn add_scoped<Dep: Send + Sync + 'static>(&self, provider: Provider<Dep>) -> &Self {
        self.register(provider, ServiceLife::Scoped)
    }

    #[inline]
    pub fn add_singleton<Dep: Send + Sync + 'static>(&self, provider: Provider<Dep>) -> &Self {
        self.register(provider, ServiceLife::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn is_registered<Dep: 'static>(&self) -> bool {
        self.is_registered_info(&TypeInfo::of::<Dep>())
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_registered_info(&self, service: &TypeInfo) -> bool {
        self.inner.registry.read().contains(service)
    }

    /// Resolves `Dep`, scoped services are resolved in the current scope of this thread.
    ///
    /// # Errors
    /// - [`ResolveErrorKind::NotRegistered`] if `Dep` or one of its dependencies isn't registered
    /// - [`ResolveErrorKind::CircularDependency`] if `Dep` depends on itself,
    ///   also when a constructor calls back into the container for a service under construction on this thread
    /// - [`ResolveErrorKind::NoActiveScope`] if a scoped service is requested without an entered scope
    /// - [`ResolveErrorKind::Unresolvable`] if a parameter has no value
    /// - [`ResolveErrorKind::Instantiate`] if a constructor fails
    #[inline]
    pub fn get<Dep: Send + Sync + 'static>(&self) -> Result<Arc<Dep>, ResolveErrorKind> {
        self.get_with(Overrides::new())
    }

    /// Resolves `Dep` with `overrides` taking precedence over its declared parameters.
    ///
    /// Overrides are ignored if a cached singleton or scoped instance of `Dep` exists.
    ///
    /// # Errors
    /// Same as [`Self::get`].
    pub fn get_with<Dep: Send + Sync + 'static>(&self, overrides: Overrides) -> Result<Arc<Dep>, ResolveErrorKind> {
        let span = info_span!("get", service = %TypeInfo::of::<Dep>());
        let _guard = span.enter();

        let scope = self.inner.scopes.get_current();
        Resolver::new(self, scope.as_ref()).resolve_typed(&overrides)
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NotRegistered`] if `Dep` isn't registered.
    pub fn get_factory<Dep: Send + Sync + 'static>(&self) -> Result<Factory<Dep>, ResolveErrorKind> {
        self.ensure_registered::<Dep>()?;
        Ok(Factory::new(self.downgrade(), None))
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NotRegistered`] if `Dep` isn't registered.
    pub fn get_lazy<Dep: Send + Sync + 'static>(&self) -> Result<Lazy<Dep>, ResolveErrorKind> {
        self.ensure_registered::<Dep>()?;
        Ok(Lazy::new(self.downgrade(), None))
    }

    /// Creates a scope without entering it.
    #[inline]
    #[must_use]
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Last entered scope of this thread.
    #[inline]
    #[must_use]
    pub fn current_scope(&self) -> Option<Scope> {
        self.inner.scopes.get_current()
    }

    /// Count of entered scopes of this thread.
    #[inline]
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.inner.scopes.depth()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn ensure_registered<Dep: 'static>(&self) -> Result<(), ResolveErrorKind> {
        if self.is_registered::<Dep>() {
            return Ok(());
        }

        let err = ResolveErrorKind::NotRegistered {
            service: TypeInfo::of::<Dep>(),
        };
        error!("{}", err);
        Err(err)
    }
}

impl Default for Container {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.inner.registry.read().len())
            .field("singletons", &self.inner.singletons.lock().len())
            .finish_non_exhaustive()
    }
}

/// Handle that doesn't keep the container alive.
#[derive(Clone)]
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
