use std::{collections::BTreeMap, sync::Arc};

use tracing::error;

use crate::{
    any::TypeInfo,
    config::Config,
    container::Container,
    errors::ResolveErrorKind,
    finalizer::BoxedCloneFinalizer,
    instantiator::{BoxedCloneInstantiator, ParameterDescriptor, Provider},
    life::ServiceLife,
};

/// Registration record of a service. Immutable once registered.
pub struct ServiceEntry {
    service: TypeInfo,
    provides: TypeInfo,
    life: ServiceLife,
    pub(crate) parameters: Box<[ParameterDescriptor]>,
    pub(crate) instantiator: BoxedCloneInstantiator,
    pub(crate) finalizer: Option<BoxedCloneFinalizer>,
    pub(crate) config: Config,
}

impl ServiceEntry {
    #[inline]
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(provider: Provider<T>, life: ServiceLife) -> Self {
        Self::new_erased(TypeInfo::of::<T>(), provider, life)
    }

    /// Registers `provider` under an identifier known only at runtime.
    ///
    /// The instance built by `provider` is checked against `service` on every resolution
    /// and rejected with [`ResolveErrorKind::IncorrectType`] if its type differs.
    #[must_use]
    pub fn new_erased<T: Send + Sync + 'static>(service: TypeInfo, provider: Provider<T>, life: ServiceLife) -> Self {
        let Provider {
            parameters,
            instantiator,
            finalizer,
            config,
            ..
        } = provider;

        Self {
            service,
            provides: TypeInfo::of::<T>(),
            life,
            parameters: parameters.into_boxed_slice(),
            instantiator,
            finalizer,
            config,
        }
    }

    pub(crate) fn container() -> Self {
        Self::new(Provider::<Container>::container(), ServiceLife::Singleton)
    }

    #[inline]
    #[must_use]
    pub const fn service(&self) -> TypeInfo {
        self.service
    }

    /// Type of the instances the registered provider builds.
    #[inline]
    #[must_use]
    pub const fn provides(&self) -> TypeInfo {
        self.provides
    }

    #[inline]
    #[must_use]
    pub const fn life(&self) -> ServiceLife {
        self.life
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> Config {
        self.config
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("service", &self.service)
            .field("provides", &self.provides)
            .field("life", &self.life)
            .field("parameters", &self.parameters.iter().map(|parameter| parameter.name).collect::<Vec<_>>())
            .field("finalizer", &self.finalizer.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<TypeInfo, Arc<ServiceEntry>>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Returns the replaced entry if the service was already registered.
    #[inline]
    pub(crate) fn set(&mut self, entry: ServiceEntry) -> Option<Arc<ServiceEntry>> {
        self.entries.insert(entry.service, Arc::new(entry))
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NotRegistered`] if the service isn't registered.
    pub(crate) fn get(&self, service: &TypeInfo) -> Result<Arc<ServiceEntry>, ResolveErrorKind> {
        self.entries.get(service).cloned().ok_or_else(|| not_registered(*service))
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NotRegistered`] if the service isn't registered.
    pub(crate) fn remove(&mut self, service: &TypeInfo) -> Result<Arc<ServiceEntry>, ResolveErrorKind> {
        self.entries.remove(service).ok_or_else(|| not_registered(*service))
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, service: &TypeInfo) -> bool {
        self.entries.contains_key(service)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn not_registered(service: TypeInfo) -> ResolveErrorKind {
    let err = ResolveErrorKind::NotRegistered { service };
    error!("{}", err);
    err
}
