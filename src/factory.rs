use std::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    any::{RcAny, TypeInfo},
    container::WeakContainer,
    errors::ResolveErrorKind,
    inject::{Parameter, ParameterKind},
    overrides::Overrides,
    scope::WeakScope,
};

/// Deferred, repeatable resolution of `Dep`.
///
/// Every call resolves `Dep` again through the container it was created by,
/// using the current scope of the calling thread.
/// A factory injected by a scope resolution falls back to that scope while the thread has no current scope.
/// Holds the container and the scope weakly, so a factory stored in a service doesn't keep them alive.
pub struct Factory<Dep> {
    container: WeakContainer,
    scope: Option<WeakScope>,
    _marker: PhantomData<fn() -> Dep>,
}

impl<Dep> Clone for Factory<Dep> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<Dep: 'static> Debug for Factory<Dep> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Factory({})", TypeInfo::of::<Dep>())
    }
}

impl<Dep: Send + Sync + 'static> Factory<Dep> {
    #[inline]
    #[must_use]
    pub(crate) fn new(container: WeakContainer, scope: Option<WeakScope>) -> Self {
        Self {
            container,
            scope,
            _marker: PhantomData,
        }
    }

    /// # Errors
    /// Same as [`crate::Container::get`], plus [`ResolveErrorKind::ContainerDropped`].
    #[inline]
    pub fn call(&self) -> Result<Arc<Dep>, ResolveErrorKind> {
        self.call_with(Overrides::new())
    }

    /// # Errors
    /// Same as [`crate::Container::get_with`], plus [`ResolveErrorKind::ContainerDropped`].
    pub fn call_with(&self, overrides: Overrides) -> Result<Arc<Dep>, ResolveErrorKind> {
        resolve(&self.container, self.scope.as_ref(), overrides)
    }
}

fn resolve<Dep: Send + Sync + 'static>(
    container: &WeakContainer,
    scope: Option<&WeakScope>,
    overrides: Overrides,
) -> Result<Arc<Dep>, ResolveErrorKind> {
    let Some(container) = container.upgrade() else {
        let err = ResolveErrorKind::ContainerDropped {
            service: TypeInfo::of::<Dep>(),
        };
        error!("{}", err);
        return Err(err);
    };

    if container.current_scope().is_none() {
        let scope = scope.and_then(WeakScope::upgrade).filter(|scope| !scope.is_exited());
        if let Some(scope) = scope {
            debug!("Resolved in the injecting scope");
            return scope.get_with(overrides);
        }
    }
    container.get_with(overrides)
}

fn make_factory<Dep: Send + Sync + 'static>(container: WeakContainer, scope: Option<WeakScope>) -> RcAny {
    Arc::new(Factory::<Dep>::new(container, scope))
}

impl<Dep: Send + Sync + 'static> Parameter for Factory<Dep> {
    #[inline]
    fn kind() -> ParameterKind {
        ParameterKind::Deferred {
            service: TypeInfo::of::<Dep>(),
            make: make_factory::<Dep>,
        }
    }

    #[inline]
    fn expected() -> TypeInfo {
        TypeInfo::of::<Self>()
    }

    #[inline]
    fn from_argument(argument: RcAny) -> Result<Self, RcAny> {
        argument.downcast().map(Arc::unwrap_or_clone)
    }
}

/// Resolves `Dep` on first access and keeps the instance for every later access.
///
/// Clones share the resolved instance. Overrides are only applied by the access that resolves.
/// Picks the scope the same way as [`Factory`].
pub struct Lazy<Dep> {
    container: WeakContainer,
    scope: Option<WeakScope>,
    instance: Arc<Mutex<Option<Arc<Dep>>>>,
}

impl<Dep> Clone for Lazy<Dep> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            scope: self.scope.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl<Dep: 'static> Debug for Lazy<Dep> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Lazy({})", TypeInfo::of::<Dep>())
    }
}

impl<Dep: Send + Sync + 'static> Lazy<Dep> {
    #[inline]
    #[must_use]
    pub(crate) fn new(container: WeakContainer, scope: Option<WeakScope>) -> Self {
        Self {
            container,
            scope,
            instance: Arc::new(Mutex::new(None)),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.instance.lock().is_some()
    }

    /// # Errors
    /// Same as [`Factory::call`]. A failed resolution is retried on the next access.
    #[inline]
    pub fn get(&self) -> Result<Arc<Dep>, ResolveErrorKind> {
        self.get_with(Overrides::new())
    }

    /// # Errors
    /// Same as [`Factory::call_with`].
    pub fn get_with(&self, overrides: Overrides) -> Result<Arc<Dep>, ResolveErrorKind> {
        if let Some(instance) = self.instance.lock().as_ref() {
            return Ok(instance.clone());
        }

        // The lock isn't held while resolving, so the instance constructed first wins.
        let resolved: Arc<Dep> = resolve(&self.container, self.scope.as_ref(), overrides)?;
        let mut guard = self.instance.lock();
        match guard.as_ref() {
            Some(instance) => Ok(instance.clone()),
            None => {
                debug!(service = %TypeInfo::of::<Dep>(), "Lazy resolved");
                *guard = Some(resolved.clone());
                Ok(resolved)
            }
        }
    }
}

fn make_lazy<Dep: Send + Sync + 'static>(container: WeakContainer, scope: Option<WeakScope>) -> RcAny {
    Arc::new(Lazy::<Dep>::new(container, scope))
}

impl<Dep: Send + Sync + 'static> Parameter for Lazy<Dep> {
    #[inline]
    fn kind() -> ParameterKind {
        ParameterKind::Deferred {
            service: TypeInfo::of::<Dep>(),
            make: make_lazy::<Dep>,
        }
    }

    #[inline]
    fn expected() -> TypeInfo {
        TypeInfo::of::<Self>()
    }

    #[inline]
    fn from_argument(argument: RcAny) -> Result<Self, RcAny> {
        argument.downcast().map(Arc::unwrap_or_clone)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    use super::{Factory, Lazy};
    use crate::{overrides, Arg, Container, Provider, ResolveErrorKind};

    struct Foo(String);

    fn container(call_count: Arc<AtomicU8>) -> Container {
        let container = Container::new();
        container.add_transient(
            Provider::new(["text"], move |Arg(text): Arg<String>| {
                call_count.fetch_add(1, Ordering::SeqCst);
                Ok(Foo(text))
            })
            .with_default("text", String::from("default")),
        );
        container
    }

    #[test]
    #[traced_test]
    fn test_factory_call_with_overrides() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = container(call_count.clone());
        let factory: Factory<Foo> = container.get_factory().unwrap();

        let foo_1 = factory.call_with(overrides! { text = String::from("first") }).unwrap();
        let foo_2 = factory.call_with(overrides! { text = String::from("second") }).unwrap();
        let foo_3 = factory.clone().call().unwrap();

        assert_eq!(foo_1.0, "first");
        assert_eq!(foo_2.0, "second");
        assert_eq!(foo_3.0, "default");
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert_eq!(format!("{factory:?}"), "Factory(Foo)");
    }

    #[test]
    #[traced_test]
    fn test_lazy_resolves_once() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = container(call_count.clone());
        let lazy: Lazy<Foo> = container.get_lazy().unwrap();
        let cloned = lazy.clone();

        assert!(!lazy.is_resolved());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        let foo_1 = lazy.get_with(overrides! { text = String::from("first") }).unwrap();
        let foo_2 = cloned.get_with(overrides! { text = String::from("ignored") }).unwrap();

        assert!(cloned.is_resolved());
        assert!(Arc::ptr_eq(&foo_1, &foo_2));
        assert_eq!(foo_2.0, "first");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_container_dropped() {
        let container = container(Arc::new(AtomicU8::new(0)));
        let factory: Factory<Foo> = container.get_factory().unwrap();
        let lazy: Lazy<Foo> = container.get_lazy().unwrap();
        drop(container);

        assert!(matches!(factory.call(), Err(ResolveErrorKind::ContainerDropped { .. })));
        assert!(matches!(lazy.get(), Err(ResolveErrorKind::ContainerDropped { .. })));
    }
}
