use std::{
    any::type_name,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    any::{RcAny, TypeInfo},
    errors::AlreadyDisposedError,
    service::{service_fn, SharedService},
};

/// Disposal capability of a service.
///
/// Registered with [`crate::Provider::disposable`], it's called exactly once when the scope
/// that created the instance is exited.
/// Transient and singleton instances are never disposed by the container.
pub trait Dispose {
    /// # Errors
    /// A failure doesn't stop other instances of the scope from being disposed,
    /// all failures are reported together on scope exit.
    fn dispose(&self) -> anyhow::Result<()>;
}

impl<D: Dispose + ?Sized> Dispose for Box<D> {
    #[inline]
    fn dispose(&self) -> anyhow::Result<()> {
        (**self).dispose()
    }
}

impl<D: Dispose + ?Sized> Dispose for Arc<D> {
    #[inline]
    fn dispose(&self) -> anyhow::Result<()> {
        (**self).dispose()
    }
}

/// Tracks whether a service was disposed, for services that must reject any use after disposal.
///
/// ```rust
/// use stackdi::{Dispose, DisposalState};
///
/// struct Connection {
///     state: DisposalState,
/// }
///
/// impl Connection {
///     fn query(&self) -> Result<(), stackdi::AlreadyDisposedError> {
///         self.state.ensure_alive()
///     }
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> anyhow::Result<()> {
///         self.state.mark_disposed()?;
///         Ok(())
///     }
/// }
///
/// let connection = Connection { state: DisposalState::new::<Connection>() };
/// assert!(connection.query().is_ok());
/// connection.dispose().unwrap();
/// assert!(connection.query().is_err());
/// assert!(connection.dispose().is_err());
/// ```
#[derive(Debug)]
pub struct DisposalState {
    service: &'static str,
    disposed: AtomicBool,
}

impl DisposalState {
    #[inline]
    #[must_use]
    pub fn new<T: ?Sized>() -> Self {
        Self {
            service: type_name::<T>(),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// # Errors
    /// Returns [`AlreadyDisposedError`] after [`Self::mark_disposed`] was called.
    #[inline]
    pub fn ensure_alive(&self) -> Result<(), AlreadyDisposedError> {
        if self.is_disposed() {
            return Err(AlreadyDisposedError { service: self.service });
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`AlreadyDisposedError`] if it's already marked.
    #[inline]
    pub fn mark_disposed(&self) -> Result<(), AlreadyDisposedError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(AlreadyDisposedError { service: self.service });
        }
        Ok(())
    }
}

pub(crate) type BoxedCloneFinalizer = SharedService<RcAny, (), anyhow::Error>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<Dep, Fin>(finalizer: Fin) -> BoxedCloneFinalizer
where
    Dep: Send + Sync + 'static,
    Fin: Fn(Arc<Dep>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    SharedService(Arc::new(service_fn(move |dependency: RcAny| match dependency.downcast::<Dep>() {
        Ok(dependency) => finalizer(dependency),
        Err(_) => Err(anyhow::anyhow!(
            "Finalizer of {} received an instance of another type",
            TypeInfo::of::<Dep>()
        )),
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };

    use super::{boxed_finalizer_factory, DisposalState};
    use crate::{any::RcAny, service::Service as _};

    struct Service;

    #[test]
    fn test_boxed_finalizer_downcasts() {
        let call_count = Arc::new(AtomicU8::new(0));
        let finalizer = boxed_finalizer_factory({
            let call_count = call_count.clone();
            move |_: Arc<Service>| {
                call_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let service: RcAny = Arc::new(Service);
        let another: RcAny = Arc::new(1u8);

        assert!(finalizer.call(service).is_ok());
        assert!(finalizer.call(another).is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disposal_state() {
        let state = DisposalState::new::<Service>();

        assert!(state.ensure_alive().is_ok());
        assert!(state.mark_disposed().is_ok());
        assert!(state.is_disposed());

        let err = state.ensure_alive().unwrap_err();
        assert!(err.service.ends_with("Service"));
        assert!(state.mark_disposed().is_err());
    }
}
