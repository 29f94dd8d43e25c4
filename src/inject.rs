use std::sync::Arc;

use crate::{
    any::{RcAny, TypeInfo},
    container::WeakContainer,
    scope::WeakScope,
};

/// How the resolver obtains a parameter's value when no override is supplied.
#[derive(Clone, Copy)]
pub enum ParameterKind {
    /// Resolved from the container if the type is registered, otherwise the parameter default is used.
    Dependency(TypeInfo),
    /// A proxy bound to the container, created on every injection without resolving `service`.
    /// Gets the scope the injecting resolution runs in, if there's one.
    Deferred {
        service: TypeInfo,
        make: fn(WeakContainer, Option<WeakScope>) -> RcAny,
    },
}

impl ParameterKind {
    #[inline]
    #[must_use]
    pub const fn service(&self) -> TypeInfo {
        match self {
            Self::Dependency(service) | Self::Deferred { service, .. } => *service,
        }
    }
}

/// Typed constructor parameter extracted from the argument assembled by the resolver.
pub trait Parameter: Sized + 'static {
    #[must_use]
    fn kind() -> ParameterKind;

    /// Type of the value the argument must hold.
    #[must_use]
    fn expected() -> TypeInfo;

    /// # Errors
    /// Returns the argument back if it holds a value of another type.
    fn from_argument(argument: RcAny) -> Result<Self, RcAny>;
}

/// Shared instance of `Dep`.
///
/// Resolved from the container when `Dep` is registered, otherwise taken from the parameter default.
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> Parameter for Inject<Dep> {
    #[inline]
    fn kind() -> ParameterKind {
        ParameterKind::Dependency(TypeInfo::of::<Dep>())
    }

    #[inline]
    fn expected() -> TypeInfo {
        TypeInfo::of::<Dep>()
    }

    #[inline]
    fn from_argument(argument: RcAny) -> Result<Self, RcAny> {
        argument.downcast().map(Self)
    }
}

/// Owned value of `T`, cloned if the argument is shared.
///
/// Usually supplied by an override or a default, but resolved from the container like [`Inject`]
/// when `T` is registered.
pub struct Arg<T>(pub T);

impl<T: Clone + Send + Sync + 'static> Parameter for Arg<T> {
    #[inline]
    fn kind() -> ParameterKind {
        ParameterKind::Dependency(TypeInfo::of::<T>())
    }

    #[inline]
    fn expected() -> TypeInfo {
        TypeInfo::of::<T>()
    }

    #[inline]
    fn from_argument(argument: RcAny) -> Result<Self, RcAny> {
        argument.downcast().map(|value| Self(Arc::unwrap_or_clone(value)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Arg, Inject, Parameter, ParameterKind};
    use crate::any::{RcAny, TypeInfo};

    #[derive(Clone, PartialEq, Debug)]
    struct Value(u8);

    #[test]
    fn test_inject_shares_instance() {
        let value = Arc::new(Value(1));
        let argument: RcAny = value.clone();

        let Inject(injected) = Inject::<Value>::from_argument(argument).ok().unwrap();
        assert!(Arc::ptr_eq(&value, &injected));
        assert!(matches!(Inject::<Value>::kind(), ParameterKind::Dependency(service) if service == TypeInfo::of::<Value>()));
    }

    #[test]
    fn test_arg_clones_shared_value() {
        let value = Arc::new(Value(2));
        let argument: RcAny = value.clone();

        let Arg(owned) = Arg::<Value>::from_argument(argument).ok().unwrap();
        assert_eq!(owned, Value(2));
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_incorrect_argument_type() {
        let argument: RcAny = Arc::new(String::from("text"));

        assert!(Arg::<Value>::from_argument(argument.clone()).is_err());
        assert!(Inject::<Value>::from_argument(argument).is_err());
    }
}
