use std::{marker::PhantomData, sync::Arc};

use tracing::{error, warn};

use crate::{
    any::{RcAny, TypeInfo},
    config::Config,
    container::Container,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    finalizer::{boxed_finalizer_factory, BoxedCloneFinalizer, Dispose},
    inject::{Parameter, ParameterKind},
    service::{service_fn, SharedService},
};

/// Value assembled by the resolver for one declared parameter.
pub struct Argument {
    pub(crate) name: &'static str,
    pub(crate) value: RcAny,
}

/// Tuple of constructor parameters.
///
/// Implemented for tuples of up to 12 [`Parameter`]s.
pub trait Parameters: Sized + 'static {
    /// Parameter names, one per tuple element.
    type Names: IntoIterator<Item = &'static str>;

    fn kinds() -> Vec<ParameterKind>;

    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectArgumentType`] if an argument holds a value the parameter can't be extracted from.
    fn from_arguments(service: TypeInfo, arguments: Vec<Argument>) -> Result<Self, ResolveErrorKind>;
}

fn extract<P: Parameter>(service: TypeInfo, Argument { name, value }: Argument) -> Result<P, ResolveErrorKind> {
    P::from_argument(value).map_err(|_| {
        let err = ResolveErrorKind::IncorrectArgumentType {
            parameter: name,
            service,
            expected: P::expected(),
        };
        error!("{}", err);
        err
    })
}

macro_rules! impl_parameters {
    ($n:literal; $($ty:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<$($ty,)*> Parameters for ($($ty,)*)
        where
            $( $ty: Parameter, )*
        {
            type Names = [&'static str; $n];

            #[inline]
            fn kinds() -> Vec<ParameterKind> {
                vec![$($ty::kind(),)*]
            }

            fn from_arguments(service: TypeInfo, arguments: Vec<Argument>) -> Result<Self, ResolveErrorKind> {
                let mut arguments = arguments.into_iter();
                $(
                    let $ty = match arguments.next() {
                        Some(argument) => extract::<$ty>(service, argument)?,
                        None => {
                            return Err(ResolveErrorKind::Unresolvable {
                                parameter: stringify!($ty),
                                service,
                            })
                        }
                    };
                )*
                Ok(($($ty,)*))
            }
        }
    };
}

all_the_tuples!(impl_parameters);

/// Constructor of a service from its [`Parameters`].
///
/// Implemented for closures taking up to 12 parameters.
pub trait Instantiator<Params>: Send + Sync + 'static
where
    Params: Parameters,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the failure of the user constructor.
    fn instantiate(&self, params: Params) -> Result<Self::Provides, Self::Error>;
}

macro_rules! impl_instantiator {
    ($n:literal; $($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: Parameter, )*
        {
            type Provides = Response;
            type Error = Err;

            #[inline]
            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

pub(crate) struct ParameterDescriptor {
    pub(crate) name: &'static str,
    pub(crate) kind: ParameterKind,
    pub(crate) default: Option<RcAny>,
}

pub(crate) struct Instantiation {
    pub(crate) container: Container,
    pub(crate) service: TypeInfo,
    pub(crate) arguments: Vec<Argument>,
}

pub(crate) type BoxedCloneInstantiator = SharedService<Instantiation, RcAny, ResolveErrorKind>;

#[must_use]
fn boxed_instantiator<Params, Inst>(instantiator: Inst) -> BoxedCloneInstantiator
where
    Params: Parameters,
    Inst: Instantiator<Params>,
    Inst::Provides: Send + Sync,
{
    SharedService(Arc::new(service_fn(move |Instantiation { service, arguments, .. }| {
        let params = Params::from_arguments(service, arguments)?;
        match instantiator.instantiate(params) {
            Ok(dependency) => Ok(Arc::new(dependency) as RcAny),
            Err(err) => {
                let err = ResolveErrorKind::Instantiate {
                    service,
                    source: err.into(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    })))
}

/// Registration recipe of `T`: declared parameters, constructor, optional finalizer and config.
///
/// Parameter names are checked against the constructor arity at compile time:
///
/// ```rust
/// use stackdi::{Arg, Inject, Provider};
///
/// struct Config(u16);
/// struct Server {
///     config: std::sync::Arc<Config>,
///     host: String,
/// }
///
/// let provider = Provider::new(["config", "host"], |Inject(config): Inject<Config>, Arg(host): Arg<String>| {
///     Ok(Server { config, host })
/// })
/// .with_default("host", String::from("localhost"));
/// ```
pub struct Provider<T> {
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) instantiator: BoxedCloneInstantiator,
    pub(crate) finalizer: Option<BoxedCloneFinalizer>,
    pub(crate) config: Config,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    #[must_use]
    pub fn new<Params, Inst>(names: Params::Names, instantiator: Inst) -> Self
    where
        Params: Parameters,
        Inst: Instantiator<Params, Provides = T, Error = InstantiateErrorKind>,
    {
        let parameters = names
            .into_iter()
            .zip(Params::kinds())
            .map(|(name, kind)| ParameterDescriptor { name, kind, default: None })
            .collect();

        Self {
            parameters,
            instantiator: boxed_instantiator(instantiator),
            finalizer: None,
            config: Config::default(),
            _marker: PhantomData,
        }
    }

    /// Value used for the parameter `name` when it isn't overridden and its type isn't registered.
    #[must_use]
    pub fn with_default<V: Send + Sync + 'static>(mut self, name: &'static str, value: V) -> Self {
        match self.parameters.iter_mut().find(|parameter| parameter.name == name) {
            Some(parameter) => parameter.default = Some(Arc::new(value)),
            None => warn!(parameter = name, service = %TypeInfo::of::<T>(), "Default of an unknown parameter is ignored"),
        }
        self
    }

    /// Called once for every scoped instance when its scope is exited.
    #[must_use]
    pub fn with_finalizer<Fin>(mut self, finalizer: Fin) -> Self
    where
        Fin: Fn(Arc<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.finalizer = Some(boxed_finalizer_factory(finalizer));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn parameter_names(&self) -> Vec<&'static str> {
        self.parameters.iter().map(|parameter| parameter.name).collect()
    }
}

impl<T: Dispose + Send + Sync + 'static> Provider<T> {
    /// Uses [`Dispose::dispose`] as the finalizer.
    #[inline]
    #[must_use]
    pub fn disposable(self) -> Self {
        self.with_finalizer(|dependency: Arc<T>| dependency.dispose())
    }
}

impl Provider<Container> {
    /// Provides the container that resolves it. The handle isn't cached, so the container doesn't own itself.
    pub(crate) fn container() -> Self {
        Self {
            parameters: Vec::new(),
            instantiator: SharedService(Arc::new(service_fn(|Instantiation { container, .. }| {
                Ok::<_, ResolveErrorKind>(Arc::new(container) as RcAny)
            }))),
            finalizer: None,
            config: Config { cache_provides: false },
            _marker: PhantomData,
        }
    }
}

/// Provides a clone of `value` on every resolution.
#[inline]
#[must_use]
pub fn instance<T: Clone + Send + Sync + 'static>(value: T) -> Provider<T> {
    Provider::new([], move || Ok(value.clone()))
}
