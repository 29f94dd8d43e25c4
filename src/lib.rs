#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod errors;
pub(crate) mod factory;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod life;
pub(crate) mod overrides;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;

pub use any::{RcAny, TypeInfo};
pub use config::Config;
pub use container::{Container, WeakContainer};
pub use errors::{
    AlreadyDisposedError, DisposalErrorKind, FinalizeFailure, InstantiateErrorKind, InstantiatorResult, ResolveErrorKind,
    ScopeErrorKind,
};
pub use factory::{Factory, Lazy};
pub use finalizer::{DisposalState, Dispose};
pub use inject::{Arg, Inject, Parameter, ParameterKind};
pub use instantiator::{instance, Argument, Instantiator, Parameters, Provider};
pub use life::ServiceLife;
pub use overrides::Overrides;
pub use registry::ServiceEntry;
pub use scope::{Scope, ScopeGuard, WeakScope};
