mod dispose;
mod instantiate;
mod resolve;
mod scope;

pub use dispose::{AlreadyDisposedError, DisposalErrorKind, FinalizeFailure};
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;
pub use scope::ScopeErrorKind;

/// Result type for instantiators and finalizers.
pub type InstantiatorResult<T, Err = InstantiateErrorKind> = Result<T, Err>;
