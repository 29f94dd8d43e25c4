use super::dispose::DisposalErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum ScopeErrorKind {
    #[error("Scope stack of the current thread is empty")]
    EmptyStack,
    #[error("Scope isn't the current scope of this thread. Scopes must be exited in reverse order of entering")]
    NotCurrent,
    #[error("Scope is already entered")]
    AlreadyEntered,
    #[error("Scope is already exited and can't be entered again")]
    AlreadyExited,
    #[error(transparent)]
    Disposal(#[from] DisposalErrorKind),
}
