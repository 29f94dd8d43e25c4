use std::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
#[error("Finalizer of {service} failed: {source}")]
pub struct FinalizeFailure {
    pub service: TypeInfo,
    #[source]
    pub source: anyhow::Error,
}

/// Every finalizer that failed while a scope was being exited, in the order they were called.
#[derive(thiserror::Error, Debug)]
pub struct DisposalErrorKind {
    pub failures: Vec<FinalizeFailure>,
}

impl Display for DisposalErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} finalizer(s) failed on scope exit", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{service} is already disposed")]
pub struct AlreadyDisposedError {
    pub service: &'static str,
}
