use std::fmt::{self, Display, Formatter};

/// Caching policy of a registered service.
///
/// Doesn't affect how the service is constructed, only whether and where the instance is reused:
/// - [`ServiceLife::Transient`]: a new instance on every resolution, never cached.
/// - [`ServiceLife::Scoped`]: one instance per [`crate::Scope`], finalized on scope exit.
/// - [`ServiceLife::Singleton`]: one instance per [`crate::Container`], never finalized automatically.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLife {
    #[default]
    Transient,
    Scoped,
    Singleton,
}

impl ServiceLife {
    #[inline]
    #[must_use]
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::Scoped | Self::Singleton)
    }
}

impl Display for ServiceLife {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transient => "transient",
            Self::Scoped => "scoped",
            Self::Singleton => "singleton",
        })
    }
}
