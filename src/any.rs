use std::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Shared, type-erased service instance.
pub type RcAny = Arc<dyn Any + Send + Sync>;

pub(crate) type Map = BTreeMap<TypeInfo, RcAny>;

/// Service identifier: the [`TypeId`] of the requested type plus its name for diagnostics.
///
/// Equality, ordering and hashing only consider the [`TypeId`].
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Type name without the module path of the outermost type.
    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        match self.name.split_once('<') {
            Some((head, _)) => {
                let start = head.rfind("::").map_or(0, |pos| pos + 2);
                &self.name[start..]
            }
            None => self.name.rsplit_once("::").map_or(self.name, |(_, name)| name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TypeInfo;

    mod inner {
        pub struct Service;
        pub struct Wrapper<T>(pub T);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<inner::Service>().short_name(), "Service");
        assert_eq!(TypeInfo::of::<u8>().short_name(), "u8");
        assert!(TypeInfo::of::<inner::Wrapper<inner::Service>>().short_name().starts_with("Wrapper<"));
    }

    #[test]
    fn test_identity_ignores_name() {
        let mut info = TypeInfo::of::<inner::Service>();
        info.name = "renamed";

        assert_eq!(info, TypeInfo::of::<inner::Service>());
        assert_ne!(info, TypeInfo::of::<u8>());
    }
}
