use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use crate::any::RcAny;

/// Caller-supplied values keyed by parameter name.
///
/// An override takes precedence over resolving the parameter from the container and over its default.
/// Names that don't match any parameter of the constructed service are ignored.
/// Overrides apply only to the requested service, never to its dependencies.
#[derive(Clone, Default)]
pub struct Overrides {
    pub(crate) map: BTreeMap<Cow<'static, str>, RcAny>,
}

impl Overrides {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, name: impl Into<Cow<'static, str>>, value: T) -> Option<Arc<T>> {
        self.insert_rc(name, Arc::new(value))
    }

    #[inline]
    pub fn insert_rc<T: Send + Sync + 'static>(&mut self, name: impl Into<Cow<'static, str>>, value: Arc<T>) -> Option<Arc<T>> {
        self.map.insert(name.into(), value).and_then(|boxed| boxed.downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, name: impl Into<Cow<'static, str>>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, name: &str) -> Option<RcAny> {
        self.map.get(name).cloned()
    }
}

impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

/// Builds [`Overrides`] from `name = value` pairs.
///
/// ```rust
/// use stackdi::overrides;
///
/// let overrides = overrides! { text = String::from("hi"), retries = 3u8 };
/// assert_eq!(overrides.len(), 2);
/// ```
#[macro_export]
macro_rules! overrides {
    () => {
        $crate::Overrides::new()
    };
    ($($name:ident = $value:expr),+ $(,)?) => {{
        let mut overrides = $crate::Overrides::new();
        $(
            overrides.insert(stringify!($name), $value);
        )+
        overrides
    }};
}
