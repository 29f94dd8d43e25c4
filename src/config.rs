/// Config for a provider
/// ## Fields
/// - `cache_provides`:
///   If `true`, the instance provided by a scoped or singleton provider will be cached and reused
///   in the scope or container cache.
///   If `false`, every resolution builds a new instance even for cached lifetimes.
///   Scoped instances are still tracked for finalization in this case.
///
///   This does **not** affect the dependencies of the instance.
///   Only the final result is cached if caching is applicable.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub cache_provides: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { cache_provides: true }
    }
}
