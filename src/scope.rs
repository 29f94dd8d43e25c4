use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    mem,
    ops::Deref,
    sync::{Arc, Weak},
    thread::{self, ThreadId},
};

use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    any::{RcAny, TypeInfo},
    cache::{Cache, Resolved},
    container::Container,
    errors::{DisposalErrorKind, FinalizeFailure, ResolveErrorKind, ScopeErrorKind},
    finalizer::BoxedCloneFinalizer,
    overrides::Overrides,
    resolver::Resolver,
    service::Service as _,
};

/// Entered scopes of every thread, the last one of a thread is its current scope.
///
/// Threads never observe each other's scopes.
#[derive(Default)]
pub(crate) struct ScopeStack {
    stacks: Mutex<HashMap<ThreadId, Vec<Scope>>>,
}

impl ScopeStack {
    #[must_use]
    pub(crate) fn get_current(&self) -> Option<Scope> {
        self.stacks
            .lock()
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
    }

    pub(crate) fn push(&self, scope: Scope) {
        self.stacks.lock().entry(thread::current().id()).or_default().push(scope);
    }

    /// Removes the current scope of this thread. Doesn't dispose it.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::EmptyStack`] if this thread has no entered scope.
    pub(crate) fn pop(&self) -> Result<Scope, ScopeErrorKind> {
        let thread_id = thread::current().id();
        let mut stacks = self.stacks.lock();

        let Some(stack) = stacks.get_mut(&thread_id) else {
            return Err(ScopeErrorKind::EmptyStack);
        };
        let scope = stack.pop();
        if stack.is_empty() {
            stacks.remove(&thread_id);
        }
        scope.ok_or(ScopeErrorKind::EmptyStack)
    }

    #[must_use]
    pub(crate) fn depth(&self) -> usize {
        self.stacks.lock().get(&thread::current().id()).map_or(0, Vec::len)
    }

    /// Pops `scope` if it's the current scope of this thread.
    /// Otherwise it's taken out of the stack anyway, so an exited scope is never left behind.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::NotCurrent`] if `scope` isn't the current scope,
    /// or [`ScopeErrorKind::EmptyStack`] if this thread has no entered scope.
    fn remove(&self, scope: &Scope) -> Result<Scope, ScopeErrorKind> {
        match self.get_current() {
            None => return Err(ScopeErrorKind::EmptyStack),
            Some(current) if current.ptr_eq(scope) => return self.pop(),
            Some(_) => {}
        }

        let removed = {
            let mut stacks = self.stacks.lock();
            stacks.get_mut(&thread::current().id()).and_then(|stack| {
                stack
                    .iter()
                    .rposition(|entered| entered.ptr_eq(scope))
                    .map(|pos| stack.remove(pos))
            })
        };
        drop(removed);

        Err(ScopeErrorKind::NotCurrent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Created,
    Entered,
    Exited,
}

struct ScopeData {
    state: ScopeState,
    cache: Cache,
}

struct ScopeInner {
    container: Container,
    data: Mutex<ScopeData>,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let cache = mem::take(&mut self.data.get_mut().cache);
        if let Err(err) = dispose(cache) {
            error!("Scope dropped without exit: {}", err);
        }
    }
}

/// Lifetime boundary of scoped services.
///
/// A scope holds at most one instance of every scoped service and finalizes the instances
/// in reverse creation order when it's exited.
/// Created by [`Container::create_scope`]; it becomes the current scope of the thread once entered.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    #[must_use]
    pub(crate) fn new(container: Container) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                container,
                data: Mutex::new(ScopeData {
                    state: ScopeState::Created,
                    cache: Cache::new(),
                }),
            }),
        }
    }

    /// Resolves `Dep` with this scope as the scope of scoped services, whatever the current scope is.
    ///
    /// # Errors
    /// Same as [`Container::get`]. Scoped services fail with [`ResolveErrorKind::ScopeExited`] once the scope is exited.
    #[inline]
    pub fn get<Dep: Send + Sync + 'static>(&self) -> Result<Arc<Dep>, ResolveErrorKind> {
        self.get_with(Overrides::new())
    }

    /// # Errors
    /// Same as [`Self::get`].
    pub fn get_with<Dep: Send + Sync + 'static>(&self, overrides: Overrides) -> Result<Arc<Dep>, ResolveErrorKind> {
        let span = info_span!("scope_get", service = %TypeInfo::of::<Dep>());
        let _guard = span.enter();

        Resolver::new(&self.inner.container, Some(self)).resolve_typed(&overrides)
    }

    /// Makes this scope the current scope of the thread until the returned guard is dropped or exited.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::AlreadyEntered`] or [`ScopeErrorKind::AlreadyExited`]
    /// if the scope was entered before.
    pub fn enter(&self) -> Result<ScopeGuard, ScopeErrorKind> {
        {
            let mut data = self.inner.data.lock();
            match data.state {
                ScopeState::Created => data.state = ScopeState::Entered,
                ScopeState::Entered => return Err(logged(ScopeErrorKind::AlreadyEntered)),
                ScopeState::Exited => return Err(logged(ScopeErrorKind::AlreadyExited)),
            }
        }

        let scopes = &self.inner.container.inner.scopes;
        scopes.push(self.clone());
        debug!(depth = scopes.depth(), "Scope entered");

        Ok(ScopeGuard {
            scope: self.clone(),
            exited: false,
            _not_send: PhantomData,
        })
    }

    /// Enters the scope, runs `f` and exits the scope, also when `f` panics.
    ///
    /// # Errors
    /// Returns the error of entering or exiting the scope. The result of `f` is lost in this case.
    pub fn run<R, F>(&self, f: F) -> Result<R, ScopeErrorKind>
    where
        F: FnOnce(&Self) -> R,
    {
        let guard = self.enter()?;
        let result = f(self);
        guard.exit()?;
        Ok(result)
    }

    #[inline]
    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.inner.data.lock().state == ScopeState::Entered
    }

    #[inline]
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.inner.data.lock().state == ScopeState::Exited
    }

    /// Whether the scope holds an instance of `Dep`.
    #[inline]
    #[must_use]
    pub fn is_cached<Dep: 'static>(&self) -> bool {
        self.inner.data.lock().cache.contains(&TypeInfo::of::<Dep>())
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::ScopeExited`] if the scope is exited.
    pub(crate) fn cached(&self, service: TypeInfo) -> Result<Option<RcAny>, ResolveErrorKind> {
        let data = self.inner.data.lock();
        if data.state == ScopeState::Exited {
            return Err(scope_exited(service));
        }
        Ok(data.cache.get(&service))
    }

    /// Keeps a new scoped instance, and its finalizer for the scope exit.
    /// Returns the instance already cached by a concurrent resolution if there's one.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::ScopeExited`] if the scope is exited.
    pub(crate) fn store(
        &self,
        service: TypeInfo,
        dependency: RcAny,
        finalizer: Option<BoxedCloneFinalizer>,
        cache_provides: bool,
    ) -> Result<RcAny, ResolveErrorKind> {
        let mut data = self.inner.data.lock();
        if data.state == ScopeState::Exited {
            return Err(scope_exited(service));
        }

        if cache_provides {
            if let Err(existing) = data.cache.add(service, dependency.clone()) {
                debug!("Resolved concurrently, the cached instance is kept");
                return Ok(existing);
            }
        }
        if let Some(finalizer) = finalizer {
            data.cache.push_resolved(Resolved {
                service,
                dependency: dependency.clone(),
                finalizer,
            });
        }
        Ok(dependency)
    }

    fn exit(&self) -> Result<(), ScopeErrorKind> {
        let cache = {
            let mut data = self.inner.data.lock();
            data.state = ScopeState::Exited;
            mem::take(&mut data.cache)
        };
        let disposal = dispose(cache);

        let scopes = &self.inner.container.inner.scopes;
        let popped = scopes.remove(self);
        debug!(depth = scopes.depth(), "Scope exited");

        match (disposal, popped) {
            (Ok(()), Ok(_)) => Ok(()),
            (Ok(()), Err(err)) => Err(logged(err)),
            (Err(err), popped) => {
                if let Err(pop_err) = popped {
                    error!("{}", pop_err);
                }
                Err(logged(err.into()))
            }
        }
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let data = self.inner.data.lock();
        f.debug_struct("Scope")
            .field("state", &data.state)
            .field("cached", &data.cache.len())
            .finish_non_exhaustive()
    }
}

/// Handle that doesn't keep the scope alive.
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }
}

/// Keeps a scope entered on the current thread. Exits it on drop.
///
/// Not [`Send`]: a scope is exited by the thread that entered it.
#[must_use = "the scope is exited as soon as the guard is dropped"]
pub struct ScopeGuard {
    scope: Scope,
    exited: bool,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Finalizes the scoped instances, most recently created first, and leaves the scope.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Disposal`] with every failed finalizer once all of them were called,
    /// or [`ScopeErrorKind::NotCurrent`] if a scope entered later on this thread is still entered.
    pub fn exit(mut self) -> Result<(), ScopeErrorKind> {
        self.exited = true;
        self.scope.exit()
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Deref for ScopeGuard {
    type Target = Scope;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.exited {
            // Errors are already logged by `exit`
            let _ = self.scope.exit();
        }
    }
}

fn dispose(mut cache: Cache) -> Result<(), DisposalErrorKind> {
    let mut resolved_set = cache.take_resolved_set();
    let mut failures = Vec::new();

    while let Some(Resolved {
        service,
        dependency,
        finalizer,
    }) = resolved_set.pop_last()
    {
        match finalizer.call(dependency) {
            Ok(()) => debug!(service = %service, "Finalized"),
            Err(source) => {
                let failure = FinalizeFailure { service, source };
                error!("{}", failure);
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DisposalErrorKind { failures })
    }
}

fn scope_exited(service: TypeInfo) -> ResolveErrorKind {
    let err = ResolveErrorKind::ScopeExited { service };
    error!("{}", err);
    err
}

fn logged(err: ScopeErrorKind) -> ScopeErrorKind {
    error!("{}", err);
    err
}
