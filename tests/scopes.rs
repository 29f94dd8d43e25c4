use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use parking_lot::Mutex;
use stackdi::{
    AlreadyDisposedError, Container, DisposalState, Dispose, Factory, Inject, Lazy, Provider, ResolveErrorKind,
    ScopeErrorKind,
};
use tracing_test::traced_test;

type Log = Arc<Mutex<Vec<&'static str>>>;

struct X;
struct Y(Arc<X>);

struct Connection {
    state: DisposalState,
}

impl Connection {
    fn query(&self) -> Result<(), AlreadyDisposedError> {
        self.state.ensure_alive()
    }
}

impl Dispose for Connection {
    fn dispose(&self) -> anyhow::Result<()> {
        self.state.mark_disposed()?;
        Ok(())
    }
}

fn container(log: &Log, y_fails: bool) -> Container {
    let container = Container::new();
    container
        .add_scoped(Provider::new([], || Ok(X)).with_finalizer({
            let log = log.clone();
            move |_| {
                log.lock().push("x");
                Ok(())
            }
        }))
        .add_scoped(Provider::new(["x"], |Inject(x): Inject<X>| Ok(Y(x))).with_finalizer({
            let log = log.clone();
            move |_| {
                log.lock().push("y");
                if y_fails {
                    anyhow::bail!("y is broken");
                }
                Ok(())
            }
        }));
    container
}

#[test]
#[traced_test]
fn test_scoped_requires_scope() {
    let container = container(&Log::default(), false);

    assert!(matches!(container.get::<X>(), Err(ResolveErrorKind::NoActiveScope { .. })));
}

#[test]
#[traced_test]
fn test_scoped_per_scope_instances() {
    let container = container(&Log::default(), false);

    let outer = container.create_scope();
    let outer_guard = outer.enter().unwrap();
    let x_1 = container.get::<X>().unwrap();
    let x_2 = container.get::<X>().unwrap();
    assert!(Arc::ptr_eq(&x_1, &x_2));

    let inner = container.create_scope();
    let inner_guard = inner.enter().unwrap();
    assert!(container.current_scope().unwrap().ptr_eq(&inner));
    let x_3 = container.get::<X>().unwrap();
    assert!(!Arc::ptr_eq(&x_1, &x_3));
    inner_guard.exit().unwrap();

    assert!(container.current_scope().unwrap().ptr_eq(&outer));
    assert!(Arc::ptr_eq(&x_1, &container.get::<X>().unwrap()));
    outer_guard.exit().unwrap();

    assert!(container.current_scope().is_none());
}

#[test]
#[traced_test]
fn test_nested_exit_keeps_parent_disposables() {
    let log = Log::default();
    let container = container(&log, false);

    let outer = container.create_scope();
    let outer_guard = outer.enter().unwrap();
    container.get::<Y>().unwrap();

    container
        .create_scope()
        .run(|_| {
            container.get::<X>().unwrap();
        })
        .unwrap();

    assert_eq!(*log.lock(), ["x"]);
    assert!(outer.is_cached::<X>());
    assert!(outer.is_cached::<Y>());

    outer_guard.exit().unwrap();

    assert_eq!(*log.lock(), ["x", "y", "x"]);
}

#[test]
#[traced_test]
fn test_proxies_resolve_in_injecting_scope() {
    struct Consumer(Factory<X>, Lazy<Y>);

    let container = container(&Log::default(), false);
    container.add_scoped(Provider::new(["make_x", "y"], |make_x: Factory<X>, y: Lazy<Y>| {
        Ok(Consumer(make_x, y))
    }));

    let scope = container.create_scope();
    let consumer = scope.get::<Consumer>().unwrap();
    assert!(container.current_scope().is_none());

    let x = consumer.0.call().unwrap();
    assert!(Arc::ptr_eq(&x, &scope.get::<X>().unwrap()));
    assert!(Arc::ptr_eq(&consumer.1.get().unwrap().0, &x));

    // The current scope of the thread takes precedence
    container
        .create_scope()
        .run(|current| {
            let current_x = consumer.0.call().unwrap();
            assert!(Arc::ptr_eq(&current_x, &current.get::<X>().unwrap()));
            assert!(!Arc::ptr_eq(&current_x, &x));
        })
        .unwrap();
}

#[test]
#[traced_test]
fn test_disposal_reverse_creation_order() {
    let log = Log::default();
    let container = container(&log, false);

    let scope = container.create_scope();
    scope
        .run(|_| {
            let y = container.get::<Y>().unwrap();
            assert!(Arc::ptr_eq(&y.0, &container.get::<X>().unwrap()));
        })
        .unwrap();

    assert_eq!(*log.lock(), ["y", "x"]);
}

#[test]
#[traced_test]
fn test_disposal_fault_isolation() {
    let log = Log::default();
    let container = container(&log, true);

    let scope = container.create_scope();
    let guard = scope.enter().unwrap();
    container.get::<Y>().unwrap();

    match guard.exit() {
        Err(ScopeErrorKind::Disposal(err)) => {
            assert_eq!(err.failures.len(), 1);
            assert_eq!(err.failures[0].source.to_string(), "y is broken");
        }
        _ => panic!("expected a disposal error"),
    }

    assert_eq!(*log.lock(), ["y", "x"]);
    assert!(container.current_scope().is_none());
}

#[test]
#[traced_test]
fn test_disposable_rejects_use_after_dispose() {
    let container = Container::new();
    container.add_scoped(
        Provider::new([], || {
            Ok(Connection {
                state: DisposalState::new::<Connection>(),
            })
        })
        .disposable(),
    );

    let scope = container.create_scope();
    let connection = scope
        .run(|scope| {
            let connection = scope.get::<Connection>().unwrap();
            assert!(connection.query().is_ok());
            connection
        })
        .unwrap();

    assert!(connection.query().is_err());
}

#[test]
#[traced_test]
fn test_transient_and_singleton_not_disposed() {
    let log = Log::default();
    let container = Container::new();
    container
        .add_transient(Provider::new([], || Ok(X)).with_finalizer({
            let log = log.clone();
            move |_| {
                log.lock().push("x");
                Ok(())
            }
        }))
        .add_singleton(Provider::new(["x"], |Inject(x): Inject<X>| Ok(Y(x))).with_finalizer({
            let log = log.clone();
            move |_| {
                log.lock().push("y");
                Ok(())
            }
        }));

    container
        .create_scope()
        .run(|_| {
            container.get::<Y>().unwrap();
            container.get::<X>().unwrap();
        })
        .unwrap();

    assert!(log.lock().is_empty());
}

#[test]
#[traced_test]
fn test_exit_on_panic() {
    let log = Log::default();
    let container = container(&log, false);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let scope = container.create_scope();
        let _guard = scope.enter().unwrap();
        container.get::<Y>().unwrap();
        panic!("request failed");
    }));

    assert!(result.is_err());
    assert_eq!(*log.lock(), ["y", "x"]);
    assert!(container.current_scope().is_none());
}

#[test]
#[traced_test]
fn test_scope_stack_per_thread() {
    let container = container(&Log::default(), false);

    let scope = container.create_scope();
    let _guard = scope.enter().unwrap();
    let x = container.get::<X>().unwrap();

    let (in_thread, explicit) = thread::spawn({
        let container = container.clone();
        let scope = scope.clone();
        move || (container.get::<X>().err(), scope.get::<X>().unwrap())
    })
    .join()
    .unwrap();

    assert!(matches!(in_thread, Some(ResolveErrorKind::NoActiveScope { .. })));
    assert!(Arc::ptr_eq(&x, &explicit));
}
