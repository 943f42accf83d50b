#![no_main]

//! Fuzz target for scope trees
//!
//! Creates, resolves from and disposes nested scopes in arbitrary order and
//! checks caching, disposal and snapshot invariants along the way.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use portwire::{Adapter, Container, DiError, Graph, Port, Scope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Config;
struct Session;
struct Handler;

const CONFIG: Port<Config> = Port::new("Config");
const SESSION: Port<Session> = Port::new("Session");
const HANDLER: Port<Handler> = Port::new("Handler");

/// Operations on the scope tree
#[derive(Debug, Arbitrary)]
enum ScopedOp {
    CreateScope,
    CreateNestedScope(u8),
    ResolveConfig(u8),
    ResolveSession(u8),
    ResolveHandler(u8),
    ResolveFromRoot,
    DisposeScope(u8),
    Snapshot,
}

fn pick(scopes: &[Scope], index: u8) -> Option<&Scope> {
    if scopes.is_empty() {
        None
    } else {
        scopes.get(index as usize % scopes.len())
    }
}

fuzz_target!(|ops: Vec<ScopedOp>| {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(_) => return,
    };

    let created = Arc::new(AtomicUsize::new(0));
    let finalized = Arc::new(AtomicUsize::new(0));
    let (c, f) = (Arc::clone(&created), Arc::clone(&finalized));

    let graph = Graph::builder()
        .provide(Adapter::singleton(CONFIG).factory(|_| Config))
        .provide(
            Adapter::scoped(SESSION)
                .requires(CONFIG)
                .factory(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                    Session
                })
                .finalizer(move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .provide(Adapter::request(HANDLER).requires(SESSION).factory(|_| Handler))
        .build()
        .unwrap();

    let root = Container::new(graph);
    let mut scopes: Vec<Scope> = Vec::new();

    for op in ops.into_iter().take(100) { // Limit operations to prevent OOM
        match op {
            ScopedOp::CreateScope => {
                if scopes.len() < 16 {
                    scopes.push(root.create_scope().unwrap());
                }
            }
            ScopedOp::CreateNestedScope(i) => {
                if scopes.len() < 16 {
                    if let Some(parent) = pick(&scopes, i) {
                        match parent.create_scope() {
                            Ok(child) => {
                                assert_eq!(child.depth(), parent.depth() + 1);
                                scopes.push(child);
                            }
                            Err(err) => {
                                assert!(parent.is_disposed());
                                assert!(matches!(err, DiError::ResolverDisposed { .. }));
                            }
                        }
                    }
                }
            }
            ScopedOp::ResolveConfig(i) => {
                if let Some(scope) = pick(&scopes, i) {
                    if let Ok(config) = scope.resolve(CONFIG) {
                        assert!(Arc::ptr_eq(&config, &root.resolve(CONFIG).unwrap()));
                    }
                }
            }
            ScopedOp::ResolveSession(i) => {
                if let Some(scope) = pick(&scopes, i) {
                    match (scope.resolve(SESSION), scope.resolve(SESSION)) {
                        (Ok(a), Ok(b)) => assert!(Arc::ptr_eq(&a, &b)),
                        (Err(DiError::DisposedScope { .. }), Err(DiError::DisposedScope { .. })) => {
                            assert!(scope.is_disposed());
                        }
                        (a, b) => panic!("inconsistent resolution: {:?} / {:?}", a.err(), b.err()),
                    }
                }
            }
            ScopedOp::ResolveHandler(i) => {
                if let Some(scope) = pick(&scopes, i) {
                    let _ = scope.try_resolve(HANDLER);
                }
            }
            ScopedOp::ResolveFromRoot => {
                assert!(matches!(
                    root.resolve(SESSION),
                    Err(DiError::ScopeRequired { .. })
                ));
            }
            ScopedOp::DisposeScope(i) => {
                if let Some(scope) = pick(&scopes, i) {
                    runtime.block_on(scope.dispose()).unwrap();
                    assert!(scope.is_disposed());
                    assert!(!root.is_disposed());
                }
            }
            ScopedOp::Snapshot => {
                let snapshot = root.internal_state().unwrap();
                let live = scopes.iter().filter(|s| !s.is_disposed()).count();
                assert_eq!(snapshot.scope_count(), live + 1);
            }
        }
    }

    runtime.block_on(root.dispose()).unwrap();
    assert!(scopes.iter().all(Scope::is_disposed));
    // Every scoped session that was cached got finalized exactly once
    assert_eq!(created.load(Ordering::SeqCst), finalized.load(Ordering::SeqCst));
});
