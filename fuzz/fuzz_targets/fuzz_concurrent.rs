#![no_main]

//! Fuzz target for concurrent resolution
//!
//! Several threads resolve through shared scopes at once; singletons and
//! per-scope instances must stay unique.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use portwire::{Adapter, Container, Graph, Port};
use std::sync::Arc;
use std::thread;

struct Config {
    value: u32,
}

struct Session;

const CONFIG: Port<Config> = Port::new("Config");
const SESSION: Port<Session> = Port::new("Session");

/// Thread operation
#[derive(Debug, Clone, Arbitrary)]
enum ThreadOp {
    ResolveConfig,
    ResolveSession(u8),
    TryResolveSession,
    IsResolved,
    CreateScope,
}

/// Concurrent test scenario
#[derive(Debug, Arbitrary)]
struct ConcurrentScenario {
    // Number of shared scopes (clamped to 1-4)
    scope_count: u8,
    // Number of threads (clamped to 1-8)
    thread_count: u8,
    // Operations per thread (clamped)
    ops_per_thread: Vec<ThreadOp>,
}

fuzz_target!(|scenario: ConcurrentScenario| {
    let graph = Graph::builder()
        .provide(Adapter::singleton(CONFIG).factory(|_| Config { value: 42 }))
        .provide(Adapter::scoped(SESSION).requires(CONFIG).factory(|_| Session))
        .build()
        .unwrap();
    let container = Container::new(graph);

    let scope_count = (scenario.scope_count % 4).max(1) as usize;
    let scopes: Arc<Vec<_>> =
        Arc::new((0..scope_count).map(|_| container.create_scope().unwrap()).collect());

    let thread_count = (scenario.thread_count % 8).max(1) as usize;
    let ops = scenario.ops_per_thread;

    let mut handles = Vec::new();
    for _ in 0..thread_count {
        let container = container.clone();
        let scopes = Arc::clone(&scopes);
        let ops = ops.clone();

        handles.push(thread::spawn(move || {
            for op in ops.into_iter().take(50) {
                match op {
                    ThreadOp::ResolveConfig => {
                        assert_eq!(container.resolve(CONFIG).unwrap().value, 42);
                    }
                    ThreadOp::ResolveSession(i) => {
                        let _ = scopes[i as usize % scopes.len()].resolve(SESSION).unwrap();
                    }
                    ThreadOp::TryResolveSession => {
                        assert!(container.try_resolve(SESSION).is_none());
                    }
                    ThreadOp::IsResolved => {
                        let _ = container.is_resolved(CONFIG);
                    }
                    ThreadOp::CreateScope => {
                        let _ = container.create_scope().unwrap().resolve(SESSION);
                    }
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }

    // Racing resolutions must have converged on one instance per cache
    let config = container.resolve(CONFIG).unwrap();
    for scope in scopes.iter() {
        if let Ok(a) = scope.resolve(SESSION) {
            assert!(Arc::ptr_eq(&a, &scope.resolve(SESSION).unwrap()));
        }
        assert!(Arc::ptr_eq(&config, &scope.resolve(CONFIG).unwrap()));
    }
});
