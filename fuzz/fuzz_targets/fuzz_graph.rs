#![no_main]

//! Fuzz target for arbitrary adapter graphs
//!
//! Builds random graphs (including cyclic, captive and incomplete ones) and
//! checks that resolution either succeeds or fails with a well-formed error.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use portwire::{Adapter, Container, DiError, Graph, GraphError, Lifetime, Port};
use std::sync::Arc;

const NAMES: [&str; 8] = ["P0", "P1", "P2", "P3", "P4", "P5", "P6", "P7"];

struct Node;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzLifetime {
    Singleton,
    Scoped,
    Request,
}

impl From<FuzzLifetime> for Lifetime {
    fn from(lifetime: FuzzLifetime) -> Self {
        match lifetime {
            FuzzLifetime::Singleton => Lifetime::Singleton,
            FuzzLifetime::Scoped => Lifetime::Scoped,
            FuzzLifetime::Request => Lifetime::Request,
        }
    }
}

#[derive(Debug, Arbitrary)]
struct FuzzAdapter {
    port: u8,
    lifetime: FuzzLifetime,
    requires: Vec<u8>,
    fails: bool,
}

#[derive(Debug, Arbitrary)]
struct FuzzGraph {
    adapters: Vec<FuzzAdapter>,
    unchecked: bool,
}

fn port(index: u8) -> Port<Node> {
    Port::new(NAMES[index as usize % NAMES.len()])
}

fn check(result: Result<Arc<Node>, DiError>) {
    match result {
        Ok(_) => {}
        Err(DiError::CircularDependency { chain }) => {
            assert!(chain.len() >= 2);
            assert_eq!(chain.first(), chain.last());
        }
        Err(err) => assert!(err.port().is_some()),
    }
}

fuzz_target!(|input: FuzzGraph| {
    let mut builder = Graph::builder();
    for spec in input.adapters.iter().take(16) {
        let mut adapter = Adapter::builder(port(spec.port), spec.lifetime.into());
        for &required in spec.requires.iter().take(4) {
            adapter = adapter.requires(port(required));
        }
        let fails = spec.fails;
        builder = builder.provide(adapter.try_factory(move |_| {
            if fails { Err("factory failed".into()) } else { Ok(Node) }
        }));
    }

    let graph = if input.unchecked {
        builder.build_unchecked()
    } else {
        match builder.build() {
            Ok(graph) => graph,
            Err(GraphError::CaptiveDependency { lifetime, required_lifetime, .. }) => {
                assert!(!lifetime.can_depend_on(required_lifetime));
                return;
            }
            Err(_) => return,
        }
    };

    let root = Container::new(graph);
    let scope = match root.create_scope() {
        Ok(scope) => scope,
        Err(_) => return,
    };

    for index in 0..NAMES.len() as u8 {
        let port = port(index);
        let lifetime = root.inspector().lifetime_of(port);

        let from_root = root.resolve(port);
        if lifetime == Some(Lifetime::Scoped) {
            assert!(matches!(from_root, Err(DiError::ScopeRequired { .. })));
        }
        check(from_root);

        let first = scope.resolve(port);
        let second = scope.resolve(port);
        if let (Ok(a), Ok(b), Some(lifetime)) = (&first, &second, lifetime) {
            assert_eq!(Arc::ptr_eq(a, b), lifetime != Lifetime::Request);
        }
        check(first);
        check(second);
    }
});
