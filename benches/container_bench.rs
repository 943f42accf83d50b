//! Benchmarks for graph building, resolution and teardown

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use portwire::{Adapter, Container, Graph, Port};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct Config {
    url: String,
}

#[allow(dead_code)]
struct Pool {
    config: Arc<Config>,
}

#[allow(dead_code)]
struct Session {
    pool: Arc<Pool>,
    values: Vec<i32>,
}

#[allow(dead_code)]
struct Handler {
    session: Arc<Session>,
    config: Arc<Config>,
}

const CONFIG: Port<Config> = Port::new("Config");
const POOL: Port<Pool> = Port::new("Pool");
const SESSION: Port<Session> = Port::new("Session");
const HANDLER: Port<Handler> = Port::new("Handler");
const MISSING: Port<Config> = Port::new("Missing");

fn app_graph() -> Graph {
    Graph::builder()
        .provide(Adapter::singleton(CONFIG).factory(|_| Config {
            url: "postgres://localhost".into(),
        }))
        .provide(
            Adapter::singleton(POOL)
                .requires(CONFIG)
                .try_factory(|deps| Ok(Pool { config: deps.get(CONFIG)? })),
        )
        .provide(
            Adapter::scoped(SESSION)
                .requires(POOL)
                .try_factory(|deps| {
                    Ok(Session {
                        pool: deps.get(POOL)?,
                        values: vec![1, 2, 3],
                    })
                })
                .finalizer(|_| Ok(())),
        )
        .provide(
            Adapter::request(HANDLER)
                .requires(SESSION)
                .requires(CONFIG)
                .try_factory(|deps| {
                    Ok(Handler {
                        session: deps.get(SESSION)?,
                        config: deps.get(CONFIG)?,
                    })
                }),
        )
        .build()
        .unwrap()
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");

    group.bench_function("build_4_adapters", |b| b.iter(|| black_box(app_graph())));

    group.bench_function("build_unchecked_4_adapters", |b| {
        b.iter(|| {
            let graph = Graph::builder()
                .provide(Adapter::singleton(CONFIG).factory(|_| Config { url: String::new() }))
                .provide(Adapter::singleton(POOL).requires(CONFIG).try_factory(|deps| {
                    Ok(Pool { config: deps.get(CONFIG)? })
                }))
                .build_unchecked();
            black_box(graph)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = Container::new(app_graph());
    container.resolve(POOL).unwrap();

    group.bench_function("singleton_cached", |b| {
        b.iter(|| black_box(container.resolve(CONFIG).unwrap()))
    });

    group.bench_function("singleton_with_dependency_cached", |b| {
        b.iter(|| black_box(container.resolve(POOL).unwrap()))
    });

    group.bench_function("try_resolve_missing", |b| {
        b.iter(|| black_box(container.try_resolve(MISSING)))
    });

    group.bench_function("has_adapter", |b| {
        b.iter(|| black_box(container.has_adapter(SESSION)))
    });

    group.finish();
}

fn bench_scoped(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped");

    let root = Container::new(app_graph());
    root.resolve(POOL).unwrap();

    group.bench_function("scoped_cached", |b| {
        let scope = root.create_scope().unwrap();
        scope.resolve(SESSION).unwrap();

        b.iter(|| black_box(scope.resolve(SESSION).unwrap()))
    });

    group.bench_function("request_chain", |b| {
        let scope = root.create_scope().unwrap();

        b.iter(|| black_box(scope.resolve(HANDLER).unwrap()))
    });

    group.bench_function("singleton_from_nested_scope", |b| {
        let outer = root.create_scope().unwrap();
        let inner = outer.create_scope().unwrap();

        b.iter(|| black_box(inner.resolve(CONFIG).unwrap()))
    });

    group.finish();
}

fn bench_dispose(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispose");

    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let root = Container::new(app_graph());

    group.bench_function("empty_scope", |b| {
        b.iter(|| {
            let scope = root.create_scope().unwrap();
            runtime.block_on(scope.dispose()).unwrap();
        })
    });

    // A typical request: open a scope, build a handler, tear it down
    group.bench_function("request_lifecycle", |b| {
        b.iter(|| {
            let scope = root.create_scope().unwrap();
            black_box(scope.resolve(HANDLER).unwrap());
            runtime.block_on(scope.dispose()).unwrap();
        })
    });

    group.bench_function("nested_scopes_4", |b| {
        b.iter(|| {
            let top = root.create_scope().unwrap();
            let mut current = top.clone();
            for _ in 0..3 {
                current = current.create_scope().unwrap();
                current.resolve(SESSION).unwrap();
            }
            runtime.block_on(top.dispose()).unwrap();
        })
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = Container::new(app_graph());
        container.resolve(POOL).unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.resolve(POOL).unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_graph,
    bench_resolution,
    bench_scoped,
    bench_dispose,
    bench_concurrent,
);

criterion_main!(benches);
