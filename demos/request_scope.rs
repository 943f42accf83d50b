//! One scope per request
//!
//! Wires a small web-style application: a shared connection pool, a
//! per-request unit of work and a per-call handler. Each simulated request
//! gets its own scope, which is disposed when the request ends.
//!
//! ```bash
//! cargo run --example request_scope
//! ```

use portwire::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Shared for the whole process
struct ConnectionPool {
    dsn: String,
    opened: AtomicU32,
}

/// One per request; committed when the request's scope is disposed
struct UnitOfWork {
    pool: Arc<ConnectionPool>,
    connection: u32,
}

/// Built fresh for every call
struct CheckoutHandler {
    uow: Arc<UnitOfWork>,
}

impl CheckoutHandler {
    fn handle(&self, order: &str) -> String {
        format!(
            "order {order} on connection #{} ({})",
            self.uow.connection, self.uow.pool.dsn
        )
    }
}

const POOL: Port<ConnectionPool> = Port::new("ConnectionPool");
const UOW: Port<UnitOfWork> = Port::new("UnitOfWork");
const CHECKOUT: Port<CheckoutHandler> = Port::new("CheckoutHandler");

fn graph() -> std::result::Result<Graph, GraphError> {
    Graph::builder()
        .provide(
            Adapter::singleton(POOL)
                .factory(|_| ConnectionPool {
                    dsn: "postgres://localhost/shop".into(),
                    opened: AtomicU32::new(0),
                })
                .async_finalizer(|pool| async move {
                    println!(
                        "closing pool after {} connections",
                        pool.opened.load(Ordering::SeqCst)
                    );
                    Ok::<(), BoxError>(())
                }),
        )
        .provide(
            Adapter::scoped(UOW)
                .requires(POOL)
                .try_factory(|deps| {
                    let pool = deps.get(POOL)?;
                    let connection = pool.opened.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(UnitOfWork { pool, connection })
                })
                .async_finalizer(|uow| async move {
                    println!("  commit on connection #{}", uow.connection);
                    Ok::<(), BoxError>(())
                }),
        )
        .provide(
            Adapter::request(CHECKOUT)
                .requires(UOW)
                .try_factory(|deps| Ok(CheckoutHandler { uow: deps.get(UOW)? })),
        )
        .build()
}

#[tokio::main]
async fn main() -> std::result::Result<(), BoxError> {
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    portwire::logging::init();

    let container = Container::new(graph()?);

    for (request, orders) in [("r1", ["a-100", "a-101"]), ("r2", ["b-200", "b-201"])] {
        println!("request {request}");
        let scope = container.create_scope()?;

        for order in orders {
            let handler = scope.resolve(CHECKOUT)?;
            println!("  {}", handler.handle(order));
        }

        let snapshot = scope.internal_state()?;
        let cached: Vec<_> = snapshot.entries.iter().map(|e| e.port).collect();
        println!("  cached in scope: {cached:?}");

        scope.dispose().await?;
    }

    // The unit of work cannot outlive a request
    match container.resolve(UOW) {
        Err(err @ DiError::ScopeRequired { .. }) => println!("{err}"),
        other => println!("unexpected: {:?}", other.err()),
    }

    container.dispose().await?;
    Ok(())
}
