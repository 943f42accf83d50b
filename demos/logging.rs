//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```
//!
//! Narrow the output with `PORTWIRE_LOG=portwire=trace`.

use portwire::{Adapter, Container, Graph, Port};

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: std::sync::Arc<Database>,
}

#[allow(dead_code)]
struct RequestContext {
    request_id: String,
}

const DATABASE: Port<Database> = Port::new("Database");
const USERS: Port<UserService> = Port::new("UserService");
const CONTEXT: Port<RequestContext> = Port::new("RequestContext");
const MISSING: Port<u32> = Port::new("Missing");

#[tokio::main]
async fn main() {
    // JSON if logging-json is enabled, pretty if logging-pretty is
    portwire::logging::init();

    println!("=== portwire Logging Demo ===\n");

    // Logs: "Graph built and validated"
    let graph = Graph::builder()
        .provide(
            Adapter::singleton(DATABASE)
                .factory(|_| Database {
                    url: "postgres://localhost/mydb".into(),
                })
                .finalizer(|db| {
                    println!("  [App] Closing {}", db.url);
                    Ok(())
                }),
        )
        .provide(
            Adapter::request(USERS)
                .requires(DATABASE)
                .try_factory(|deps| Ok(UserService { db: deps.get(DATABASE)? })),
        )
        .provide(Adapter::scoped(CONTEXT).factory(|_| RequestContext {
            request_id: "req-12345".into(),
        }))
        .build()
        .expect("graph is valid");

    // Logs: "Creating root container"
    let container = Container::new(graph);

    // Logs: "Invoking factory", "Instance created and cached"
    let _users = container.resolve(USERS).unwrap();

    // Logs at trace: "Resolved from cache"
    let _db = container.resolve(DATABASE).unwrap();

    // Unknown port
    assert!(container.try_resolve(MISSING).is_none());

    // Logs: "Creating child scope"
    let request = container.create_scope().unwrap();
    let _ctx = request.resolve(CONTEXT).unwrap();

    // Scoped ports cannot come from the root
    if let Err(err) = container.resolve(CONTEXT) {
        println!("  [App] {err}");
    }

    // Logs: "Disposing resolver", "Disposing instance cache", "Resolver disposed"
    request.dispose().await.unwrap();
    container.dispose().await.unwrap();

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (pretty output)");
}
