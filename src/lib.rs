//! # portwire - Port/Adapter Dependency Injection
//!
//! A resolution engine for port/adapter wiring: typed ports name service
//! contracts, adapters say how to build them, and a container resolves the
//! whole graph with per-lifetime caching and ordered, async teardown.
//!
//! ## Features
//!
//! - **Typed ports** - `resolve(Port<T>)` returns `Arc<T>`, including `Port<dyn Trait>`
//! - **Three lifetimes** - Singleton (one per container), Scoped (one per scope), Request (never cached)
//! - **Validated graphs** - duplicate, missing and captive dependencies rejected up front
//! - **Cycle detection** - with the full port chain in the error
//! - **Ordered teardown** - finalizers run last-created-first, children before parents, every failure reported
//! - **Inspectable** - read-only snapshots of the scope tree for tooling
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use portwire::{Adapter, Container, Graph, Port};
//! use std::sync::Arc;
//!
//! struct Logger;
//! struct Database { logger: Arc<Logger> }
//! struct UserService { db: Arc<Database> }
//!
//! const LOGGER: Port<Logger> = Port::new("Logger");
//! const DATABASE: Port<Database> = Port::new("Database");
//! const USERS: Port<UserService> = Port::new("UserService");
//!
//! let graph = Graph::builder()
//!     .provide(Adapter::singleton(LOGGER).factory(|_| Logger))
//!     .provide(
//!         Adapter::scoped(DATABASE)
//!             .requires(LOGGER)
//!             .try_factory(|deps| Ok(Database { logger: deps.get(LOGGER)? })),
//!     )
//!     .provide(
//!         Adapter::request(USERS)
//!             .requires(DATABASE)
//!             .try_factory(|deps| Ok(UserService { db: deps.get(DATABASE)? })),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let container = Container::new(graph);
//! let request = container.create_scope().unwrap();
//!
//! let users = request.resolve(USERS).unwrap();
//! let db = request.resolve(DATABASE).unwrap();
//! assert!(Arc::ptr_eq(&users.db, &db));
//! ```
//!
//! ## Lifetimes
//!
//! | Lifetime  | Cached in            | Resolvable from root |
//! |-----------|----------------------|----------------------|
//! | Singleton | the container        | yes                  |
//! | Scoped    | the resolving scope  | no (`ScopeRequired`) |
//! | Request   | nowhere              | yes                  |
//!
//! A longer-lived adapter may not require a shorter-lived one; the graph
//! builder rejects such captive dependencies.
//!
//! ## Teardown
//!
//! Disposal is explicit and async, since finalizers may await:
//!
//! ```rust
//! use portwire::{Adapter, Container, Graph, Port};
//!
//! struct Pool;
//! const POOL: Port<Pool> = Port::new("Pool");
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let graph = Graph::builder()
//!     .provide(
//!         Adapter::singleton(POOL)
//!             .factory(|_| Pool)
//!             .async_finalizer(|_pool| async { Ok::<(), portwire::BoxError>(()) }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let container = Container::new(graph);
//! container.resolve(POOL).unwrap();
//! container.dispose().await.unwrap();
//! assert!(container.is_disposed());
//! # }
//! ```

mod container;
mod error;
mod factory;
mod graph;
mod inspect;
#[cfg(feature = "logging")]
pub mod logging;
mod port;
mod provider;
mod scope;
mod storage;

pub use container::Container;
pub use error::*;
pub use factory::{
    Adapter, AdapterBuilder, BoxFuture, Dependencies, Finalizer, Instance, NoFactory, WithFactory,
};
pub use graph::{Graph, GraphBuilder};
pub use inspect::{AdapterInfo, CacheEntryInfo, Inspector, ResolverSnapshot};
pub use port::{Port, PortName};
pub use provider::{Injectable, Lifetime};
pub use scope::{Scope, ScopeId};
pub use storage::InstanceCache;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Adapter, BoxError, Container, Dependencies, DiError, DisposalError, Graph, GraphError,
        Injectable, Lifetime, Port, Result, Scope,
    };
    pub use std::sync::Arc;
}
