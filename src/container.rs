//! Resolution engine and the root container
//!
//! `Container` and [`Scope`] are thin handles over one shared
//! `ResolverCore`. The core looks up the adapter for a port, resolves its
//! dependencies depth-first while tracking the in-flight chain to catch
//! cycles, and caches the result according to the adapter's lifetime:
//!
//! - **Singleton**: the root container's cache, shared by every scope
//! - **Scoped**: the current scope's cache (read through to ancestor scopes)
//! - **Request**: not cached at all
//!
//! Disposal cascades depth-first: live child scopes are disposed to
//! completion before a resolver's own cache is torn down.

use crate::error::{DiError, DisposalError, FinalizerFailure, Result};
use crate::factory::{Adapter, BoxFuture, Dependencies, Instance, downcast};
use crate::graph::Graph;
use crate::inspect::{Inspector, ResolverSnapshot};
use crate::port::{Port, PortName};
use crate::provider::{Injectable, Lifetime};
use crate::scope::{Scope, ScopeId};
use crate::storage::InstanceCache;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Resolver Core
// =============================================================================

/// State and algorithm shared by the container and every scope.
pub(crate) struct ResolverCore {
    id: ScopeId,
    depth: u32,
    /// Shared, read-only adapter index
    graph: Arc<Graph>,
    /// This resolver's own cache
    cache: Arc<InstanceCache>,
    /// The container's cache, where singletons live
    root_cache: Arc<InstanceCache>,
    parent: Option<Weak<ResolverCore>>,
    /// Live child scopes, for cascading disposal
    children: DashMap<ScopeId, Arc<ResolverCore>, RandomState>,
    disposed: AtomicBool,
}

impl ResolverCore {
    fn root(graph: Arc<Graph>) -> Self {
        let cache = Arc::new(InstanceCache::new());
        Self {
            id: ScopeId::new(),
            depth: 0,
            graph,
            root_cache: Arc::clone(&cache),
            cache,
            parent: None,
            children: DashMap::with_hasher(RandomState::new()),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub(crate) fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    #[inline]
    pub(crate) fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_resolved(&self, port: PortName) -> bool {
        self.cache.has(port) || self.root_cache.has(port)
    }

    /// Resolve a typed port
    pub(crate) fn resolve<T: ?Sized + Injectable>(&self, port: Port<T>) -> Result<Arc<T>> {
        #[cfg(feature = "logging")]
        trace!(
            target: "portwire",
            port = port.name(),
            scope_id = self.id.id(),
            depth = self.depth,
            "Resolving port"
        );

        let mut chain = Vec::new();
        let instance = self.resolve_instance(port.name(), &mut chain)?;
        downcast(port.name(), &instance)
    }

    /// Resolve one port; `chain` holds the ports currently in flight.
    fn resolve_instance(&self, port: PortName, chain: &mut Vec<PortName>) -> Result<Instance> {
        if self.is_disposed() {
            return Err(DiError::DisposedScope { port });
        }

        let adapter = self
            .graph
            .adapter(port)
            .ok_or(DiError::AdapterNotFound { port })?;

        let lifetime = adapter.lifetime();
        if lifetime == Lifetime::Scoped && self.is_root() {
            return Err(DiError::ScopeRequired { port });
        }

        if chain.contains(&port) {
            #[cfg(feature = "logging")]
            debug!(
                target: "portwire",
                port,
                chain = ?chain,
                "Circular dependency detected"
            );
            return Err(DiError::circular(chain, port));
        }

        let cache = match lifetime {
            Lifetime::Singleton => Some(&self.root_cache),
            Lifetime::Scoped => Some(&self.cache),
            Lifetime::Request => None,
        };

        // Already built: skip re-resolving dependencies
        if let Some(instance) = cache.and_then(|c| c.get(port)) {
            #[cfg(feature = "logging")]
            trace!(
                target: "portwire",
                port,
                lifetime = lifetime.as_str(),
                "Resolved from cache"
            );
            return Ok(instance);
        }

        chain.push(port);
        let deps = self.resolve_dependencies(adapter, chain);
        chain.pop();
        let deps = deps?;

        match cache {
            Some(cache) => {
                cache.get_or_create(port, || self.create(adapter, &deps), adapter.finalizer())
            }
            None => self.create(adapter, &deps),
        }
    }

    /// Resolve every required port into a dependency bag
    fn resolve_dependencies(
        &self,
        adapter: &Adapter,
        chain: &mut Vec<PortName>,
    ) -> Result<Dependencies> {
        let mut deps = Dependencies::with_capacity(adapter.requires().len());
        for &required in adapter.requires() {
            #[cfg(feature = "logging")]
            trace!(
                target: "portwire",
                port = adapter.provides(),
                requires = required,
                "Resolving dependency"
            );

            let instance = self.resolve_instance(required, chain)?;
            deps.insert(required, instance);
        }
        Ok(deps)
    }

    fn create(&self, adapter: &Adapter, deps: &Dependencies) -> Result<Instance> {
        #[cfg(feature = "logging")]
        debug!(
            target: "portwire",
            port = adapter.provides(),
            lifetime = adapter.lifetime().as_str(),
            scope_id = self.id.id(),
            depth = self.depth,
            "Invoking factory"
        );

        adapter.create(deps)
    }

    /// Fork a child resolver and register it for cascading disposal
    pub(crate) fn create_child(self: &Arc<Self>) -> Result<Arc<ResolverCore>> {
        if self.is_disposed() {
            return Err(DiError::ResolverDisposed {
                operation: "create scope",
            });
        }

        let child = Arc::new(ResolverCore {
            id: ScopeId::new(),
            depth: self.depth + 1,
            graph: Arc::clone(&self.graph),
            cache: Arc::new(self.cache.fork()),
            root_cache: Arc::clone(&self.root_cache),
            parent: Some(Arc::downgrade(self)),
            children: DashMap::with_hasher(RandomState::new()),
            disposed: AtomicBool::new(false),
        });

        #[cfg(feature = "logging")]
        debug!(
            target: "portwire",
            parent_id = self.id.id(),
            scope_id = child.id.id(),
            depth = child.depth,
            "Creating child scope"
        );

        self.children.insert(child.id, Arc::clone(&child));
        Ok(child)
    }

    /// Dispose this resolver and its subtree
    pub(crate) async fn dispose(&self) -> std::result::Result<(), DisposalError> {
        match DisposalError::from_failures(self.dispose_tree().await) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Children first (depth-first), then the own cache. Boxed for recursion.
    fn dispose_tree(&self) -> BoxFuture<'_, Vec<FinalizerFailure>> {
        Box::pin(async move {
            if self.disposed.swap(true, Ordering::AcqRel) {
                return Vec::new();
            }

            #[cfg(feature = "logging")]
            debug!(
                target: "portwire",
                scope_id = self.id.id(),
                depth = self.depth,
                children = self.children.len(),
                "Disposing resolver"
            );

            if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
                parent.children.remove(&self.id);
            }

            let children: Vec<Arc<ResolverCore>> =
                self.children.iter().map(|c| Arc::clone(c.value())).collect();
            self.children.clear();

            let mut failures = Vec::new();
            for child in children {
                failures.extend(child.dispose_tree().await);
            }
            failures.extend(self.cache.dispose_collect().await);

            #[cfg(feature = "logging")]
            debug!(
                target: "portwire",
                scope_id = self.id.id(),
                failures = failures.len(),
                "Resolver disposed"
            );

            failures
        })
    }

    /// Frozen view of this resolver and its live descendants
    pub(crate) fn snapshot(&self) -> Result<ResolverSnapshot> {
        if self.is_disposed() {
            return Err(DiError::ResolverDisposed { operation: "inspect" });
        }

        let mut children: Vec<Arc<ResolverCore>> =
            self.children.iter().map(|c| Arc::clone(c.value())).collect();
        children.sort_by_key(|c| c.id);

        Ok(ResolverSnapshot {
            scope_id: self.id,
            depth: self.depth,
            is_root: self.is_root(),
            disposed: false,
            adapters: self.graph.adapter_info(),
            entries: self.cache.entries().collect(),
            // Skip children disposed since we collected them
            children: children.iter().filter_map(|c| c.snapshot().ok()).collect(),
        })
    }
}

// =============================================================================
// Container
// =============================================================================

/// The root resolver.
///
/// Owns the singleton cache. Scoped ports cannot be resolved here; create a
/// [`Scope`] for them.
///
/// # Examples
///
/// ```rust
/// use portwire::{Adapter, Container, Graph, Port};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// const CONFIG: Port<Config> = Port::new("Config");
///
/// let graph = Graph::builder()
///     .provide(Adapter::singleton(CONFIG).factory(|_| Config { url: "postgres://localhost".into() }))
///     .build()
///     .unwrap();
///
/// let container = Container::new(graph);
/// let a = container.resolve(CONFIG).unwrap();
/// let b = container.resolve(CONFIG).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    core: Arc<ResolverCore>,
}

impl Container {
    /// Create a root container over a graph.
    ///
    /// Accepts a `Graph` or an `Arc<Graph>`; the graph is shared, not copied.
    pub fn new(graph: impl Into<Arc<Graph>>) -> Self {
        let graph = graph.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "portwire",
            adapters = graph.len(),
            "Creating root container"
        );

        Self {
            core: Arc::new(ResolverCore::root(graph)),
        }
    }

    /// Resolve a port.
    ///
    /// # Errors
    ///
    /// - `ScopeRequired` if the port (or a dependency) is scoped
    /// - `CircularDependency` if the port transitively requires itself
    /// - `FactoryFailed` if a factory returned an error
    /// - `DisposedScope` after [`dispose`](Self::dispose)
    #[inline]
    pub fn resolve<T: ?Sized + Injectable>(&self, port: Port<T>) -> Result<Arc<T>> {
        self.core.resolve(port)
    }

    /// Resolve, returning `None` on any error.
    #[inline]
    pub fn try_resolve<T: ?Sized + Injectable>(&self, port: Port<T>) -> Option<Arc<T>> {
        self.core.resolve(port).ok()
    }

    /// Create a scope for one unit of work.
    pub fn create_scope(&self) -> Result<Scope> {
        self.core.create_child().map(Scope::from_core)
    }

    /// Dispose every live scope, then the singletons, last-created first.
    ///
    /// All finalizers run even when some fail; the failures are reported
    /// together. Calling this twice is a no-op.
    pub async fn dispose(&self) -> std::result::Result<(), DisposalError> {
        self.core.dispose().await
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Whether the graph has an adapter for the port
    #[inline]
    pub fn has_adapter<T: ?Sized>(&self, port: Port<T>) -> bool {
        self.core.graph().provides(port)
    }

    /// Whether an instance for the port is cached in the container
    #[inline]
    pub fn is_resolved<T: ?Sized>(&self, port: Port<T>) -> bool {
        self.core.is_resolved(port.name())
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.core.id()
    }

    #[inline]
    pub fn graph(&self) -> &Arc<Graph> {
        self.core.graph()
    }

    /// Snapshot of the container and its scope tree. For tooling only.
    ///
    /// Application code should not depend on the snapshot's contents.
    #[inline]
    pub fn internal_state(&self) -> Result<ResolverSnapshot> {
        self.core.snapshot()
    }

    /// Read-only inspector for the container. For tooling only.
    #[inline]
    pub fn inspector(&self) -> Inspector {
        Inspector::new(Arc::clone(&self.core))
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.core.id())
            .field("adapters", &self.core.graph().len())
            .field("scopes", &self.core.children.len())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}
