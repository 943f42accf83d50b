//! Scoped resolvers
//!
//! A [`Scope`] is a child resolver for one unit of work, typically one
//! incoming request. It shares the container's graph and singleton cache,
//! owns its own cache for scoped instances, and must be disposed when the
//! unit of work ends.

use crate::container::ResolverCore;
use crate::error::{DisposalError, Result};
use crate::graph::Graph;
use crate::inspect::{Inspector, ResolverSnapshot};
use crate::port::Port;
use crate::provider::Injectable;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique resolver identifier.
///
/// Every container and scope gets one for tracking and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Generate a new unique ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// A child resolver with its own instance cache chained to its parent's.
///
/// Cloning a `Scope` clones the handle, not the scope.
///
/// # Examples
///
/// ```rust
/// use portwire::{Adapter, Container, Graph, Port};
/// use std::sync::Arc;
///
/// struct RequestContext;
/// const CONTEXT: Port<RequestContext> = Port::new("RequestContext");
///
/// let graph = Graph::builder()
///     .provide(Adapter::scoped(CONTEXT).factory(|_| RequestContext))
///     .build()
///     .unwrap();
/// let container = Container::new(graph);
///
/// let request = container.create_scope().unwrap();
/// let a = request.resolve(CONTEXT).unwrap();
/// let b = request.resolve(CONTEXT).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct Scope {
    core: Arc<ResolverCore>,
}

impl Scope {
    pub(crate) fn from_core(core: Arc<ResolverCore>) -> Self {
        Self { core }
    }

    /// Resolve a port from this scope.
    ///
    /// Singletons come from the container's cache, scoped instances from this
    /// scope's cache (or an ancestor scope that already created them), and
    /// request instances are created fresh.
    #[inline]
    pub fn resolve<T: ?Sized + Injectable>(&self, port: Port<T>) -> Result<Arc<T>> {
        self.core.resolve(port)
    }

    /// Resolve, returning `None` on any error.
    #[inline]
    pub fn try_resolve<T: ?Sized + Injectable>(&self, port: Port<T>) -> Option<Arc<T>> {
        self.core.resolve(port).ok()
    }

    /// Create a nested scope.
    pub fn create_scope(&self) -> Result<Scope> {
        self.core.create_child().map(Scope::from_core)
    }

    /// Dispose nested scopes, then this scope's own instances.
    ///
    /// The parent is left untouched. Calling this twice is a no-op.
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

    /// Whether an instance for the port is cached here or in an ancestor
    #[inline]
    pub fn is_resolved<T: ?Sized>(&self, port: Port<T>) -> bool {
        self.core.is_resolved(port.name())
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.core.id()
    }

    /// Nesting depth; direct children of the container are at depth 1
    #[inline]
    pub fn depth(&self) -> u32 {
        self.core.depth()
    }

    #[inline]
    pub fn graph(&self) -> &Arc<Graph> {
        self.core.graph()
    }

    /// Snapshot of this scope's state. For tooling only.
    #[inline]
    pub fn internal_state(&self) -> Result<ResolverSnapshot> {
        self.core.snapshot()
    }

    /// Read-only inspector for this scope. For tooling only.
    #[inline]
    pub fn inspector(&self) -> Inspector {
        Inspector::new(Arc::clone(&self.core))
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.core.id())
            .field("depth", &self.core.depth())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Adapter, Container, DiError};

    struct Tenant(u32);

    const TENANT: Port<Tenant> = Port::new("Tenant");

    fn container() -> Container {
        use std::sync::atomic::AtomicU32;
        let next = Arc::new(AtomicU32::new(0));
        let graph = Graph::builder()
            .provide(
                Adapter::scoped(TENANT)
                    .factory(move |_| Tenant(next.fetch_add(1, Ordering::SeqCst))),
            )
            .build()
            .unwrap();
        Container::new(graph)
    }

    #[test]
    fn test_scope_ids_unique() {
        let s1 = ScopeId::new();
        let s2 = ScopeId::new();
        let s3 = ScopeId::new();

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
    }

    #[test]
    fn test_scope_display() {
        let scope = ScopeId::new();
        let display = format!("{}", scope);
        assert!(display.starts_with("scope-"));
    }

    #[test]
    fn test_nested_scope_reuses_parent_scoped_instance() {
        let root = container();
        let outer = root.create_scope().unwrap();
        let from_outer = outer.resolve(TENANT).unwrap();

        let inner = outer.create_scope().unwrap();
        assert_eq!(inner.depth(), 2);
        assert!(inner.is_resolved(TENANT));

        let from_inner = inner.resolve(TENANT).unwrap();
        assert!(Arc::ptr_eq(&from_outer, &from_inner));
    }

    #[test]
    fn test_inner_scoped_instance_stays_inner() {
        let root = container();
        let outer = root.create_scope().unwrap();
        let inner = outer.create_scope().unwrap();

        let from_inner = inner.resolve(TENANT).unwrap();
        assert!(!outer.is_resolved(TENANT));

        let from_outer = outer.resolve(TENANT).unwrap();
        assert_ne!(from_inner.0, from_outer.0);
    }

    #[tokio::test]
    async fn test_disposed_scope_rejects_use() {
        let root = container();
        let scope = root.create_scope().unwrap();
        scope.dispose().await.unwrap();

        assert!(scope.is_disposed());
        assert!(matches!(
            scope.resolve(TENANT),
            Err(DiError::DisposedScope { port: "Tenant" })
        ));
        assert!(matches!(
            scope.create_scope(),
            Err(DiError::ResolverDisposed { .. })
        ));
        assert!(scope.try_resolve(TENANT).is_none());
    }

    #[tokio::test]
    async fn test_disposing_child_keeps_parent_usable() {
        let root = container();
        let parent = root.create_scope().unwrap();
        let before = parent.resolve(TENANT).unwrap();

        let child = parent.create_scope().unwrap();
        child.dispose().await.unwrap();

        assert!(!parent.is_disposed());
        let after = parent.resolve(TENANT).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }
}
