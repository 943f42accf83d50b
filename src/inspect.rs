//! Read-only views of resolver state for tooling
//!
//! Nothing here can change a resolver. A [`ResolverSnapshot`] is an owned
//! copy of the state at the moment it was taken; taking one on a disposed
//! resolver fails instead of returning stale data.

use crate::container::ResolverCore;
use crate::error::Result;
use crate::port::{Port, PortName};
use crate::provider::Lifetime;
use crate::scope::ScopeId;
use std::sync::Arc;
use std::time::SystemTime;

/// Static description of one adapter in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub port: PortName,
    pub lifetime: Lifetime,
    pub requires: Vec<PortName>,
    pub has_finalizer: bool,
}

/// One entry of a cache's creation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub port: PortName,
    pub resolved_at: SystemTime,
    /// Strictly increasing within the owning cache
    pub resolution_order: u64,
    pub has_finalizer: bool,
}

/// Frozen state of a container or scope and its live descendants.
#[derive(Debug, Clone)]
pub struct ResolverSnapshot {
    pub scope_id: ScopeId,
    pub depth: u32,
    pub is_root: bool,
    pub disposed: bool,
    /// Adapter index, shared by every snapshot of the same graph
    pub adapters: Arc<[AdapterInfo]>,
    /// This resolver's own cache entries, oldest first
    pub entries: Vec<CacheEntryInfo>,
    /// Live child scopes, ordered by scope id
    pub children: Vec<ResolverSnapshot>,
}

impl ResolverSnapshot {
    /// Number of resolvers in this subtree, including this one
    pub fn scope_count(&self) -> usize {
        1 + self.children.iter().map(ResolverSnapshot::scope_count).sum::<usize>()
    }

    /// Find this resolver's own cache entry for a port
    pub fn entry(&self, port: PortName) -> Option<&CacheEntryInfo> {
        self.entries.iter().find(|e| e.port == port)
    }

    /// Depth-first walk over this snapshot and all descendants
    pub fn walk(&self) -> impl Iterator<Item = &ResolverSnapshot> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

/// Thin reporting façade over a container or scope.
///
/// Obtained from [`Container::inspector`](crate::Container::inspector) or
/// [`Scope::inspector`](crate::Scope::inspector). Intended for diagnostics
/// and dev tooling, not application logic.
#[derive(Clone)]
pub struct Inspector {
    core: Arc<ResolverCore>,
}

impl Inspector {
    pub(crate) fn new(core: Arc<ResolverCore>) -> Self {
        Self { core }
    }

    /// Take a fresh snapshot
    #[inline]
    pub fn snapshot(&self) -> Result<ResolverSnapshot> {
        self.core.snapshot()
    }

    /// Ports created by this resolver's own cache, in creation order
    pub fn resolved_ports(&self) -> Result<Vec<PortName>> {
        Ok(self.snapshot()?.entries.iter().map(|e| e.port).collect())
    }

    /// Live resolvers in this subtree, including this one
    pub fn scope_count(&self) -> Result<usize> {
        Ok(self.snapshot()?.scope_count())
    }

    /// Lifetime of the adapter providing a port
    pub fn lifetime_of<T: ?Sized>(&self, port: Port<T>) -> Option<Lifetime> {
        self.core.graph().adapter(port.name()).map(|a| a.lifetime())
    }

    /// The graph's adapter index
    #[inline]
    pub fn adapters(&self) -> Arc<[AdapterInfo]> {
        self.core.graph().adapter_info()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("scope_id", &self.core.id())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}
