//! Immutable adapter graph
//!
//! A [`Graph`] is the validated, order-preserving set of adapters a
//! container resolves from. It is shared by every resolver in a tree and
//! never mutated after it is built.
//!
//! # Validation
//!
//! [`GraphBuilder::build`] rejects graphs that cannot resolve correctly:
//!
//! - **Duplicates**: two adapters providing the same port
//! - **Missing dependencies**: a required port nobody provides
//! - **Captive dependencies**: a longer-lived adapter requiring a shorter-lived one
//!
//! ```rust
//! use portwire::{Adapter, Graph, GraphError, Port};
//!
//! struct Cache;
//! struct RequestId(u64);
//!
//! const CACHE: Port<Cache> = Port::new("Cache");
//! const REQUEST_ID: Port<RequestId> = Port::new("RequestId");
//!
//! // A singleton would hold on to one request's id forever
//! let result = Graph::builder()
//!     .provide(Adapter::request(REQUEST_ID).factory(|_| RequestId(1)))
//!     .provide(Adapter::singleton(CACHE).requires(REQUEST_ID).factory(|_| Cache))
//!     .build();
//!
//! assert!(matches!(result, Err(GraphError::CaptiveDependency { .. })));
//! ```

use crate::error::GraphError;
use crate::factory::Adapter;
use crate::inspect::AdapterInfo;
use crate::port::{Port, PortName};
use ahash::AHashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// The validated, immutable collection of adapters.
pub struct Graph {
    /// Adapters in registration order
    adapters: Vec<Adapter>,
    /// Port name to position in `adapters`
    index: AHashMap<PortName, usize>,
    /// Projection for the inspector, computed on first use
    info: OnceCell<Arc<[AdapterInfo]>>,
}

impl Graph {
    /// Start building a graph.
    #[inline]
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Look up the adapter that provides a port
    #[inline]
    pub fn adapter(&self, port: PortName) -> Option<&Adapter> {
        self.index.get(port).map(|&i| &self.adapters[i])
    }

    /// Whether some adapter provides the port
    #[inline]
    pub fn provides<T: ?Sized>(&self, port: Port<T>) -> bool {
        self.index.contains_key(port.name())
    }

    /// Adapters in registration order
    #[inline]
    pub fn adapters(&self) -> impl ExactSizeIterator<Item = &Adapter> + '_ {
        self.adapters.iter()
    }

    /// Provided ports in registration order
    #[inline]
    pub fn ports(&self) -> impl ExactSizeIterator<Item = PortName> + '_ {
        self.adapters.iter().map(Adapter::provides)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Check for missing and captive dependencies.
    ///
    /// For every adapter and each port it requires, the required adapter must
    /// exist and must not be shorter-lived than the dependent
    /// (Singleton < Scoped < Request).
    pub fn validate(&self) -> Result<(), GraphError> {
        for adapter in &self.adapters {
            for &requires in adapter.requires() {
                let required = self.adapter(requires).ok_or(GraphError::MissingDependency {
                    port: adapter.provides(),
                    requires,
                })?;

                if !adapter.lifetime().can_depend_on(required.lifetime()) {
                    return Err(GraphError::CaptiveDependency {
                        port: adapter.provides(),
                        lifetime: adapter.lifetime(),
                        requires,
                        required_lifetime: required.lifetime(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Adapter index for tooling, shared between callers
    pub(crate) fn adapter_info(&self) -> Arc<[AdapterInfo]> {
        let info = self.info.get_or_init(|| {
            self.adapters
                .iter()
                .map(|a| AdapterInfo {
                    port: a.provides(),
                    lifetime: a.lifetime(),
                    requires: a.requires().to_vec(),
                    has_finalizer: a.has_finalizer(),
                })
                .collect()
        });
        Arc::clone(info)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("ports", &self.ports().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects adapters into a [`Graph`].
#[derive(Default)]
pub struct GraphBuilder {
    adapters: Vec<Adapter>,
}

impl GraphBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter (or a finished adapter builder).
    #[inline]
    pub fn provide(mut self, adapter: impl Into<Adapter>) -> Self {
        self.adapters.push(adapter.into());
        self
    }

    /// Add several adapters at once.
    pub fn provide_all<I>(mut self, adapters: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Adapter>,
    {
        self.adapters.extend(adapters.into_iter().map(Into::into));
        self
    }

    /// Build and validate the graph.
    pub fn build(self) -> Result<Graph, GraphError> {
        let mut index = AHashMap::with_capacity(self.adapters.len());
        for (i, adapter) in self.adapters.iter().enumerate() {
            if index.insert(adapter.provides(), i).is_some() {
                return Err(GraphError::DuplicateAdapter {
                    port: adapter.provides(),
                });
            }
        }

        let graph = Graph {
            adapters: self.adapters,
            index,
            info: OnceCell::new(),
        };
        graph.validate()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "portwire",
            adapters = graph.len(),
            "Graph built and validated"
        );

        Ok(graph)
    }

    /// Build without validation.
    ///
    /// A later adapter for an already provided port replaces the earlier one
    /// in place. Resolution still fails at runtime on missing adapters,
    /// scoped ports at the root and cycles.
    pub fn build_unchecked(self) -> Graph {
        let mut adapters: Vec<Adapter> = Vec::with_capacity(self.adapters.len());
        let mut index = AHashMap::with_capacity(self.adapters.len());

        for adapter in self.adapters {
            match index.get(adapter.provides()) {
                Some(&i) => adapters[i] = adapter,
                None => {
                    index.insert(adapter.provides(), adapters.len());
                    adapters.push(adapter);
                }
            }
        }

        Graph {
            adapters,
            index,
            info: OnceCell::new(),
        }
    }
}
