//! Error types for resolution, disposal and graph validation

use crate::port::PortName;
use crate::provider::Lifetime;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by factories and finalizers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared, cloneable form of a factory or finalizer failure.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving services
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A port is already being resolved further up the current chain.
    ///
    /// The chain starts and ends with the same port.
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<PortName> },

    /// The adapter's factory returned an error
    #[error("Factory for '{port}' failed: {cause}")]
    FactoryFailed {
        port: PortName,
        #[source]
        cause: SharedError,
    },

    /// `resolve` was called on a disposed container or scope
    #[error("Cannot resolve '{port}': scope has been disposed")]
    DisposedScope { port: PortName },

    /// A scoped port was requested from the root container
    #[error("Port '{port}' is scoped and cannot be resolved from the root container; create a scope first")]
    ScopeRequired { port: PortName },

    /// No adapter in the graph provides the port
    #[error("No adapter provides port '{port}'")]
    AdapterNotFound { port: PortName },

    /// A non-resolve operation was attempted on a disposed container or scope
    #[error("Cannot {operation}: resolver has been disposed")]
    ResolverDisposed { operation: &'static str },

    /// A factory read a port it did not declare in `requires`
    #[error("Port '{port}' was not declared as a dependency")]
    UndeclaredDependency { port: PortName },

    /// The instance stored under a port is not of the requested type
    #[error("Instance for port '{port}' is not a {expected}")]
    TypeMismatch {
        port: PortName,
        expected: &'static str,
    },
}

impl DiError {
    /// Create a FactoryFailed error, keeping the original cause
    #[inline]
    pub fn factory_failed(port: PortName, cause: BoxError) -> Self {
        Self::FactoryFailed {
            port,
            cause: Arc::from(cause),
        }
    }

    /// Create a CircularDependency error from the in-flight chain and the port that closes it
    pub fn circular(in_flight: &[PortName], port: PortName) -> Self {
        let start = in_flight.iter().position(|p| *p == port).unwrap_or(0);
        let mut chain = in_flight[start..].to_vec();
        chain.push(port);
        Self::CircularDependency { chain }
    }

    /// Create a TypeMismatch error for type T
    #[inline]
    pub fn type_mismatch<T: ?Sized>(port: PortName) -> Self {
        Self::TypeMismatch {
            port,
            expected: std::any::type_name::<T>(),
        }
    }

    /// True for errors the caller must fix in the graph or at the call site.
    pub fn is_programming_error(&self) -> bool {
        !self.is_runtime()
    }

    /// True for failures raised by a factory's own logic.
    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::FactoryFailed { .. })
    }

    /// The port the error is about, if there is one
    pub fn port(&self) -> Option<PortName> {
        match self {
            Self::CircularDependency { chain } => chain.first().copied(),
            Self::FactoryFailed { port, .. }
            | Self::DisposedScope { port }
            | Self::ScopeRequired { port }
            | Self::AdapterNotFound { port }
            | Self::UndeclaredDependency { port }
            | Self::TypeMismatch { port, .. } => Some(*port),
            Self::ResolverDisposed { .. } => None,
        }
    }
}

/// A single finalizer that failed during disposal
#[derive(Error, Debug, Clone)]
#[error("Finalizer for '{port}' failed: {cause}")]
pub struct FinalizerFailure {
    pub port: PortName,
    #[source]
    pub cause: SharedError,
}

impl FinalizerFailure {
    pub(crate) fn new(port: PortName, cause: BoxError) -> Self {
        Self {
            port,
            cause: Arc::from(cause),
        }
    }
}

/// Every finalizer failure collected while disposing a resolver tree.
///
/// Failures are kept in the order they happened: children before parents,
/// and most recently created first within one cache.
#[derive(Error, Debug, Clone)]
#[error("{} finalizer(s) failed during disposal: {}", .failures.len(), ports(.failures))]
pub struct DisposalError {
    failures: Vec<FinalizerFailure>,
}

fn ports(failures: &[FinalizerFailure]) -> String {
    failures
        .iter()
        .map(|f| f.port)
        .collect::<Vec<_>>()
        .join(", ")
}

impl DisposalError {
    /// Build from collected failures; `None` when nothing failed
    pub(crate) fn from_failures(failures: Vec<FinalizerFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    /// All failures, in occurrence order
    pub fn failures(&self) -> &[FinalizerFailure] {
        &self.failures
    }

    /// Number of failed finalizers
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false; a disposal error holds at least one failure
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Take ownership of the failures
    pub fn into_failures(self) -> Vec<FinalizerFailure> {
        self.failures
    }
}

/// Errors raised while building a [`Graph`](crate::Graph)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two adapters provide the same port
    #[error("Port '{port}' is provided by more than one adapter")]
    DuplicateAdapter { port: PortName },

    /// An adapter requires a port nothing provides
    #[error("Adapter for '{port}' requires '{requires}', which no adapter provides")]
    MissingDependency { port: PortName, requires: PortName },

    /// A longer-lived adapter depends on a shorter-lived one
    #[error("{lifetime} adapter '{port}' cannot depend on {required_lifetime} adapter '{requires}'")]
    CaptiveDependency {
        port: PortName,
        lifetime: Lifetime,
        requires: PortName,
        required_lifetime: Lifetime,
    },
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_chain_trims_to_cycle() {
        let err = DiError::circular(&["App", "X", "Y"], "X");
        match err {
            DiError::CircularDependency { chain } => assert_eq!(chain, vec!["X", "Y", "X"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_classification() {
        let cause: BoxError = "boom".into();
        assert!(DiError::factory_failed("Db", cause).is_runtime());
        assert!(DiError::ScopeRequired { port: "Db" }.is_programming_error());
        assert!(DiError::DisposedScope { port: "Db" }.is_programming_error());
        assert!(DiError::circular(&["A"], "A").is_programming_error());
    }

    #[test]
    fn test_factory_failed_keeps_source() {
        use std::error::Error as _;

        let cause: BoxError = Box::new(std::io::Error::other("connection refused"));
        let err = DiError::factory_failed("Database", cause);

        let source = err.source().expect("source preserved");
        assert_eq!(source.to_string(), "connection refused");
        assert_eq!(err.port(), Some("Database"));
    }

    #[test]
    fn test_disposal_error_lists_every_port() {
        let err = DisposalError::from_failures(vec![
            FinalizerFailure::new("P3", "a".into()),
            FinalizerFailure::new("P2", "b".into()),
        ])
        .unwrap();

        assert_eq!(err.len(), 2);
        assert_eq!(err.to_string(), "2 finalizer(s) failed during disposal: P3, P2");
        assert!(DisposalError::from_failures(Vec::new()).is_none());
    }
}
