//! Adapters and the factories that build instances
//!
//! An [`Adapter`] binds a port to a factory, the ports that factory needs,
//! a lifetime and an optional finalizer. Adapters are plain data: they are
//! built once while wiring the application and shared read-only by every
//! resolver afterwards.
//!
//! Instances are type-erased as `Arc<dyn Any + Send + Sync>` wrapping an
//! `Arc<T>`, so unsized contracts such as `dyn Logger` can be stored and
//! handed back without copying.

use crate::error::{BoxError, DiError, Result};
use crate::port::{Port, PortName};
use crate::provider::{Injectable, Lifetime};
use ahash::AHashMap;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A type-erased live instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased factory function
pub(crate) type FactoryFn =
    Arc<dyn Fn(&Dependencies) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// Type-erased finalizer, run once when the owning cache is disposed
pub type Finalizer =
    Arc<dyn Fn(Instance) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

/// Wrap a typed instance for storage
#[inline]
pub(crate) fn erase<T: ?Sized + Injectable>(instance: Arc<T>) -> Instance {
    Arc::new(instance) as Instance
}

/// Recover the typed `Arc<T>` from an erased instance
#[inline]
pub(crate) fn downcast<T: ?Sized + Injectable>(
    port: PortName,
    instance: &Instance,
) -> Result<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| DiError::type_mismatch::<T>(port))
}

// =============================================================================
// Dependencies
// =============================================================================

/// Resolved dependencies handed to a factory, keyed by port name.
#[derive(Default, Clone)]
pub struct Dependencies {
    resolved: AHashMap<PortName, Instance>,
}

impl Dependencies {
    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            resolved: AHashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub(crate) fn insert(&mut self, port: PortName, instance: Instance) {
        self.resolved.insert(port, instance);
    }

    /// Get a resolved dependency.
    ///
    /// Fails with `UndeclaredDependency` if the adapter did not list the port
    /// in its `requires`.
    pub fn get<T: ?Sized + Injectable>(&self, port: Port<T>) -> Result<Arc<T>> {
        let instance = self
            .resolved
            .get(port.name())
            .ok_or(DiError::UndeclaredDependency { port: port.name() })?;
        downcast(port.name(), instance)
    }

    /// Whether a port was resolved into this bag
    #[inline]
    pub fn contains(&self, port: PortName) -> bool {
        self.resolved.contains_key(port)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.resolved.keys()).finish()
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// A provider binding a port to its factory, dependencies and lifetime.
#[derive(Clone)]
pub struct Adapter {
    provides: PortName,
    requires: Vec<PortName>,
    lifetime: Lifetime,
    factory: FactoryFn,
    finalizer: Option<Finalizer>,
    type_name: &'static str,
}

impl Adapter {
    /// Start building an adapter with an explicit lifetime.
    #[inline]
    pub fn builder<T: ?Sized + Injectable>(port: Port<T>, lifetime: Lifetime) -> AdapterBuilder<T> {
        AdapterBuilder {
            port,
            lifetime,
            requires: Vec::new(),
            stage: NoFactory,
            finalizer: None,
        }
    }

    /// Start building a singleton adapter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portwire::{Adapter, Lifetime, Port};
    ///
    /// struct Config { debug: bool }
    /// const CONFIG: Port<Config> = Port::new("Config");
    ///
    /// let adapter = Adapter::singleton(CONFIG)
    ///     .factory(|_| Config { debug: true })
    ///     .build();
    ///
    /// assert_eq!(adapter.provides(), "Config");
    /// assert_eq!(adapter.lifetime(), Lifetime::Singleton);
    /// ```
    #[inline]
    pub fn singleton<T: ?Sized + Injectable>(port: Port<T>) -> AdapterBuilder<T> {
        Self::builder(port, Lifetime::Singleton)
    }

    /// Start building a scoped adapter.
    #[inline]
    pub fn scoped<T: ?Sized + Injectable>(port: Port<T>) -> AdapterBuilder<T> {
        Self::builder(port, Lifetime::Scoped)
    }

    /// Start building a request adapter.
    #[inline]
    pub fn request<T: ?Sized + Injectable>(port: Port<T>) -> AdapterBuilder<T> {
        Self::builder(port, Lifetime::Request)
    }

    /// The port this adapter provides
    #[inline]
    pub fn provides(&self) -> PortName {
        self.provides
    }

    /// Required ports, in declaration order
    #[inline]
    pub fn requires(&self) -> &[PortName] {
        &self.requires
    }

    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    #[inline]
    pub fn finalizer(&self) -> Option<&Finalizer> {
        self.finalizer.as_ref()
    }

    #[inline]
    pub fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }

    /// Rust type name of the provided contract
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Run the factory, wrapping any failure in `FactoryFailed`.
    pub(crate) fn create(&self, deps: &Dependencies) -> Result<Instance> {
        (self.factory)(deps).map_err(|cause| DiError::factory_failed(self.provides, cause))
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("provides", &self.provides)
            .field("requires", &self.requires)
            .field("lifetime", &self.lifetime)
            .field("has_finalizer", &self.finalizer.is_some())
            .field("type_name", &self.type_name)
            .finish()
    }
}

// =============================================================================
// Type-State Builder
// =============================================================================

/// Builder state before a factory is set.
pub struct NoFactory;

/// Builder state once a factory is set.
pub struct WithFactory(FactoryFn);

/// A type-state adapter builder.
///
/// `requires` can only be declared before the factory; `finalizer` and
/// `build` only become available once a factory is set.
pub struct AdapterBuilder<T: ?Sized, S = NoFactory> {
    port: Port<T>,
    lifetime: Lifetime,
    requires: Vec<PortName>,
    stage: S,
    finalizer: Option<Finalizer>,
}

impl<T: ?Sized + Injectable> AdapterBuilder<T, NoFactory> {
    /// Declare a required port. Declaring the same port twice has no effect.
    #[inline]
    pub fn requires<U: ?Sized>(mut self, port: Port<U>) -> Self {
        if !self.requires.contains(&port.name()) {
            self.requires.push(port.name());
        }
        self
    }

    /// Set an infallible factory.
    pub fn factory<F>(self, factory: F) -> AdapterBuilder<T, WithFactory>
    where
        T: Sized,
        F: Fn(&Dependencies) -> T + Send + Sync + 'static,
    {
        let erased: FactoryFn =
            Arc::new(move |deps: &Dependencies| Ok(erase(Arc::new(factory(deps)))));
        self.with_factory(erased)
    }

    /// Set a factory that can fail.
    ///
    /// A returned error surfaces to the caller as `DiError::FactoryFailed`
    /// with the error kept as its source.
    pub fn try_factory<F>(self, factory: F) -> AdapterBuilder<T, WithFactory>
    where
        T: Sized,
        F: Fn(&Dependencies) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let erased: FactoryFn =
            Arc::new(move |deps: &Dependencies| factory(deps).map(|value| erase(Arc::new(value))));
        self.with_factory(erased)
    }

    /// Set a factory returning a shared pointer.
    ///
    /// This is the way to provide unsized contracts like `Port<dyn Logger>`.
    pub fn shared_factory<F>(self, factory: F) -> AdapterBuilder<T, WithFactory>
    where
        F: Fn(&Dependencies) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let erased: FactoryFn = Arc::new(move |deps: &Dependencies| factory(deps).map(erase));
        self.with_factory(erased)
    }

    fn with_factory(self, factory: FactoryFn) -> AdapterBuilder<T, WithFactory> {
        AdapterBuilder {
            port: self.port,
            lifetime: self.lifetime,
            requires: self.requires,
            stage: WithFactory(factory),
            finalizer: self.finalizer,
        }
    }
}

impl<T: ?Sized + Injectable> AdapterBuilder<T, WithFactory> {
    /// Set a synchronous finalizer.
    ///
    /// Request-lifetime instances are never cached, so their finalizer never runs.
    pub fn finalizer<F>(mut self, finalizer: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let port = self.port.name();
        let erased: Finalizer = Arc::new(move |instance: Instance| {
            let result = match instance.downcast_ref::<Arc<T>>() {
                Some(value) => finalizer(value),
                None => Err(DiError::type_mismatch::<T>(port).into()),
            };
            Box::pin(std::future::ready(result)) as BoxFuture<'static, _>
        });
        self.finalizer = Some(erased);
        self
    }

    /// Set an asynchronous finalizer.
    pub fn async_finalizer<F, Fut>(mut self, finalizer: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let port = self.port.name();
        let erased: Finalizer = Arc::new(
            move |instance: Instance| -> BoxFuture<'static, std::result::Result<(), BoxError>> {
                match instance.downcast_ref::<Arc<T>>() {
                    Some(value) => Box::pin(finalizer(Arc::clone(value))),
                    None => Box::pin(std::future::ready(Err(
                        DiError::type_mismatch::<T>(port).into(),
                    ))),
                }
            },
        );
        self.finalizer = Some(erased);
        self
    }

    /// Finish the adapter.
    pub fn build(self) -> Adapter {
        Adapter {
            provides: self.port.name(),
            requires: self.requires,
            lifetime: self.lifetime,
            factory: self.stage.0,
            finalizer: self.finalizer,
            type_name: std::any::type_name::<T>(),
        }
    }
}

impl<T: ?Sized + Injectable> From<AdapterBuilder<T, WithFactory>> for Adapter {
    #[inline]
    fn from(builder: AdapterBuilder<T, WithFactory>) -> Self {
        builder.build()
    }
}
