//! Instance cache for resolved services
//!
//! Each resolver owns one `InstanceCache`. A cache created with [`fork`](InstanceCache::fork)
//! reads through to its parent, so instances created in an ancestor are
//! visible below it, but a child never writes into its parent.
//!
//! Every instance the cache creates is appended to a creation log; disposal
//! replays that log in reverse.

use crate::error::{DiError, DisposalError, FinalizerFailure, Result};
use crate::factory::{Finalizer, Instance};
use crate::inspect::CacheEntryInfo;
use crate::port::PortName;
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// Lock a mutex, recovering the data if a previous holder panicked
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One record in the creation log
struct LogEntry {
    port: PortName,
    instance: Instance,
    finalizer: Option<Finalizer>,
    resolved_at: SystemTime,
    resolution_order: u64,
}

impl LogEntry {
    fn info(&self) -> CacheEntryInfo {
        CacheEntryInfo {
            port: self.port,
            resolved_at: self.resolved_at,
            resolution_order: self.resolution_order,
            has_finalizer: self.finalizer.is_some(),
        }
    }
}

/// Memoizing, disposal-ordered store of live instances.
pub struct InstanceCache {
    /// Port name to its creation slot; a slot is empty until its factory succeeds
    values: DashMap<PortName, Arc<OnceCell<Instance>>, RandomState>,
    /// Creation-order log; only instances created by this cache
    log: Mutex<Vec<LogEntry>>,
    /// Next resolution order, local to this cache
    next_order: AtomicU64,
    /// Optional parent cache for read-through lookup
    parent: Option<Arc<InstanceCache>>,
    disposed: AtomicBool,
}

impl InstanceCache {
    /// Create an empty root cache.
    ///
    /// Uses 8 shards; a resolver rarely holds more than a few dozen instances.
    #[inline]
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Arc<InstanceCache>>) -> Self {
        Self {
            values: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            log: Mutex::new(Vec::new()),
            next_order: AtomicU64::new(0),
            parent,
            disposed: AtomicBool::new(false),
        }
    }

    /// Create an empty child cache whose parent is `self`.
    #[inline]
    pub fn fork(self: &Arc<Self>) -> Self {
        Self::with_parent(Some(Arc::clone(self)))
    }

    /// Look up an instance in this cache only
    #[inline]
    pub fn get_local(&self, port: PortName) -> Option<Instance> {
        self.values.get(port).and_then(|slot| slot.get().cloned())
    }

    /// Look up an instance in this cache, then up the parent chain.
    pub fn get(&self, port: PortName) -> Option<Instance> {
        if let Some(instance) = self.get_local(port) {
            return Some(instance);
        }

        let mut current = self.parent.as_ref();
        while let Some(cache) = current {
            if let Some(instance) = cache.get_local(port) {
                return Some(instance);
            }
            current = cache.parent.as_ref();
        }

        None
    }

    /// Check if an instance exists in this cache or any ancestor.
    #[inline]
    pub fn has(&self, port: PortName) -> bool {
        self.get(port).is_some()
    }

    /// Return the cached instance for `port`, creating it if no cache in the chain has it.
    ///
    /// When an ancestor already holds the port the whole call is delegated
    /// there, so the instance is never duplicated into this cache. Otherwise
    /// `factory` runs, and the result is stored and logged here.
    ///
    /// Creation is single-flight per port: concurrent callers block until
    /// the first factory finishes and then share its instance. If that
    /// factory fails, the next waiter runs its own. A factory must not
    /// re-enter the same port on the same thread; cycles must be caught
    /// before calling.
    pub fn get_or_create<F>(
        &self,
        port: PortName,
        factory: F,
        finalizer: Option<&Finalizer>,
    ) -> Result<Instance>
    where
        F: FnOnce() -> Result<Instance>,
    {
        if let Some(instance) = self.get_local(port) {
            #[cfg(feature = "logging")]
            trace!(target: "portwire", port, "Instance cache hit");
            return Ok(instance);
        }

        if let Some(parent) = &self.parent {
            if parent.has(port) {
                #[cfg(feature = "logging")]
                trace!(target: "portwire", port, "Delegating to parent cache");
                return parent.get_or_create(port, factory, finalizer);
            }
        }

        if self.is_disposed() {
            return Err(DiError::DisposedScope { port });
        }

        // Clone the slot out so no shard lock is held while the factory runs
        let slot = Arc::clone(self.values.entry(port).or_default().value());
        slot.get_or_try_init(|| {
            let instance = factory()?;
            self.record(port, &instance, finalizer)?;
            Ok(instance)
        })
        .cloned()
    }

    /// Append a freshly created instance to the creation log.
    fn record(
        &self,
        port: PortName,
        instance: &Instance,
        finalizer: Option<&Finalizer>,
    ) -> Result<()> {
        let mut log = lock(&self.log);
        if self.is_disposed() {
            return Err(DiError::DisposedScope { port });
        }

        let resolution_order = self.next_order.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        debug!(
            target: "portwire",
            port,
            order = resolution_order,
            finalizer = finalizer.is_some(),
            "Instance created and cached"
        );

        log.push(LogEntry {
            port,
            instance: Arc::clone(instance),
            finalizer: finalizer.cloned(),
            resolved_at: SystemTime::now(),
            resolution_order,
        });
        Ok(())
    }

    /// This cache's own creation log, oldest first.
    ///
    /// Ancestors are not included. Each call takes a fresh snapshot.
    pub fn entries(&self) -> std::vec::IntoIter<CacheEntryInfo> {
        let snapshot: Vec<CacheEntryInfo> = lock(&self.log).iter().map(LogEntry::info).collect();
        snapshot.into_iter()
    }

    /// Number of instances this cache created
    pub fn len(&self) -> usize {
        self.values.iter().filter(|slot| slot.get().is_some()).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose this cache, running finalizers last-created-first.
    ///
    /// Every finalizer runs even if earlier ones fail; all failures are
    /// reported together. The parent cache is never touched.
    pub async fn dispose(&self) -> std::result::Result<(), DisposalError> {
        match DisposalError::from_failures(self.dispose_collect().await) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Dispose and return the raw failure list; a second call is a no-op.
    pub(crate) async fn dispose_collect(&self) -> Vec<FinalizerFailure> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }

        let entries = std::mem::take(&mut *lock(&self.log));

        #[cfg(feature = "logging")]
        debug!(
            target: "portwire",
            instances = entries.len(),
            "Disposing instance cache"
        );

        let mut failures = Vec::new();
        for entry in entries.into_iter().rev() {
            let Some(finalizer) = entry.finalizer else {
                continue;
            };

            if let Err(cause) = finalizer(entry.instance).await {
                #[cfg(feature = "logging")]
                warn!(
                    target: "portwire",
                    port = entry.port,
                    error = %cause,
                    "Finalizer failed"
                );
                failures.push(FinalizerFailure::new(entry.port, cause));
            }
        }

        self.values.clear();
        failures
    }
}

impl Default for InstanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("count", &self.len())
            .field("has_parent", &self.parent.is_some())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::factory::BoxFuture;
    use std::sync::atomic::AtomicU32;

    fn value(n: u32) -> Result<Instance> {
        Ok(Arc::new(n) as Instance)
    }

    fn read(instance: &Instance) -> u32 {
        *instance.downcast_ref::<u32>().unwrap()
    }

    /// Finalizer that records its port into `order`, failing when `fail` is set
    fn recording(order: Arc<Mutex<Vec<PortName>>>, port: PortName, fail: bool) -> Finalizer {
        Arc::new(move |_instance: Instance| {
            let order = Arc::clone(&order);
            Box::pin(async move {
                order.lock().unwrap().push(port);
                if fail {
                    Err::<(), BoxError>(format!("{port} failed").into())
                } else {
                    Ok(())
                }
            }) as BoxFuture<'static, _>
        })
    }

    #[test]
    fn test_get_or_create_memoizes() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        let cache = InstanceCache::new();

        let make = || {
            CALLS.fetch_add(1, Ordering::SeqCst);
            value(7)
        };
        let a = cache.get_or_create("A", make, None).unwrap();
        let b = cache.get_or_create("A", make, None).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entries().len(), 1);
    }

    #[test]
    fn test_fork_reads_through_parent() {
        let root = Arc::new(InstanceCache::new());
        root.get_or_create("Logger", || value(1), None).unwrap();

        let child = root.fork();
        assert!(child.has("Logger"));
        assert!(child.get_local("Logger").is_none());

        let from_child = child.get_or_create("Logger", || value(2), None).unwrap();
        assert_eq!(read(&from_child), 1);
        // Nothing was duplicated into the child
        assert_eq!(child.entries().len(), 0);
    }

    #[test]
    fn test_child_never_pollutes_parent() {
        let root = Arc::new(InstanceCache::new());
        let child = root.fork();

        child.get_or_create("Db", || value(3), None).unwrap();

        assert!(child.has("Db"));
        assert!(!root.has("Db"));
        assert_eq!(root.entries().len(), 0);
    }

    #[test]
    fn test_entries_in_creation_order() {
        let cache = InstanceCache::new();
        for port in ["P1", "P2", "P3"] {
            cache.get_or_create(port, || value(0), None).unwrap();
        }

        let entries: Vec<_> = cache.entries().collect();
        let ports: Vec<_> = entries.iter().map(|e| e.port).collect();
        let orders: Vec<_> = entries.iter().map(|e| e.resolution_order).collect();

        assert_eq!(ports, vec!["P1", "P2", "P3"]);
        assert_eq!(orders, vec![0, 1, 2]);

        // Restartable
        assert_eq!(cache.entries().count(), 3);
    }

    #[test]
    fn test_factory_error_stores_nothing() {
        let cache = InstanceCache::new();
        let result = cache.get_or_create(
            "Bad",
            || Err(DiError::factory_failed("Bad", "nope".into())),
            None,
        );

        assert!(result.is_err());
        assert!(!cache.has("Bad"));
        assert_eq!(cache.entries().len(), 0);
    }

    #[test]
    fn test_failed_creation_can_be_retried() {
        let cache = InstanceCache::new();
        let failed = cache.get_or_create(
            "Flaky",
            || Err(DiError::factory_failed("Flaky", "down".into())),
            None,
        );
        assert!(failed.is_err());

        let instance = cache.get_or_create("Flaky", || value(5), None).unwrap();
        assert_eq!(read(&instance), 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_get_or_create_runs_factory_once() {
        use std::thread;
        use std::time::Duration;

        let cache = Arc::new(InstanceCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_create(
                            "Slow",
                            || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                value(9)
                            },
                            None,
                        )
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(cache.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_dispose_runs_finalizers_lifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let cache = InstanceCache::new();

        for port in ["P1", "P2", "P3"] {
            let finalizer = recording(Arc::clone(&order), port, false);
            cache.get_or_create(port, || value(0), Some(&finalizer)).unwrap();
        }

        cache.dispose().await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["P3", "P2", "P1"]);
        assert!(cache.is_disposed());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_dispose_aggregates_all_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let cache = InstanceCache::new();

        let specs = [("P1", false), ("P2", true), ("P3", true)];
        for (port, fail) in specs {
            let finalizer = recording(Arc::clone(&order), port, fail);
            cache.get_or_create(port, || value(0), Some(&finalizer)).unwrap();
        }

        let err = cache.dispose().await.unwrap_err();
        let failed: Vec<_> = err.failures().iter().map(|f| f.port).collect();

        assert_eq!(failed, vec!["P3", "P2"]);
        // P1 still ran after the failures
        assert_eq!(*order.lock().unwrap(), vec!["P3", "P2", "P1"]);
    }

    #[tokio::test]
    async fn test_dispose_leaves_parent_alone() {
        let root = Arc::new(InstanceCache::new());
        root.get_or_create("Logger", || value(1), None).unwrap();

        let child = root.fork();
        child.get_or_create("Db", || value(2), None).unwrap();
        child.dispose().await.unwrap();

        assert!(child.is_disposed());
        assert!(!root.is_disposed());
        assert!(root.has("Logger"));
    }

    #[tokio::test]
    async fn test_disposed_cache_rejects_new_entries() {
        let cache = InstanceCache::new();
        cache.dispose().await.unwrap();

        let result = cache.get_or_create("Late", || value(0), None);
        assert!(matches!(result, Err(DiError::DisposedScope { port: "Late" })));

        // Second dispose is a no-op
        cache.dispose().await.unwrap();
    }
}
