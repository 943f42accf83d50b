//! Typed port tokens
//!
//! A port names a service contract. The type parameter records what a
//! resolution of the port yields, so `resolve(LOGGER)` hands back an
//! `Arc<Logger>` without a cast at the call site.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// Name of a port, unique within a graph.
pub type PortName = &'static str;

/// Identity token for a service contract.
///
/// `T` may be unsized, so a port can stand for a trait object:
///
/// ```rust
/// use portwire::Port;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// const CLOCK: Port<dyn Clock> = Port::new("Clock");
/// assert_eq!(CLOCK.name(), "Clock");
/// ```
pub struct Port<T: ?Sized> {
    name: PortName,
    _contract: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized> Port<T> {
    /// Create a port with the given name.
    #[inline]
    pub const fn new(name: PortName) -> Self {
        Self {
            name,
            _contract: PhantomData,
        }
    }

    /// The port's name.
    #[inline]
    pub const fn name(&self) -> PortName {
        self.name
    }
}

// Manual impls: derives would demand `T: Clone` etc.
impl<T: ?Sized> Clone for Port<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Port<T> {}

impl<T: ?Sized> PartialEq for Port<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T: ?Sized> Eq for Port<T> {}

impl<T: ?Sized> Hash for Port<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Port<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Port").field(&self.name).finish()
    }
}

impl<T: ?Sized> fmt::Display for Port<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;

    const DATABASE: Port<Database> = Port::new("Database");

    #[test]
    fn test_port_is_copy_and_named() {
        let a = DATABASE;
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.name(), "Database");
        assert_eq!(format!("{b}"), "Database");
        assert_eq!(format!("{b:?}"), "Port(\"Database\")");
    }
}
