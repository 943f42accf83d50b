//! Provider traits and lifetimes
//!
//! These define what can be injected and how long a created instance lives.

use std::fmt;

/// Marker trait for types that can be provided through a port.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`,
/// including trait objects such as `dyn Logger` when the trait is `Send + Sync`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Service lifetime specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Lifetime {
    /// One instance for the whole container, created lazily in the root cache
    #[default]
    Singleton,

    /// One instance per scope; never resolvable from the root container
    Scoped,

    /// New instance on every resolve, never cached and never finalized
    Request,
}

impl Lifetime {
    /// Longevity rank: lower lives longer.
    ///
    /// An adapter may only depend on adapters whose rank is not greater than its own.
    #[inline]
    pub const fn rank(self) -> u8 {
        match self {
            Lifetime::Singleton => 0,
            Lifetime::Scoped => 1,
            Lifetime::Request => 2,
        }
    }

    /// Whether instances of this lifetime are stored in an instance cache
    #[inline]
    pub const fn is_cached(self) -> bool {
        !matches!(self, Lifetime::Request)
    }

    /// Whether `self` may hold a reference to an instance of `required`
    #[inline]
    pub const fn can_depend_on(self, required: Lifetime) -> bool {
        required.rank() <= self.rank()
    }

    /// Lowercase name used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Request => "request",
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
