//! Service identity and the [`Service`] trait.
//!
//! Services are constructed *declaratively first*: a service reports the
//! other services it needs through [`Service::required_services`], but must
//! not dereference them while it is being built. Any use of a dependency goes
//! through a lazy lookup ([`AppContext::service`]) once resolution has
//! settled.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Leaderboard;
//!
//! impl ServiceMeta for Leaderboard {
//!     const ID: &'static str = "game.leaderboard";
//! }
//!
//! impl Service for Leaderboard {
//!     fn required_services(&self) -> Vec<ServiceTypeId> {
//!         vec![ServiceTypeId::from("game.database")]
//!     }
//!
//!     fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
//!         self
//!     }
//! }
//! ```
//!
//! [`AppContext::service`]: crate::context::AppContext::service

use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

// ─── ServiceTypeId ────────────────────────────────────────────────────────────

/// Opaque, globally unique identifier of a service kind.
///
/// Cheap to clone; compares and hashes as its string form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceTypeId(Arc<str>);

impl ServiceTypeId {
    /// Creates an id from any string.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the id of a service type that carries [`ServiceMeta`].
    pub fn of<T: ServiceMeta + ?Sized>() -> Self {
        Self::new(T::ID)
    }
}

impl fmt::Debug for ServiceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceTypeId({:?})", &*self.0)
    }
}

impl fmt::Display for ServiceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceTypeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceTypeId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl Borrow<str> for ServiceTypeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceTypeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─── ServiceMeta ──────────────────────────────────────────────────────────────

/// Associates a static registry id with a service type.
///
/// Enables typed lookups through [`ServiceContainer::get_typed`] and
/// [`AppContext::service`].
///
/// [`ServiceContainer::get_typed`]: crate::container::ServiceContainer::get_typed
/// [`AppContext::service`]: crate::context::AppContext::service
pub trait ServiceMeta {
    /// Registry id of this service type.
    const ID: &'static str;
}

// ─── Service ──────────────────────────────────────────────────────────────────

/// A constructed service instance.
pub trait Service: Any + Send + Sync {
    /// Services this one needs once the application is running.
    ///
    /// Read exactly once, right after construction, to extend the resolution
    /// frontier. The listed services are *not* guaranteed to exist yet when
    /// this service is built.
    fn required_services(&self) -> Vec<ServiceTypeId> {
        Vec::new()
    }

    /// Returns self as an `Arc<dyn Any>` for downcasting.
    ///
    /// Implementors should simply return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared, type-erased service instance.
pub type ServiceArc = Arc<dyn Service>;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Clock;

    impl ServiceMeta for Clock {
        const ID: &'static str = "test.clock";
    }

    #[test]
    fn test_ids_compare_by_value() {
        let a = ServiceTypeId::from("svc.a");
        let b = ServiceTypeId::new(String::from("svc.a"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert!(set.contains("svc.a"));
    }

    #[test]
    fn test_id_of_service_meta() {
        assert_eq!(ServiceTypeId::of::<Clock>().as_str(), "test.clock");
        assert_eq!(ServiceTypeId::of::<Clock>().to_string(), "test.clock");
    }
}
