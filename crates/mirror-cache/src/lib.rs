//! Cache coordination for httpmirror.
//!
//! [`CacheCoordinator`] decides, per request, whether the cached copy of an
//! origin resource can be served by redirect or must be (re)populated, and
//! guarantees at most one populate job per key through [`InFlight`].

pub mod config;
pub mod coordinator;
pub mod freshness;
pub mod inflight;
pub mod keys;
pub mod origin;

pub use config::{CoordinatorConfig, ProbeFailurePolicy};
pub use coordinator::CacheCoordinator;
pub use freshness::{FreshnessChecker, is_fresh};
pub use inflight::{Acquire, InFlight, Reservation};
pub use keys::cache_key;
pub use origin::{HttpOrigin, HttpOriginBuilder};
