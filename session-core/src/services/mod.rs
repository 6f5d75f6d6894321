//! Services layer for session-core.
//!
//! The lifecycle controller, the profile resolution engine, the inactivity
//! watchdog, and the cache store, plus the collaborator seams they consume.

mod backend;
mod cache;
mod controller;
mod provider;
mod resolver;
mod store;
mod watchdog;

pub use backend::{MockProfileBackend, ProfileBackend, ScriptedResponse};
pub use cache::ProfileCache;
pub use controller::SessionManager;
pub use provider::{IdentityProvider, MockIdentityProvider};
pub use resolver::{
    ProfileResolver, Resolution, ResolutionSource, RetryPolicy, TransientKind,
};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
