//! session-core: client-side session lifecycle management.
//!
//! Keeps an application's notion of "who is logged in, with what role, and
//! for how long" consistent against an unreliable identity/profile backend
//! and an idle user. Three moving parts: the lifecycle controller reacting
//! to provider events, the resolution engine (timeout + retry + cache
//! fallback), and the inactivity watchdog that forces logout after a quiet
//! period. Collaborators - the identity provider, the profile backend, and
//! the key/value store behind the cache - are injected as trait objects.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;

pub use config::{ConfigError, SessionConfig};
pub use error::{BackendError, HardFailure};
pub use models::{AuthEvent, AuthEventKind, Profile, Role, Session, Snapshot};
pub use services::{
    IdentityProvider, KeyValueStore, MemoryStore, MockIdentityProvider, MockProfileBackend,
    ProfileBackend, ProfileCache, ProfileResolver, RedisStore, Resolution, ResolutionSource,
    RetryPolicy, ScriptedResponse, SessionManager, TransientKind,
};
