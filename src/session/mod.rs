//! Session state: token ownership, refresh coordination, route guarding
//!
//! The token store is the single owner of credential state; the refresh
//! coordinator serializes refresh traffic on top of it; the session guard
//! decides what an authenticated, partially-verified or anonymous session
//! is allowed to see.

pub mod guard;
pub mod refresh;
pub mod store;

pub use guard::{GuardDecision, GuardState, SessionGuard};
pub use refresh::{RefreshCoordinator, RefreshError};
pub use store::TokenStore;
