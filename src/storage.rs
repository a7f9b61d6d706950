//! Browser-session state persistence
//!
//! The host embeds this crate inside a browser-like environment that owns
//! the real durable store (session/local storage). `StateStore` is the
//! seam: everything the core persists across a reload of the same browser
//! session goes through it under the keys in [`keys`].

use std::collections::HashMap;
use std::sync::RwLock;

/// Well-known storage keys
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER: &str = "user";

    /// Durable lockout marker for one assignment. Once written it is
    /// never removed by this crate during the attempt lifecycle.
    #[must_use]
    pub fn lockout(assignment_id: i64) -> String {
        format!("proctoring.locked.{assignment_id}")
    }

    /// Marker recording that an assignment was already submitted
    #[must_use]
    pub fn submitted(assignment_id: i64) -> String {
        format!("attempt.submitted.{assignment_id}")
    }
}

/// Key-value store scoped to one browser session
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Remove every key, as a logout does
    fn clear(&self);
}

/// In-memory reference implementation
///
/// Used by the test suite and by hosts that keep their own durable
/// mirror; a browser host would instead back this trait with real
/// session storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .expect("state store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .expect("state store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .expect("state store lock poisoned")
            .remove(key);
    }

    fn clear(&self) {
        self.entries
            .write()
            .expect("state store lock poisoned")
            .clear();
    }
}
