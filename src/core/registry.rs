//! # Key registry: atomic `(group, key)` → session address mapping.
//!
//! The registry is the only state shared between sessions. It guarantees that at
//! most one live session owns a key, however many callers race to create it.
//!
//! ## Operations
//! ```text
//! register_or_locate(key, candidate)
//!     ├─ no entry / dead entry   → store candidate → Claim { owner: candidate, is_owner: true }
//!     ├─ entry.id == candidate   → Claim { owner: entry, is_owner: true }    (re-validation)
//!     └─ live foreign entry      → Claim { owner: entry, is_owner: false }
//!
//! lookup(key)          → live owner or None
//! unregister(key, id)  → removes only if the current owner has `id`
//! ```
//!
//! ## Rules
//! - Compare-and-set runs under one write lock (atomic per registry).
//! - Deregistration is driven by the session's own termination; dead entries
//!   left by a crashed session are never returned and are replaced on the next claim.
//! - [`KeyRegistry`] is a capability: pass a shared instance to several
//!   supervisors to let them share infrastructure, or plug in another backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::session::{Handler, SessionHandle, SessionId, SessionKey};

/// Something the registry can store: an identifiable, possibly dead, address.
pub trait Address: Clone + Send + Sync + 'static {
    /// Id of the actor incarnation behind the address.
    fn id(&self) -> SessionId;
    /// Returns `false` once the actor stopped.
    fn is_alive(&self) -> bool;
}

impl<H: Handler> Address for SessionHandle<H> {
    fn id(&self) -> SessionId {
        SessionHandle::id(self)
    }

    fn is_alive(&self) -> bool {
        !self.is_closed()
    }
}

/// Result of [`KeyRegistry::register_or_locate`].
#[derive(Clone, Debug)]
pub struct Claim<A> {
    /// Current owner of the key (the candidate when `is_owner`).
    pub owner: A,
    /// `true` if the candidate owns the key.
    pub is_owner: bool,
}

/// Atomic register-or-locate mapping from session keys to addresses.
#[async_trait]
pub trait KeyRegistry<A: Address>: Send + Sync + 'static {
    /// Claims `key` for `candidate`, or returns the live owner.
    async fn register_or_locate(&self, key: &SessionKey, candidate: A) -> Claim<A>;

    /// Returns the live owner of `key`.
    ///
    /// The owner may still be running `Handler::init`; the supervisor waits for
    /// the outcome before handing the address out.
    async fn lookup(&self, key: &SessionKey) -> Option<A>;

    /// Removes `key` if it is currently owned by `id`.
    async fn unregister(&self, key: &SessionKey, id: SessionId) -> bool;

    /// Sorted keys with a live owner in `group`.
    async fn keys(&self, group: &str) -> Vec<SessionKey>;
}

/// In-process registry backed by a `RwLock<HashMap>`.
pub struct LocalRegistry<A> {
    entries: RwLock<HashMap<SessionKey, A>>,
}

impl<A> Default for LocalRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> LocalRegistry<A> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries, including dead ones not yet replaced.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<A: Address> KeyRegistry<A> for LocalRegistry<A> {
    async fn register_or_locate(&self, key: &SessionKey, candidate: A) -> Claim<A> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            if existing.id() == candidate.id() {
                return Claim {
                    owner: existing.clone(),
                    is_owner: true,
                };
            }
            if existing.is_alive() {
                return Claim {
                    owner: existing.clone(),
                    is_owner: false,
                };
            }
        }
        entries.insert(key.clone(), candidate.clone());
        Claim {
            owner: candidate,
            is_owner: true,
        }
    }

    async fn lookup(&self, key: &SessionKey) -> Option<A> {
        let entries = self.entries.read().await;
        entries.get(key).filter(|a| a.is_alive()).cloned()
    }

    async fn unregister(&self, key: &SessionKey, id: SessionId) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(existing) if existing.id() == id => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    async fn keys(&self, group: &str) -> Vec<SessionKey> {
        let entries = self.entries.read().await;
        let mut keys: Vec<SessionKey> = entries
            .iter()
            .filter(|(k, a)| k.group() == group && a.is_alive())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        keys
    }
}
