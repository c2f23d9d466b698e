//! # Session identity.
//!
//! A session is addressed by a [`SessionKey`]: a `(group, key)` pair chosen by the
//! application. Groups partition key spaces; two sessions with the same key in
//! different groups are unrelated.
//!
//! Each actor incarnation additionally carries a process-unique [`SessionId`].
//! The key survives restarts of a session, the id does not: the registry uses it
//! to tell "my own registration" from "somebody else's".

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of a session: a key within a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    group: Arc<str>,
    key: Arc<str>,
}

impl SessionKey {
    /// Creates a key inside `group`.
    pub fn new(group: impl Into<Arc<str>>, key: impl Into<Arc<str>>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }

    /// Namespace of the key.
    #[inline]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Application-chosen key inside the group.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub(crate) fn group_arc(&self) -> Arc<str> {
        Arc::clone(&self.group)
    }

    #[inline]
    pub(crate) fn key_arc(&self) -> Arc<str> {
        Arc::clone(&self.key)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.key)
    }
}

/// Process-unique identifier of one actor incarnation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        Self(SESSION_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (for logs).
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
