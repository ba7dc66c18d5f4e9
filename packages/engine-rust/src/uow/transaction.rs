use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Opaque handle of a transactional resource wrapping an exchange
/// (e.g., the name of a transaction manager).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionTag(Arc<str>);

impl TransactionTag {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self(Arc::from(tag))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Insertion-ordered set of the transactional resources that currently
/// own an exchange.
///
/// Nested transacted routes sharing one resource begin it once; the set
/// keeps a single entry for it.
#[derive(Debug, Default)]
pub struct TransactionTagSet {
    tags: Mutex<Vec<TransactionTag>>,
}

impl TransactionTagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tag`. Returns `false` if it was already present.
    pub fn begin(&self, tag: TransactionTag) -> bool {
        let mut tags = self.tags.lock();
        if tags.contains(&tag) {
            return false;
        }
        tags.push(tag);
        true
    }

    /// Removes `tag`. Returns whether it was present.
    pub fn end(&self, tag: &TransactionTag) -> bool {
        let mut tags = self.tags.lock();
        match tags.iter().position(|t| t == tag) {
            Some(index) => {
                tags.remove(index);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_transacted(&self) -> bool {
        !self.tags.lock().is_empty()
    }

    #[must_use]
    pub fn is_transacted_by(&self, tag: &TransactionTag) -> bool {
        self.tags.lock().contains(tag)
    }

    /// Current tags in the order they began.
    #[must_use]
    pub fn tags(&self) -> Vec<TransactionTag> {
        self.tags.lock().clone()
    }
}
