//! Ordered, thread-safe collection of completion callbacks for one unit of work.

use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::{same_synchronization, Synchronization};

/// Returned when registering on a registry that has already been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryClosed;

#[derive(Debug, Default)]
struct RegistryState {
    entries: Vec<Arc<dyn Synchronization>>,
    closed: bool,
}

/// Mutex-guarded list of [`Synchronization`]s.
///
/// Entries keep insertion order and duplicates are allowed. Every operation
/// takes the lock for the duration of a list mutation only; notification
/// passes work on a [`snapshot`](Self::snapshot). Once [`close`](Self::close)d
/// the registry rejects new entries.
#[derive(Debug, Default)]
pub struct SynchronizationRegistry {
    state: Mutex<RegistryState>,
}

impl SynchronizationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an open registry holding `entries` in the given order.
    #[must_use]
    pub fn with_entries(entries: Vec<Arc<dyn Synchronization>>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries,
                closed: false,
            }),
        }
    }

    /// Appends a callback.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClosed`] if the registry has been closed.
    pub fn add(&self, synchronization: Arc<dyn Synchronization>) -> Result<(), RegistryClosed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RegistryClosed);
        }
        state.entries.push(synchronization);
        Ok(())
    }

    /// Removes the first entry that is the same instance as `synchronization`.
    /// Returns whether an entry was removed.
    pub fn remove(&self, synchronization: &Arc<dyn Synchronization>) -> bool {
        let mut state = self.state.lock();
        match state
            .entries
            .iter()
            .position(|s| same_synchronization(s, synchronization))
        {
            Some(index) => {
                state.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether the same instance is registered.
    #[must_use]
    pub fn contains(&self, synchronization: &Arc<dyn Synchronization>) -> bool {
        self.state
            .lock()
            .entries
            .iter()
            .any(|s| same_synchronization(s, synchronization))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Copy of the entries in notification order.
    ///
    /// Notification order is a stable sort by [`Synchronization::order`], so
    /// callbacks with equal order keep their registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn Synchronization>> {
        let entries = self.state.lock().entries.clone();
        in_notification_order(entries)
    }

    /// Removes and returns every entry `eligible` accepts, in registration
    /// order, as one critical section. Rejected entries keep their order.
    ///
    /// `eligible` runs under the registry lock and must not call back into
    /// this registry. It sees every entry before any is removed, so a
    /// panicking predicate leaves the registry untouched.
    pub fn drain_where(
        &self,
        mut eligible: impl FnMut(&Arc<dyn Synchronization>) -> bool,
    ) -> Vec<Arc<dyn Synchronization>> {
        let mut state = self.state.lock();
        split_off_where(&mut state.entries, &mut eligible)
    }

    /// Moves every entry `eligible` accepts onto `target`, holding both
    /// registries' locks so no observer sees an entry in both or neither.
    ///
    /// Returns the moved entries in registration order. Transferring to
    /// `self` moves nothing. Locks are taken in address order, so opposing
    /// concurrent transfers cannot deadlock.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClosed`] without touching either registry if
    /// `target` has been closed.
    pub fn transfer_where(
        &self,
        target: &Self,
        mut eligible: impl FnMut(&Arc<dyn Synchronization>) -> bool,
    ) -> Result<Vec<Arc<dyn Synchronization>>, RegistryClosed> {
        if std::ptr::eq(self, target) {
            return Ok(Vec::new());
        }

        let source_first = std::ptr::from_ref(self) < std::ptr::from_ref(target);
        let (mut source, mut destination) = if source_first {
            let source = self.state.lock();
            (source, target.state.lock())
        } else {
            let destination = target.state.lock();
            (self.state.lock(), destination)
        };

        if destination.closed {
            return Err(RegistryClosed);
        }
        let moved = split_off_where(&mut source.entries, &mut eligible);
        destination.entries.extend(moved.iter().cloned());
        Ok(moved)
    }

    /// Closes the registry and returns its entries in notification order.
    ///
    /// Returns `None` if the registry was already closed, so exactly one
    /// caller ever receives the entries.
    pub fn close(&self) -> Option<Vec<Arc<dyn Synchronization>>> {
        let entries = {
            let mut state = self.state.lock();
            if state.closed {
                return None;
            }
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        Some(in_notification_order(entries))
    }
}

// Decides every entry before moving any, so user code never runs while the
// list is half split.
fn split_off_where(
    entries: &mut Vec<Arc<dyn Synchronization>>,
    eligible: &mut impl FnMut(&Arc<dyn Synchronization>) -> bool,
) -> Vec<Arc<dyn Synchronization>> {
    let mut verdicts = Vec::with_capacity(entries.len());
    for synchronization in entries.iter() {
        verdicts.push(eligible(synchronization));
    }

    let mut drained = Vec::new();
    let mut kept = Vec::with_capacity(entries.len());
    for (synchronization, take) in std::mem::take(entries).into_iter().zip(verdicts) {
        if take {
            drained.push(synchronization);
        } else {
            kept.push(synchronization);
        }
    }
    *entries = kept;
    drained
}

fn in_notification_order(
    mut entries: Vec<Arc<dyn Synchronization>>,
) -> Vec<Arc<dyn Synchronization>> {
    entries.sort_by_key(|s| s.order());
    entries
}
