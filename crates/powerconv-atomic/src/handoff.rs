//! Single-slot parameter hand-off.
//!
//! The background thread prepares a complete parameter set and offers it.
//! The RT thread takes it at the start of a regulation iteration, so a set
//! is always applied whole and never while the loop is using it. A set
//! offered before the previous one was taken supersedes it: the older set
//! is handed back to the offering thread and dropped there.
//!
//! # RT Safety
//!
//! - [`ParamHandoff::take`] and [`ParamHandoff::is_pending`] are lock-free
//!   with bounded execution time
//! - Storage is allocated once by [`ParamHandoff::new`]

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

/// Hand-off statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandoffStats {
    /// Sets offered
    pub offered: u64,
    /// Sets replaced by a newer offer before being taken
    pub superseded: u64,
    /// Sets taken by the RT thread
    pub taken: u64,
}

/// Lock-free single-slot hand-off of parameter sets.
///
/// # Example
///
/// ```rust
/// use powerconv_atomic::ParamHandoff;
///
/// let handoff = ParamHandoff::new();
/// assert_eq!(handoff.offer(1), None);
/// // The second offer supersedes the first, which comes back
/// assert_eq!(handoff.offer(2), Some(1));
///
/// let mut active = 0;
/// assert!(handoff.swap_into(&mut active));
/// assert_eq!(active, 2);
/// assert!(!handoff.is_pending());
/// ```
pub struct ParamHandoff<T> {
    slot: ArrayQueue<T>,
    offered: AtomicU64,
    superseded: AtomicU64,
    taken: AtomicU64,
}

impl<T> fmt::Debug for ParamHandoff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamHandoff")
            .field("pending", &self.is_pending())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T> Default for ParamHandoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ParamHandoff<T> {
    /// Create an empty hand-off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: ArrayQueue::new(1),
            offered: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            taken: AtomicU64::new(0),
        }
    }

    /// Offer a new set, returning the pending set it supersedes, if any.
    ///
    /// Called from the background thread.
    pub fn offer(&self, value: T) -> Option<T> {
        self.offered.fetch_add(1, Ordering::Relaxed);
        let superseded = self.slot.force_push(value);
        if superseded.is_some() {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        superseded
    }

    /// Take the pending set, if any.
    ///
    /// # RT Safety
    ///
    /// RT-safe. Lock-free with bounded execution time.
    #[inline]
    pub fn take(&self) -> Option<T> {
        let value = self.slot.pop();
        if value.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Replace `active` with the pending set, if any.
    ///
    /// Returns `true` when a new set was applied. The previous active set is
    /// dropped in place, so `T` should not own heap memory when this is
    /// called on the RT thread.
    #[inline]
    pub fn swap_into(&self, active: &mut T) -> bool {
        match self.take() {
            Some(value) => {
                *active = value;
                true
            }
            None => false,
        }
    }

    /// Whether a set is waiting to be taken.
    #[inline]
    pub fn is_pending(&self) -> bool {
        !self.slot.is_empty()
    }

    /// Hand-off statistics.
    #[must_use]
    pub fn stats(&self) -> HandoffStats {
        HandoffStats {
            offered: self.offered.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
        }
    }
}
