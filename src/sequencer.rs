//! Output ordering for decoded units.
//!
//! Workers finish units in whatever order the scheduler runs them. With
//! [`OrderPolicy::Completion`] units are delivered as they arrive. With
//! [`OrderPolicy::Strict`] completed units wait in a min-heap keyed by their
//! acquisition sequence number and are released only when every earlier
//! sequence number has been released.
//!
//! # Example
//!
//! ```
//! use rust_evio::sequencer::{OrderPolicy, OutputSequencer};
//!
//! let mut seq = OutputSequencer::new(OrderPolicy::Strict, 8);
//! seq.push(1, "second");
//! assert_eq!(seq.pop_ready(), None);
//! seq.push(0, "first");
//! assert_eq!(seq.pop_ready(), Some("first"));
//! assert_eq!(seq.pop_ready(), Some("second"));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use tracing::warn;

/// Delivery order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Deliver in completion order.
    #[default]
    Completion,
    /// Deliver in acquisition order.
    Strict,
}

impl OrderPolicy {
    /// Policy selected by the `strict_order` switch.
    #[must_use]
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            OrderPolicy::Strict
        } else {
            OrderPolicy::Completion
        }
    }
}

struct Slot<T> {
    seq: u64,
    item: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    // Reversed so the max-heap pops the smallest sequence number.
    fn cmp(&self, other: &Self) -> Ordering {
        other.seq.cmp(&self.seq)
    }
}

/// Releases items according to an [`OrderPolicy`].
pub struct OutputSequencer<T> {
    policy: OrderPolicy,
    next_seq: u64,
    window: usize,
    pending: BinaryHeap<Slot<T>>,
    ready: VecDeque<T>,
}

impl<T> OutputSequencer<T> {
    /// Sequencer expecting at most `window` out-of-order items. More are
    /// still held, with a warning.
    #[must_use]
    pub fn new(policy: OrderPolicy, window: usize) -> Self {
        Self {
            policy,
            next_seq: 0,
            window: window.max(1),
            pending: BinaryHeap::new(),
            ready: VecDeque::new(),
        }
    }

    /// Active policy.
    #[must_use]
    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    /// Accept a completed item.
    pub fn push(&mut self, seq: u64, item: T) {
        match self.policy {
            OrderPolicy::Completion => self.ready.push_back(item),
            OrderPolicy::Strict => {
                if seq < self.next_seq {
                    warn!(seq, next = self.next_seq, "Late unit delivered out of order");
                    self.ready.push_back(item);
                    return;
                }
                self.pending.push(Slot { seq, item });
                if self.pending.len() > self.window {
                    warn!(
                        seq,
                        next = self.next_seq,
                        pending = self.pending.len(),
                        window = self.window,
                        "Reorder window exceeded"
                    );
                }
                while self.pending.peek().is_some_and(|slot| slot.seq == self.next_seq) {
                    if let Some(slot) = self.pending.pop() {
                        self.ready.push_back(slot.item);
                        self.next_seq += 1;
                    }
                }
            }
        }
    }

    /// Next item ready for delivery.
    pub fn pop_ready(&mut self) -> Option<T> {
        self.ready.pop_front()
    }

    /// Iterate over every item ready for delivery.
    pub fn drain_ready(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.pop_ready())
    }

    /// Items waiting for an earlier sequence number.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Sequence number strict mode waits for next.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Flush everything at end of stream, in sequence order, skipping gaps.
    pub fn finish(mut self) -> Vec<T> {
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                next = self.next_seq,
                "Sequence gap at end of stream"
            );
        }
        let mut out: Vec<T> = self.ready.drain(..).collect();
        while let Some(slot) = self.pending.pop() {
            out.push(slot.item);
        }
        out
    }
}
