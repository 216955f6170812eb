// Epoch-tagged timer queue.
//
// Every delayed action the host schedules (begin round, next round, reset,
// reveal signal, ...) goes through a `TimerQueue`. Each timer records the
// epoch that was current when it was scheduled. Calling `invalidate` bumps
// the epoch, which turns every pending timer into a no-op: when it comes due
// it is dropped and counted instead of returned. The host invalidates on
// every phase change so a timer from an abandoned round can never fire into
// the next one.
//
// Timers that share a due time pop in scheduling order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry<K> {
    due_ms: u64,
    seq: u64,
    epoch: u64,
    kind: K,
}

#[derive(Clone, Debug)]
pub struct TimerQueue<K: Ord> {
    heap: BinaryHeap<Reverse<Entry<K>>>,
    epoch: u64,
    next_seq: u64,
    stale_dropped: u64,
}

impl<K: Ord> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            epoch: 0,
            next_seq: 0,
            stale_dropped: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn schedule(&mut self, due_ms: u64, kind: K) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            due_ms,
            seq,
            epoch: self.epoch,
            kind,
        }));
    }

    /// Make every currently pending timer stale.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
    }

    /// Pop the next current-epoch timer due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<K> {
        loop {
            let due = self.heap.peek().is_some_and(|e| e.0.due_ms <= now_ms);
            if !due {
                return None;
            }
            let Reverse(entry) = self.heap.pop()?;
            if entry.epoch == self.epoch {
                return Some(entry.kind);
            }
            self.stale_dropped += 1;
        }
    }

    /// Earliest due time among pending timers, stale ones included.
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|e| e.0.due_ms)
    }

    /// How many stale timers have been discarded so far.
    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
