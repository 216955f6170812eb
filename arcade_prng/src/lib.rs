// Deterministic, portable pseudo-random number generator.
//
// Implements Mulberry32, the 32-bit generator the browser builds of the
// arcade games already use. Matching it exactly is what lets a maze generated
// by this workspace be compared cell-for-cell against one generated in a
// browser tab from the same seed: same `u32` stream, same `f64` conversion
// (`u32 / 2^32`), same `floor(r * n)` index picking.
//
// Used by `arcade_sim` (maze carving, start/goal placement, pong serves,
// bracket shuffles) and by the host session (reveal delays, round seeds).
//
// **Critical constraint: determinism.** Every method must produce identical
// output given the same prior state. The only floating-point step is the
// `u32 -> f64` division followed by one multiply, which is exact for every
// `n` this workspace picks from, so index picks agree with the browser
// bit-for-bit.

use serde::{Deserialize, Serialize};

/// Mulberry32 PRNG.
///
/// Each subsystem owns its own generator. Two generators created from the
/// same seed produce identical streams forever.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Create a generator from a 32-bit seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u32` in the sequence.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate a uniform `f64` in [0, 1) with 32 bits of resolution.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Pick an index in `[0, len)` as `floor(next_f64() * len)`.
    ///
    /// This is deliberately not rejection-sampled: the slight bias is part of
    /// the stream the browser builds consume, and changing it would change
    /// every generated maze.
    ///
    /// Panics if `len == 0`.
    pub fn pick_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "pick_index: len must be non-zero");
        let picked = (self.next_f64() * len as f64).floor() as usize;
        // f64 rounding can never reach `len`, but clamp so callers can index
        // without a second check.
        picked.min(len - 1)
    }

    /// Generate a uniform integer in `[low, high]` (inclusive on both ends).
    ///
    /// Panics if `low > high`.
    pub fn range_u64_inclusive(&mut self, low: u64, high: u64) -> u64 {
        assert!(low <= high, "range_u64_inclusive: low must be <= high");
        let span = high - low + 1;
        low + (self.next_f64() * span as f64).floor() as u64
    }

    /// Return `true` with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// In-place Fisher–Yates shuffle, walking from the back.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.pick_index(i + 1);
            items.swap(i, j);
        }
    }
}
