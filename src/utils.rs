//! Random utilities shared across the crate.

/// A small deterministic xorshift64* generator.
///
/// The linear-loop solver only needs uniform integers in a tiny range, and
/// deterministic seeding keeps both the solver output and the randomised
/// tests reproducible, so this stays local instead of pulling in a crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShift {
    state: u64,
}

impl XorShift {
    /// Creates a generator from `seed`. A zero seed is bumped to one since
    /// the all-zero state is a fixed point of the shift sequence.
    pub fn new(seed: u64) -> XorShift {
        XorShift {
            state: seed.max(1),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Uniform value in `[low, high]`, both inclusive.
    /// Modulo bias is negligible for the ranges used here.
    pub fn in_range(&mut self, low: i64, high: i64) -> i64 {
        debug_assert!(low <= high);
        let span = (high - low) as u64 + 1;
        low + (self.next_u64() % span) as i64
    }
}
