//! Radix table: an optional fixed-width prefix accelerator for spline knot
//! lookup.

use crate::spline::SplineIndex;

/// Sentinel slot value: "no knot index recorded here yet". The wire-format
/// page and knot indices are `u32` throughout this engine, so the
/// in-memory sentinel is `u32::MAX`.
const EMPTY_SLOT: u32 = u32::MAX;

pub struct RadixTable {
    radix_bits: u8,
    shift: u32,
    min_key: u64,
    table: Vec<u32>,
}

impl RadixTable {
    pub fn new(radix_bits: u8) -> Self {
        let slots = 1usize << radix_bits;
        RadixTable {
            radix_bits,
            shift: 0,
            min_key: 0,
            table: vec![EMPTY_SLOT; slots],
        }
    }

    fn required_shift(&self, min_key: u64, max_key: u64) -> u32 {
        let span = max_key.saturating_sub(min_key);
        let mut shift = 0u32;
        while (span >> shift) >= (1u64 << self.radix_bits) {
            shift += 1;
        }
        shift
    }

    /// Rebuilds the table in place from every committed spline knot. Called
    /// whenever a newly appended knot would need a larger shift than the
    /// table currently uses; shift only ever grows.
    pub fn rebuild(&mut self, spline: &SplineIndex) {
        let knots: Vec<_> = spline.iter_knots().collect();
        if knots.is_empty() {
            return;
        }
        self.min_key = knots[0].key;
        let max_key = knots[knots.len() - 1].key;
        let needed = self.required_shift(self.min_key, max_key);
        if needed > self.shift {
            log::debug!("radix table shift growing from {} to {}", self.shift, needed);
            self.shift = needed;
        }

        for slot in self.table.iter_mut() {
            *slot = EMPTY_SLOT;
        }
        for (idx, knot) in knots.iter().enumerate() {
            let prefix = ((knot.key - self.min_key) >> self.shift) as usize;
            if self.table[prefix] == EMPTY_SLOT {
                self.table[prefix] = idx as u32;
            }
        }
        // Backfill empty slots with the preceding slot's value so a probe
        // between two populated prefixes still lands on a usable bound.
        let mut last = 0u32;
        for slot in self.table.iter_mut() {
            if *slot == EMPTY_SLOT {
                *slot = last;
            } else {
                last = *slot;
            }
        }
    }

    /// Returns `(low_knot_index, high_knot_index)` bracketing `key`, meant
    /// to be narrowed further by a binary search over that window.
    pub fn find(&self, key: u64) -> (u32, u32) {
        if self.table.is_empty() {
            return (0, 0);
        }
        let prefix = ((key.saturating_sub(self.min_key)) >> self.shift) as usize;
        let prefix = prefix.min(self.table.len() - 1);
        let high = self.table[prefix];
        let low = if prefix == 0 {
            0
        } else {
            self.table[prefix - 1]
        };
        (low, high)
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_grows_to_fit_key_range_in_radix_bits() {
        let mut r = RadixTable::new(4);
        let mut s = SplineIndex::new(64, 1).unwrap();
        for page in 0..40u32 {
            s.add((page as u64) * 1000, page);
        }
        r.rebuild(&s);
        assert!(r.shift() > 0);
        let (lo, hi) = r.find(20_000);
        assert!(lo <= hi);
    }
}
