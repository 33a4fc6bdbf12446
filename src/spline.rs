//! Spline index: a piecewise-linear, monotone key → page approximator with
//! bounded prediction error.
//!
//! `add` is the streaming GreedySplineCorridor algorithm (Neumann & Michel).
//! Knots live in a `Vec` used as a ring (start cursor + count) rather than a
//! linked structure, so `erase_left` stays O(1).

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Knot {
    pub key: u64,
    pub page: u32,
}

/// In-progress corridor state between the last committed knot and the
/// candidate point currently being tested.
#[derive(Clone, Copy, Debug)]
struct Corridor {
    last: Knot,
    // Upper bound line's slope numerator/denominator relative to `last`.
    upper_dk: i128,
    upper_dp: i128,
    lower_dk: i128,
    lower_dp: i128,
    candidate: Knot,
}

pub struct SplineIndex {
    knots: Vec<Knot>,
    start: usize,
    count: usize,
    capacity: usize,
    max_error: u32,
    corridor: Option<Corridor>,
    /// Trailing knot at the latest accepted key, overwritten whenever a real
    /// knot commits; lets lookups for very recent keys still resolve.
    temp: Option<Knot>,
    /// The very first knot ever committed, kept even after `erase_left` has
    /// dropped it from the live ring. Used only to bracket keys older than
    /// every currently retained knot.
    first_ever: Option<Knot>,
}

impl SplineIndex {
    pub fn new(capacity: u32, max_error: u32) -> Result<Self> {
        if capacity < 2 {
            return Err(Error::ConfigInvalid(
                "spline capacity must allow at least 2 knots".into(),
            ));
        }
        Ok(SplineIndex {
            knots: Vec::with_capacity(capacity as usize),
            start: 0,
            count: 0,
            capacity: capacity as usize,
            max_error,
            corridor: None,
            temp: None,
            first_ever: None,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn slot(&self, logical: usize) -> usize {
        (self.start + logical) % self.capacity
    }

    fn knot_at(&self, logical: usize) -> Knot {
        self.knots[self.slot(logical)]
    }

    fn push_committed(&mut self, knot: Knot) {
        if self.first_ever.is_none() {
            self.first_ever = Some(knot);
        }
        let cap = self.capacity;
        if self.knots.len() < cap {
            self.knots.push(knot);
            self.count += 1;
        } else if self.count < cap {
            let idx = self.slot(self.count);
            self.knots[idx] = knot;
            self.count += 1;
        } else {
            // Ring full: oldest knot is overwritten, advance start.
            let idx = self.slot(self.count);
            self.knots[idx] = knot;
            self.start = (self.start + 1) % self.knots.len();
        }
    }

    /// Appends one `(key, page)` observation. Keys must be strictly
    /// increasing, matching the engine-wide insert-ordering invariant.
    pub fn add(&mut self, key: u64, page: u32) {
        let point = Knot { key, page };

        if self.count == 0 && self.corridor.is_none() {
            // First-ever point: becomes both the sole knot and the corridor anchor.
            self.push_committed(point);
            self.temp = Some(point);
            return;
        }

        let corridor = match self.corridor.take() {
            None => {
                // Second point seeds the corridor relative to the single
                // committed knot.
                let last = self.knot_at(self.count - 1);
                let me = self.max_error as i128;
                Corridor {
                    last,
                    upper_dk: point.key as i128 - last.key as i128,
                    upper_dp: point.page as i128 + me - last.page as i128,
                    lower_dk: point.key as i128 - last.key as i128,
                    lower_dp: point.page as i128 - me - last.page as i128,
                    candidate: point,
                }
            }
            Some(c) => c,
        };

        let dk = point.key as i128 - corridor.last.key as i128;
        let dp = point.page as i128 - corridor.last.page as i128;

        let above_lower = dp * corridor.lower_dk >= corridor.lower_dp * dk;
        let below_upper = dp * corridor.upper_dk <= corridor.upper_dp * dk;

        if above_lower && below_upper {
            // Still inside corridor: narrow it and keep the candidate moving.
            let me = self.max_error as i128;
            let new_upper_dp = point.page as i128 + me - corridor.last.page as i128;
            let new_lower_dp = point.page as i128 - me - corridor.last.page as i128;

            let mut next = corridor;
            if dk * next.upper_dp > new_upper_dp * next.upper_dk {
                next.upper_dk = dk;
                next.upper_dp = new_upper_dp;
            }
            if dk * next.lower_dp < new_lower_dp * next.lower_dk {
                next.lower_dk = dk;
                next.lower_dp = new_lower_dp;
            }
            next.candidate = point;
            self.corridor = Some(next);
            self.temp = Some(point);
        } else {
            // Corridor violated: commit the last accepted candidate as a real
            // knot and restart the corridor anchored there.
            let committed = corridor.candidate;
            self.push_committed(committed);
            let me = self.max_error as i128;
            self.corridor = Some(Corridor {
                last: committed,
                upper_dk: point.key as i128 - committed.key as i128,
                upper_dp: point.page as i128 + me - committed.page as i128,
                lower_dk: point.key as i128 - committed.key as i128,
                lower_dp: point.page as i128 - me - committed.page as i128,
                candidate: point,
            });
            self.temp = Some(point);
        }
    }

    /// Shifts the live knot range forward by `n` knots without moving any
    /// memory, advancing the ring's start cursor. Refuses to leave zero
    /// knots live, clamping `n` so at least one knot always survives.
    pub fn erase_left(&mut self, n: usize) {
        let n = n.min(self.count.saturating_sub(1));
        self.start = self.slot(n);
        self.count -= n;
    }

    /// Drops knots strictly below `min_key`, preserving at least one knot.
    pub fn clean(&mut self, min_key: u64) -> usize {
        let mut n = 0;
        while n < self.count && self.knot_at(n).key < min_key {
            n += 1;
        }
        if n == self.count && n > 0 {
            n -= 1;
        }
        self.erase_left(n);
        n
    }

    fn last_knot(&self) -> Option<Knot> {
        if self.count > 0 {
            Some(self.knot_at(self.count - 1))
        } else {
            self.temp
        }
    }

    fn first_knot(&self) -> Option<Knot> {
        if self.count > 0 {
            Some(self.knot_at(0))
        } else {
            self.temp
        }
    }

    /// Binary-searches the committed knots for the pair bracketing `key`,
    /// returning the index of the right-hand knot. With only two knots,
    /// always returns index 1.
    fn bracket(&self, key: u64) -> usize {
        self.bracket_within(key, 0, self.count - 1)
    }

    /// Binary-searches for the committed-knot pair bracketing `key`, but
    /// restricted to knot indices `[lo_bound, hi_bound]` instead of the
    /// whole knot list — the radix table guarantees the true bracketing
    /// pair lies inside that window, it does not guarantee the window holds
    /// only one knot pair, so this still has to search, not just read the
    /// window's endpoints off as the answer.
    fn bracket_within(&self, key: u64, lo_bound: usize, hi_bound: usize) -> usize {
        let last = self.count - 1;
        let hi_bound = hi_bound.min(last);
        let mut lo = lo_bound.min(hi_bound);
        let mut hi = hi_bound;
        if lo == hi {
            if hi < last {
                hi += 1;
            } else if lo > 0 {
                lo -= 1;
            }
        }
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            if self.knot_at(mid).key <= key {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi.max(1)
    }

    /// Predicts a page for `key`, returning `(predicted, lo, hi)`.
    /// Equivalent to `find_with_hint(key, None)`.
    pub fn find(&self, key: u64) -> Option<(u32, u32, u32)> {
        self.find_with_hint(key, None)
    }

    /// Like [`SplineIndex::find`], but narrows the binary search to the
    /// `(low, high)` knot-index bracket a [`crate::radix::RadixTable`] probe
    /// already produced, instead of re-searching the whole knot list.
    pub fn find_with_hint(&self, key: u64, knot_hint: Option<(u32, u32)>) -> Option<(u32, u32, u32)> {
        let last = self.last_knot()?;
        let first = self.first_knot()?;

        if self.count == 0 {
            return Some((first.page, first.page, first.page));
        }
        if key < first.key {
            // Below every currently retained knot: bracket against the very
            // first knot ever committed (possibly since erased) instead of
            // the current smallest one, so a key from before any eviction
            // still resolves to a plausible retired-range page.
            let retired_anchor = self.first_ever.unwrap_or(first);
            let mid = (retired_anchor.page + first.page) / 2;
            return Some((mid, 0, mid));
        }
        if key >= last.key {
            return Some((last.page, last.page.saturating_sub(self.max_error), last.page));
        }

        let right = match knot_hint {
            Some((lo, hi)) => self.bracket_within(key, lo as usize, hi as usize),
            None => self.bracket(key),
        };
        let left = right.saturating_sub(1);
        let k0 = self.knot_at(left);
        let k1 = self.knot_at(right);

        let predicted = if k1.key == k0.key {
            k0.page
        } else {
            let frac = (key - k0.key) as f64 / (k1.key - k0.key) as f64;
            let p = k0.page as f64 + frac * (k1.page as f64 - k0.page as f64);
            p.round() as u32
        };

        let lo = predicted.saturating_sub(self.max_error);
        let hi = (predicted + self.max_error).min(last.page);
        Some((predicted, lo, hi))
    }

    pub fn iter_knots(&self) -> impl Iterator<Item = Knot> + '_ {
        (0..self.count).map(move |i| self.knot_at(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_knot_predicts_its_own_page() {
        let mut s = SplineIndex::new(8, 1).unwrap();
        s.add(10, 0);
        let (p, lo, hi) = s.find(10).unwrap();
        assert_eq!(p, 0);
        assert!(lo <= 0 && hi >= 0);
    }

    #[test]
    fn linear_growth_stays_within_error_bound() {
        let mut s = SplineIndex::new(64, 2).unwrap();
        for page in 0..50u32 {
            s.add((page as u64) * 10, page);
        }
        for page in 0..50u32 {
            let key = (page as u64) * 10;
            let (predicted, lo, hi) = s.find(key).unwrap();
            assert!(lo <= page && page <= hi, "page {page} predicted {predicted} lo {lo} hi {hi}");
        }
    }

    #[test]
    fn clean_preserves_at_least_one_knot() {
        let mut s = SplineIndex::new(8, 1).unwrap();
        for page in 0..5u32 {
            s.add((page as u64) * 100, page);
        }
        s.clean(u64::MAX);
        assert!(s.len() >= 1);
    }

    #[test]
    fn erase_left_advances_start_without_touching_first_ever() {
        let mut s = SplineIndex::new(8, 1).unwrap();
        for page in 0..6u32 {
            s.add((page as u64) * 100, page);
        }
        let before = s.len();
        s.erase_left(2);
        assert_eq!(s.len(), before - 2);
        // A key below every retained knot still brackets against the very
        // first knot ever committed, not the new smallest one.
        let (_, lo, _) = s.find(0).unwrap();
        assert_eq!(lo, 0);
    }

    #[test]
    fn erase_left_never_drops_the_last_knot() {
        let mut s = SplineIndex::new(8, 1).unwrap();
        s.add(0, 0);
        s.add(100, 1);
        s.erase_left(10);
        assert!(s.len() >= 1);
    }

    #[test]
    fn corridor_narrows_and_commits_an_intermediate_knot_on_slope_change() {
        // Anchor (0,0) then a run whose slope steepens partway through: the
        // corridor must tighten on every accepted point, not widen, so the
        // steepening at (60,8) is actually detected as a violation and
        // (50,6) is committed as a real knot instead of the whole run
        // collapsing to a single knot at the anchor.
        let mut s = SplineIndex::new(8, 1).unwrap();
        for (key, page) in [(0, 0), (10, 1), (20, 2), (30, 3), (40, 4), (50, 6), (60, 8), (70, 10)] {
            s.add(key, page);
        }
        assert!(
            s.len() >= 2,
            "expected an intermediate knot at (50, 6), spline collapsed to {} knot(s)",
            s.len()
        );

        let (predicted, lo, hi) = s.find(40).unwrap();
        let true_page = 4u32;
        assert!(
            predicted.abs_diff(true_page) <= 1,
            "predicted {predicted} too far from true page {true_page}"
        );
        assert!(lo <= true_page && true_page <= hi, "lo {lo} hi {hi} true_page {true_page}");
    }

    #[test]
    fn radix_hint_still_binary_searches_a_multi_knot_window() {
        // A radix bucket can span more than one knot — the hint narrows the
        // search window, it is not itself the bracketing pair. Doubling the
        // slope on every point forces a fresh knot to commit on every add
        // (zero error tolerance), giving four distinct knots at keys
        // 0, 1, 2, 3 (pages 0, 1, 3, 7).
        let mut s = SplineIndex::new(16, 0).unwrap();
        for (key, page) in [(0u64, 0u32), (1, 1), (2, 3), (3, 7), (4, 15)] {
            s.add(key, page);
        }
        assert_eq!(s.len(), 4, "expected one committed knot per slope change");

        // A hint window spanning the whole knot list must still resolve key
        // 2 against its true bracketing pair (knots 2 and 3, i.e. (2,3) and
        // (3,7)), not by interpolating straight from the window's endpoints
        // (knots 0 and 3, i.e. (0,0) and (3,7), which would predict page 5).
        let (predicted, lo, hi) = s.find_with_hint(2, Some((0, 3))).unwrap();
        assert_eq!(predicted, 3);
        assert!(lo <= 3 && 3 <= hi);
    }

    #[test]
    fn key_below_retired_range_brackets_against_first_ever_knot() {
        let mut s = SplineIndex::new(8, 1).unwrap();
        for page in 0..5u32 {
            s.add((page as u64) * 100, page);
        }
        // Retire the first three knots, as a real eviction would.
        s.clean(250);
        let (predicted, lo, hi) = s.find(0).unwrap();
        // first_ever (key 0, page 0) still anchors the retired-range bracket
        // even though its knot is no longer in the live ring.
        assert_eq!(lo, 0);
        assert!(predicted <= hi);
    }
}
