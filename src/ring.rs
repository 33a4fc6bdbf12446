//! Circular log: maps logical page ids to physical slots in a bounded
//! region and manages erase-block eviction.
//!
//! One `CircularLog` instance backs each of the data, index, and var files;
//! it knows nothing about page roles or record layout, only that every page
//! stamps its logical id as the first 4 little-endian bytes (a convention
//! shared by all three page kinds).

use crate::backend::PageStore;
use crate::error::{Error, Result};
use crate::page::UNWRITTEN_LOGICAL_ID;
use std::ops::Range;

#[derive(Clone, Copy, Debug)]
pub struct CircularLog {
    pub next_logical_id: u32,
    pub min_logical_id: u32,
    num_pages: u32,
    erase_size_in_pages: u32,
    free_pages: i64,
}

impl CircularLog {
    pub fn validate_sizes(num_pages: u32, erase_size_in_pages: u32) -> Result<()> {
        if erase_size_in_pages == 0 || num_pages < 2 * erase_size_in_pages {
            return Err(Error::ConfigInvalid(
                "ring must hold at least 2 erase blocks".into(),
            ));
        }
        if num_pages % erase_size_in_pages != 0 {
            return Err(Error::ConfigInvalid(
                "ring size must be a multiple of the erase block size".into(),
            ));
        }
        Ok(())
    }

    /// A freshly formatted, empty ring.
    pub fn new_empty(num_pages: u32, erase_size_in_pages: u32) -> Self {
        CircularLog {
            next_logical_id: 0,
            min_logical_id: 0,
            num_pages,
            erase_size_in_pages,
            free_pages: num_pages as i64,
        }
    }

    #[inline]
    pub fn physical_slot(&self, logical: u32) -> u32 {
        logical % self.num_pages
    }

    #[inline]
    pub fn contains(&self, logical: u32) -> bool {
        logical >= self.min_logical_id && logical < self.next_logical_id
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next_logical_id == self.min_logical_id
    }

    #[inline]
    pub fn needs_eviction(&self) -> bool {
        self.free_pages <= 0
    }

    /// Evicts the oldest erase block, returning the logical id range that
    /// was just retired. Callers that track derived state per ring (the
    /// data ring's `min_key`/spline, the var ring's `min_var_record_id`)
    /// must read whatever they need from the evicted range's pages *before*
    /// the physical slots backing them are overwritten by the pending write.
    pub fn evict_one_block(&mut self) -> Range<u32> {
        let start = self.min_logical_id;
        self.min_logical_id += self.erase_size_in_pages;
        self.free_pages += self.erase_size_in_pages as i64;
        log::debug!("evicting logical pages {}..{}", start, self.min_logical_id);
        start..self.min_logical_id
    }

    /// Physical slot the next write will land on.
    #[inline]
    pub fn next_physical_slot(&self) -> u32 {
        self.physical_slot(self.next_logical_id)
    }

    /// Call only after the backend write for `next_physical_slot()` has
    /// succeeded. Cursors must never advance on a failed write.
    pub fn commit_write(&mut self) -> u32 {
        let id = self.next_logical_id;
        self.next_logical_id += 1;
        self.free_pages -= 1;
        id
    }

    /// Reconstructs ring state by walking physical pages from an existing
    /// store.
    pub fn rehydrate(
        store: &mut dyn PageStore,
        num_pages: u32,
        erase_size_in_pages: u32,
        scratch: &mut [u8],
    ) -> Result<Self> {
        let l0 = match Self::try_read_logical_id(store, 0, scratch) {
            Some(id) => id,
            None => {
                log::debug!("rehydrate: physical page 0 is unwritten, starting from an empty ring");
                return Ok(Self::new_empty(num_pages, erase_size_in_pages));
            }
        };

        let mut max_seen = l0;
        let mut prev = l0;
        let mut min_logical_id = 0u32;
        let mut wrapped = false;

        for physical in 1..num_pages {
            match Self::try_read_logical_id(store, physical, scratch) {
                Some(id) if id == prev.wrapping_add(1) => {
                    prev = id;
                    max_seen = id;
                }
                Some(id) => {
                    // Sequence broke: `physical` is the wrap point, the
                    // oldest page still retained from a previous run.
                    log::debug!(
                        "rehydrate: ring wrapped at physical page {}, oldest retained logical id {}",
                        physical, id
                    );
                    min_logical_id = id;
                    wrapped = true;
                    break;
                }
                None => break,
            }
        }

        let next_logical_id = max_seen + 1;
        let free_pages = if wrapped {
            0
        } else {
            num_pages as i64 - (next_logical_id - min_logical_id) as i64
        };

        Ok(CircularLog {
            next_logical_id,
            min_logical_id,
            num_pages,
            erase_size_in_pages,
            free_pages,
        })
    }

    fn try_read_logical_id(store: &mut dyn PageStore, physical: u32, scratch: &mut [u8]) -> Option<u32> {
        store.read_page(physical, scratch).ok()?;
        let id = u32::from_le_bytes(scratch[0..4].try_into().unwrap());
        if id == UNWRITTEN_LOGICAL_ID {
            None
        } else {
            Some(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_credits_free_pages_and_advances_min() {
        let mut ring = CircularLog::new_empty(4, 2);
        for _ in 0..4 {
            ring.commit_write();
        }
        assert!(ring.needs_eviction());
        let evicted = ring.evict_one_block();
        assert_eq!(evicted, 0..2);
        assert_eq!(ring.min_logical_id, 2);
        assert!(!ring.needs_eviction());
    }

    #[test]
    fn wraps_physical_slots_modulo_capacity() {
        let ring = CircularLog::new_empty(4, 2);
        assert_eq!(ring.physical_slot(9), 1);
    }
}
