//! Range scan over persisted and buffered records, with optional key and
//! data predicates. Data predicates are pushed down through the bitmap
//! index when one is configured: a page can only be *skipped*, never
//! wrongly included, so the bitmap test is one-sided by construction.

use super::{BufferRole, Engine, VarStream};
use crate::backend::PageStore;
use crate::config::Features;
use crate::error::{Error, Result};
use crate::page::{codec, index as index_codec};
use std::cmp::Ordering;

#[derive(Clone, Debug, Default)]
pub struct IteratorBounds {
    pub min_key: Option<u64>,
    pub max_key: Option<u64>,
    pub min_data: Option<Vec<u8>>,
    pub max_data: Option<Vec<u8>>,
}

pub struct DbIterator<'e, S: PageStore> {
    engine: &'e mut Engine<S>,
    bounds: IteratorBounds,
    query_bitmap: Option<Vec<u8>>,
    next_data_page: u32,
    next_data_rec: usize,
}

impl<'e, S: PageStore> DbIterator<'e, S> {
    pub(crate) fn new(engine: &'e mut Engine<S>, bounds: IteratorBounds) -> Result<Self> {
        let query_bitmap = if (bounds.min_data.is_some() || bounds.max_data.is_some())
            && engine.config.features.contains(Features::USE_BMAP)
        {
            let build = engine
                .config
                .build_bitmap_from_range
                .ok_or_else(|| Error::ConfigInvalid("USE_BMAP requires build_bitmap_from_range".into()))?;
            let data_size = engine.config.data_size as usize;
            let min_data = bounds.min_data.clone().unwrap_or_else(|| vec![0u8; data_size]);
            let max_data = bounds.max_data.clone().unwrap_or_else(|| vec![0xFFu8; data_size]);
            let mut bm = vec![0u8; engine.config.bitmap_size as usize];
            build(&min_data, &max_data, &mut bm);
            Some(bm)
        } else {
            None
        };

        let start_page = match bounds.min_key {
            Some(mk) if engine.config.features.contains(Features::USE_INDEX) => engine
                .predict_page(mk)
                .map(|(_, lo, _)| lo)
                .unwrap_or(engine.data_ring.min_logical_id)
                .max(engine.data_ring.min_logical_id),
            _ => engine.data_ring.min_logical_id,
        };

        Ok(DbIterator {
            engine,
            bounds,
            query_bitmap,
            next_data_page: start_page,
            next_data_rec: 0,
        })
    }

    fn passes_data_bounds(&self, data: &[u8]) -> bool {
        let cmp = self.engine.config.data_compare.unwrap_or(|a: &[u8], b: &[u8]| a.cmp(b));
        if let Some(mn) = &self.bounds.min_data {
            if cmp(data, mn) == Ordering::Less {
                return false;
            }
        }
        if let Some(mx) = &self.bounds.max_data {
            if cmp(data, mx) == Ordering::Greater {
                return false;
            }
        }
        true
    }

    /// True if every record on `data_page_logical` is guaranteed to fail
    /// the data predicate and the page can be skipped outright.
    fn page_rejected_by_bitmap(&mut self, data_page_logical: u32, query_bitmap: &[u8]) -> Result<bool> {
        let index_layout = match self.engine.index_layout {
            Some(l) => l,
            None => return Ok(false),
        };
        let index_ring = match self.engine.index_ring {
            Some(r) => r,
            None => return Ok(false),
        };
        for idx_logical in index_ring.min_logical_id..index_ring.next_logical_id {
            let physical = index_ring.physical_slot(idx_logical);
            self.engine
                .index_store
                .as_mut()
                .unwrap()
                .read_page(physical, self.engine.buf_mut(BufferRole::IndexRead))?;
            self.engine.stats.record_index_read();
            let first = index_codec::first_covered_data_page(self.engine.buf(BufferRole::IndexRead));
            let count = index_codec::count(self.engine.buf(BufferRole::IndexRead)) as u32;
            if data_page_logical >= first && data_page_logical < first + count {
                let slot = (data_page_logical - first) as usize;
                let page_bitmap =
                    index_codec::bitmap_slot(self.engine.buf(BufferRole::IndexRead), &index_layout, slot);
                let overlap = query_bitmap.iter().zip(page_bitmap.iter()).any(|(a, b)| a & b != 0);
                return Ok(!overlap);
            }
        }
        Ok(false)
    }

    /// Advances the cursor to the next record passing every bound, returning
    /// which buffer role and slot it landed in. `None` once the scan is
    /// exhausted. Shared by [`DbIterator::next`] and [`DbIterator::next_var`]
    /// so both read the same record once instead of duplicating the walk.
    fn advance(&mut self) -> Result<Option<(BufferRole, usize)>> {
        loop {
            let live_end = self.engine.data_ring.next_logical_id;
            if self.next_data_page > live_end {
                return Ok(None);
            }

            if self.next_data_page == live_end {
                let count = codec::record_count(self.engine.buf(BufferRole::DataWrite)) as usize;
                while self.next_data_rec < count {
                    let slot = self.next_data_rec;
                    self.next_data_rec += 1;
                    let key = codec::record_key(self.engine.buf(BufferRole::DataWrite), &self.engine.data_layout, slot);
                    if let Some(mx) = self.bounds.max_key {
                        if key > mx {
                            return Ok(None);
                        }
                    }
                    if let Some(mn) = self.bounds.min_key {
                        if key < mn {
                            continue;
                        }
                    }
                    let data = codec::record_data(self.engine.buf(BufferRole::DataWrite), &self.engine.data_layout, slot);
                    if !self.passes_data_bounds(data) {
                        continue;
                    }
                    return Ok(Some((BufferRole::DataWrite, slot)));
                }
                return Ok(None);
            }

            if self.next_data_rec == 0 {
                if let Some(bm) = self.query_bitmap.clone() {
                    if self.page_rejected_by_bitmap(self.next_data_page, &bm)? {
                        self.next_data_page += 1;
                        continue;
                    }
                }
            }

            self.engine.read_data_page(self.next_data_page)?;
            let count = codec::record_count(self.engine.buf(BufferRole::DataRead)) as usize;
            while self.next_data_rec < count {
                let slot = self.next_data_rec;
                self.next_data_rec += 1;
                let key = codec::record_key(self.engine.buf(BufferRole::DataRead), &self.engine.data_layout, slot);
                if let Some(mx) = self.bounds.max_key {
                    if key > mx {
                        return Ok(None);
                    }
                }
                if let Some(mn) = self.bounds.min_key {
                    if key < mn {
                        continue;
                    }
                }
                let data = codec::record_data(self.engine.buf(BufferRole::DataRead), &self.engine.data_layout, slot).to_vec();
                if !self.passes_data_bounds(&data) {
                    continue;
                }
                return Ok(Some((BufferRole::DataRead, slot)));
            }
            self.next_data_page += 1;
            self.next_data_rec = 0;
        }
    }

    /// Advances the cursor, writing the next matching record into
    /// `out_key`/`out_data`. Returns `false` once the scan is exhausted.
    pub fn next(&mut self, out_key: &mut u64, out_data: &mut [u8]) -> Result<bool> {
        match self.advance()? {
            Some((role, slot)) => {
                *out_key = codec::record_key(self.engine.buf(role), &self.engine.data_layout, slot);
                out_data.copy_from_slice(codec::record_data(self.engine.buf(role), &self.engine.data_layout, slot));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Like [`DbIterator::next`], but also resolves the record's variable
    /// payload into `out_stream` (`None` for a record with no payload).
    /// Returns `false` once the scan is exhausted.
    pub fn next_var(
        &mut self,
        out_key: &mut u64,
        out_data: &mut [u8],
        out_stream: &mut Option<VarStream>,
    ) -> Result<bool> {
        if !self.engine.config.features.contains(Features::USE_VDATA) {
            return Err(Error::FeatureDisabled("var data"));
        }
        let layout = self.engine.var_layout_or_disabled()?;

        match self.advance()? {
            Some((role, slot)) => {
                let key = codec::record_key(self.engine.buf(role), &self.engine.data_layout, slot);
                out_data.copy_from_slice(codec::record_data(self.engine.buf(role), &self.engine.data_layout, slot));
                let var_ptr = codec::record_var_ptr(self.engine.buf(role), &self.engine.data_layout, slot);
                if role == BufferRole::DataWrite && self.engine.var_write_pos as usize > layout.header_size {
                    self.engine.flush_var_page()?;
                }
                *out_key = key;
                *out_stream = self.engine.resolve_var_ptr(key, var_ptr, &layout)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<S: PageStore> Engine<S> {
    pub fn iter(&mut self, bounds: IteratorBounds) -> Result<DbIterator<'_, S>> {
        DbIterator::new(self, bounds)
    }
}
