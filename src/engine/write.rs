//! Write path: `put`, `put_var`, and the page-full flush machinery that
//! drives the circular logs and the spline.

use super::{BufferRole, Engine};
use crate::backend::PageStore;
use crate::config::Features;
use crate::error::{Error, Result};
use crate::page::{codec, index as index_codec};

impl<S: PageStore> Engine<S> {
    /// Inserts a fixed-width record. `key` must be strictly greater than
    /// every previously inserted key.
    pub fn put(&mut self, key: u64, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), self.data_layout.data_size);
        self.put_inner(key, data, None)
    }

    /// Inserts a record together with a variable-length payload. Pass
    /// `payload = None` to record a key/data pair with no variable data
    /// while still requiring [`crate::config::Features::USE_VDATA`] to be
    /// enabled — `put_var` is unavailable on engines without the feature,
    /// even for a record with no payload.
    pub fn put_var(&mut self, key: u64, data: &[u8], payload: Option<&[u8]>) -> Result<()> {
        if !self.config.features.contains(Features::USE_VDATA) {
            return Err(Error::FeatureDisabled("var data"));
        }
        let page_size = self.config.page_size as u32;
        let room = page_size - self.var_write_pos;
        let data_buffer_full =
            codec::record_count(self.buf(BufferRole::DataWrite)) as usize == self.data_layout.records_per_page;
        if room < 4 || data_buffer_full {
            self.flush_var_page()?;
        }

        let var_ptr = if payload.is_some() {
            let physical = self.var_ring.as_ref().unwrap().physical_slot(
                self.var_ring.as_ref().unwrap().next_logical_id,
            );
            Some(physical * page_size + self.var_write_pos)
        } else {
            None
        };

        self.put_inner(key, data, var_ptr)?;

        if let Some(bytes) = payload {
            let length = bytes.len() as u32;
            self.var_write_bytes(&length.to_le_bytes())?;
            self.var_write_bytes(bytes)?;
        }
        Ok(())
    }

    fn put_inner(&mut self, key: u64, data: &[u8], var_ptr: Option<u32>) -> Result<()> {
        if let Some(last) = self.last_key {
            if key <= last {
                return Err(Error::OrderingViolation);
            }
        }

        if codec::record_count(self.buf(BufferRole::DataWrite)) as usize == self.data_layout.records_per_page {
            self.flush_data_page()?;
        }

        let slot = codec::record_count(self.buf(BufferRole::DataWrite)) as usize;
        let layout = self.data_layout;
        codec::write_record(self.buf_mut(BufferRole::DataWrite), &layout, slot, key, data, var_ptr);
        codec::set_record_count(self.buf_mut(BufferRole::DataWrite), (slot + 1) as u16);

        if layout.use_maxmin {
            let cmp = self.config.data_compare.unwrap_or(|a, b| a.cmp(b));
            codec::update_minmax(self.buf_mut(BufferRole::DataWrite), &layout, key, data, cmp);
        }
        if layout.use_bmap {
            let update = self
                .config
                .update_bitmap
                .ok_or(Error::ConfigInvalid("USE_BMAP requires update_bitmap".into()))?;
            codec::update_bitmap(self.buf_mut(BufferRole::DataWrite), &layout, data, update);
        }

        if self.first_key.is_none() {
            self.first_key = Some(key);
        }
        self.last_key = Some(key);
        self.records_written += 1;
        Ok(())
    }

    /// Writes the full data write buffer to its ring slot, records a spline
    /// knot for it, and folds its bitmap into the index write buffer.
    pub(super) fn flush_data_page(&mut self) -> Result<()> {
        if self.data_ring.needs_eviction() {
            self.evict_data_block();
        }

        let page_min_key = codec::min_key(self.buf(BufferRole::DataWrite), &self.data_layout)
            .expect("flush of a page with at least one record always has a min key");

        let logical = self.data_ring.next_logical_id;
        codec::set_logical_id(self.buf_mut(BufferRole::DataWrite), logical);
        let physical = self.data_ring.next_physical_slot();
        self.data_store.write_page(physical, self.buf(BufferRole::DataWrite))?;
        self.data_ring.commit_write();
        self.stats.record_data_write();

        let predicted_before = self.spline.find(page_min_key).map(|(p, _, _)| p);
        self.spline.add(page_min_key, logical);
        if let Some(predicted) = predicted_before {
            self.stats.observe_error(predicted, logical);
        }
        if let Some(radix) = self.radix.as_mut() {
            radix.rebuild(&self.spline);
        }

        if self.config.features.contains(Features::USE_INDEX) {
            let bitmap = codec::bitmap(self.buf(BufferRole::DataWrite), &self.data_layout).to_vec();
            self.append_index_bitmap(logical, &bitmap)?;
        }

        let layout = self.data_layout;
        codec::init_empty(self.buf_mut(BufferRole::DataWrite), &layout);
        Ok(())
    }

    fn evict_data_block(&mut self) {
        let evicted = self.data_ring.evict_one_block();
        let avg_key_diff = match (self.first_key, self.last_key, self.records_written) {
            (Some(first), Some(last), n) if n > 1 && last > first => (last - first) / (n - 1),
            _ => 1,
        };
        let retired_pages = (evicted.end - evicted.start) as u64;
        let advance = retired_pages * self.data_layout.records_per_page as u64 * avg_key_diff.max(1);
        let new_min = self.min_key_estimate.map(|k| k + advance).unwrap_or(advance);
        self.min_key_estimate = Some(new_min);
        self.spline.clean(new_min);
    }

    fn append_index_bitmap(&mut self, covered_data_page: u32, bitmap: &[u8]) -> Result<()> {
        let layout = self
            .index_layout
            .ok_or(Error::FeatureDisabled("index"))?;
        if self.index_write_count == 0 {
            self.index_first_covered = covered_data_page;
        }
        let count = self.index_write_count as usize;
        index_codec::write_bitmap_slot(self.buf_mut(BufferRole::IndexWrite), &layout, count, bitmap);
        self.index_write_count += 1;
        if self.index_write_count as usize == layout.bitmaps_per_page {
            self.flush_index_page()?;
        }
        Ok(())
    }

    pub(super) fn flush_index_page(&mut self) -> Result<()> {
        if self.index_write_count == 0 {
            return Ok(());
        }
        let ring = self.index_ring.as_mut().ok_or(Error::FeatureDisabled("index"))?;
        if ring.needs_eviction() {
            ring.evict_one_block();
        }
        let logical = ring.next_logical_id;

        let count = self.index_write_count;
        let first_covered = self.index_first_covered;
        index_codec::set_logical_id(self.buf_mut(BufferRole::IndexWrite), logical);
        index_codec::set_count(self.buf_mut(BufferRole::IndexWrite), count);
        index_codec::set_first_covered_data_page(self.buf_mut(BufferRole::IndexWrite), first_covered);

        let physical = self.index_ring.as_ref().unwrap().next_physical_slot();
        self.index_store
            .as_mut()
            .ok_or(Error::FeatureDisabled("index"))?
            .write_page(physical, self.buf(BufferRole::IndexWrite))?;
        self.index_ring.as_mut().unwrap().commit_write();
        self.stats.record_index_write();

        index_codec::init_empty(self.buf_mut(BufferRole::IndexWrite));
        self.index_write_count = 0;
        Ok(())
    }

    /// Writes every non-empty buffer to its circular log, each followed by
    /// a backend flush.
    pub(super) fn flush_buffers(&mut self) -> Result<()> {
        if codec::record_count(self.buf(BufferRole::DataWrite)) > 0 {
            self.flush_data_page()?;
            self.data_store.flush()?;
        }
        if self.config.features.contains(Features::USE_INDEX) {
            if self.index_write_count > 0 {
                self.flush_index_page()?;
            }
            if let Some(s) = self.index_store.as_mut() {
                s.flush()?;
            }
        }
        if self.config.features.contains(Features::USE_VDATA) {
            if self.var_write_pos as usize > self.var_layout.unwrap().header_size {
                self.flush_var_page()?;
            }
            if let Some(s) = self.var_store.as_mut() {
                s.flush()?;
            }
        }
        Ok(())
    }
}

pub(super) fn flush<S: PageStore>(engine: &mut Engine<S>) -> Result<()> {
    engine.flush_buffers()
}
