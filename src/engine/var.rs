//! Shared variable-data page plumbing used by both the write path
//! ([`super::write`]) and the read path ([`super::read`]).

use super::{BufferRole, Engine};
use crate::backend::PageStore;
use crate::error::{Error, Result};
use crate::page::var as var_codec;

impl<S: PageStore> Engine<S> {
    pub(super) fn var_layout_or_disabled(&self) -> Result<crate::page::VarPageLayout> {
        self.var_layout.ok_or(Error::FeatureDisabled("var data"))
    }

    /// Evicts the var ring's oldest erase block if it is full, recovering
    /// `min_var_record_id` from the last page in the evicted range before
    /// its physical slot is overwritten.
    pub(super) fn maybe_evict_var(&mut self) -> Result<()> {
        let layout = self.var_layout_or_disabled()?;
        let needs = self.var_ring.as_ref().unwrap().needs_eviction();
        if !needs {
            return Ok(());
        }
        let evicted = self.var_ring.as_mut().unwrap().evict_one_block();
        let last_evicted = evicted.end - 1;
        let physical = self.var_ring.as_ref().unwrap().physical_slot(last_evicted);
        let mut scratch = vec![0u8; self.config.page_size as usize];
        self.var_store.as_mut().unwrap().read_page(physical, &mut scratch)?;
        let max_key = var_codec::max_key_on_page(&scratch, &layout);
        self.min_var_record_id = max_key + 1;
        Ok(())
    }

    /// Writes the current var write buffer to its ring slot and resets it.
    pub(super) fn flush_var_page(&mut self) -> Result<()> {
        let layout = self.var_layout_or_disabled()?;
        self.maybe_evict_var()?;

        let logical = self.var_ring.as_ref().unwrap().next_logical_id;
        var_codec::set_logical_id(self.buf_mut(BufferRole::VarWrite), logical);
        if let Some(last_key) = self.last_key {
            var_codec::set_max_key_on_page(self.buf_mut(BufferRole::VarWrite), &layout, last_key);
        }

        let physical = self.var_ring.as_ref().unwrap().next_physical_slot();
        self.var_store
            .as_mut()
            .unwrap()
            .write_page(physical, self.buf(BufferRole::VarWrite))?;
        self.var_ring.as_mut().unwrap().commit_write();
        self.stats.record_data_write();

        var_codec::init_empty(self.buf_mut(BufferRole::VarWrite));
        self.var_write_pos = layout.header_size as u32;
        Ok(())
    }

    /// Appends `bytes` into the var write buffer, flushing and rolling to a
    /// fresh page whenever the current one fills.
    pub(super) fn var_write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        let page_size = self.config.page_size as u32;
        while !bytes.is_empty() {
            let cap = (page_size - self.var_write_pos) as usize;
            let n = cap.min(bytes.len());
            let pos = self.var_write_pos as usize;
            self.buf_mut(BufferRole::VarWrite)[pos..pos + n].copy_from_slice(&bytes[..n]);
            self.var_write_pos += n as u32;
            bytes = &bytes[n..];
            if self.var_write_pos == page_size {
                self.flush_var_page()?;
            }
        }
        Ok(())
    }

    pub(super) fn var_total_bytes(&self) -> u32 {
        self.config.num_var_pages * self.config.page_size as u32
    }
}
