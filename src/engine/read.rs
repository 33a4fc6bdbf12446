//! Read path: `get`, `get_var`, and the streaming reader over the
//! variable-data log.

use super::{BufferRole, Engine};
use crate::backend::PageStore;
use crate::config::Features;
use crate::error::{Error, Result};
use crate::page::codec;
use crate::page::VarPageLayout;

/// A cursor over a variable-length payload: a physical byte offset, the
/// total payload length, and how much has been emitted so far. Holds no
/// reference to the engine — it is handed back to [`Engine::stream_read`]
/// on each subsequent call.
#[derive(Clone, Copy, Debug)]
pub struct VarStream {
    file_offset: u32,
    pub total_bytes: u32,
    pub bytes_read: u32,
}

impl VarStream {
    pub fn remaining(&self) -> u32 {
        self.total_bytes - self.bytes_read
    }

    pub fn is_done(&self) -> bool {
        self.bytes_read >= self.total_bytes
    }
}

impl<S: PageStore> Engine<S> {
    /// Looks up `key`, copying its fixed-width `data` field into `out_data`.
    pub fn get(&mut self, key: u64, out_data: &mut [u8]) -> Result<()> {
        debug_assert_eq!(out_data.len(), self.data_layout.data_size);

        if self.data_ring.is_empty() {
            return self.get_from_write_buffer(key, out_data);
        }

        if codec::record_count(self.buf(BufferRole::DataWrite)) > 0 {
            let buf_max = codec::max_key(self.buf(BufferRole::DataWrite), &self.data_layout).unwrap();
            if key > buf_max {
                return Err(Error::NotFound);
            }
            let buf_min = codec::min_key(self.buf(BufferRole::DataWrite), &self.data_layout).unwrap();
            if key >= buf_min {
                return self.get_from_write_buffer(key, out_data);
            }
        }

        let (predicted, lo, hi) = self.predict_page(key).ok_or(Error::NotFound)?;
        self.linear_refine(predicted, lo, hi, key)?;
        let slot = codec::search(self.buf(BufferRole::DataRead), &self.data_layout, key).ok_or(Error::NotFound)?;
        out_data.copy_from_slice(codec::record_data(self.buf(BufferRole::DataRead), &self.data_layout, slot));
        Ok(())
    }

    fn get_from_write_buffer(&mut self, key: u64, out_data: &mut [u8]) -> Result<()> {
        let slot = codec::search(self.buf(BufferRole::DataWrite), &self.data_layout, key).ok_or(Error::NotFound)?;
        out_data.copy_from_slice(codec::record_data(self.buf(BufferRole::DataWrite), &self.data_layout, slot));
        self.stats.record_buffer_hit();
        Ok(())
    }

    /// Walks from `predicted` toward `key`, re-reading adjacent pages until
    /// the buffered read page brackets `key`, bailing out with `NotFound`
    /// once the walk leaves `[lo, hi]` or the ring's live range.
    fn linear_refine(&mut self, predicted: u32, lo: u32, hi: u32, key: u64) -> Result<()> {
        if codec::record_count(self.buf(BufferRole::DataRead)) > 0 {
            let read_logical = codec::logical_id(self.buf(BufferRole::DataRead));
            if read_logical >= lo && read_logical <= hi {
                if let (Some(mn), Some(mx)) = (
                    codec::min_key(self.buf(BufferRole::DataRead), &self.data_layout),
                    codec::max_key(self.buf(BufferRole::DataRead), &self.data_layout),
                ) {
                    if key >= mn && key <= mx {
                        return Ok(());
                    }
                }
            }
        }

        let mut page = predicted.clamp(self.data_ring.min_logical_id, self.data_ring.next_logical_id - 1);
        loop {
            self.read_data_page(page)?;
            let mn = codec::min_key(self.buf(BufferRole::DataRead), &self.data_layout).ok_or(Error::NotFound)?;
            let mx = codec::max_key(self.buf(BufferRole::DataRead), &self.data_layout).ok_or(Error::NotFound)?;
            if key < mn {
                if page <= lo || page <= self.data_ring.min_logical_id {
                    return Err(Error::NotFound);
                }
                page -= 1;
            } else if key > mx {
                if page >= hi || page + 1 >= self.data_ring.next_logical_id {
                    return Err(Error::NotFound);
                }
                page += 1;
            } else {
                return Ok(());
            }
        }
    }

    pub(super) fn read_data_page(&mut self, logical: u32) -> Result<()> {
        let physical = self.data_ring.physical_slot(logical);
        self.data_store.read_page(physical, self.buf_mut(BufferRole::DataRead))?;
        self.stats.record_data_read();
        Ok(())
    }

    /// Looks up `key` like [`Engine::get`], additionally resolving its
    /// variable payload into a [`VarStream`]. Returns `Ok(None)` for a
    /// record that was inserted with no variable data.
    pub fn get_var(&mut self, key: u64, out_data: &mut [u8]) -> Result<Option<VarStream>> {
        if !self.config.features.contains(Features::USE_VDATA) {
            return Err(Error::FeatureDisabled("var data"));
        }
        let layout = self.var_layout_or_disabled()?;

        let wb_count = codec::record_count(self.buf(BufferRole::DataWrite));
        let in_write_buffer = wb_count > 0 && {
            let mn = codec::min_key(self.buf(BufferRole::DataWrite), &self.data_layout).unwrap();
            key >= mn
        };

        let var_ptr = if in_write_buffer {
            let slot = codec::search(self.buf(BufferRole::DataWrite), &self.data_layout, key).ok_or(Error::NotFound)?;
            out_data.copy_from_slice(codec::record_data(self.buf(BufferRole::DataWrite), &self.data_layout, slot));
            let ptr = codec::record_var_ptr(self.buf(BufferRole::DataWrite), &self.data_layout, slot);
            // The payload bytes for a record still sitting in the write
            // buffer may still be sitting in the var write buffer too (not
            // yet on the backend); force it out so the stream below can
            // read it back from storage.
            if self.var_write_pos as usize > layout.header_size {
                self.flush_var_page()?;
            }
            ptr
        } else {
            self.get(key, out_data)?;
            let slot = codec::search(self.buf(BufferRole::DataRead), &self.data_layout, key).ok_or(Error::NotFound)?;
            codec::record_var_ptr(self.buf(BufferRole::DataRead), &self.data_layout, slot)
        };

        self.resolve_var_ptr(key, var_ptr, &layout)
    }

    pub(super) fn resolve_var_ptr(&mut self, key: u64, var_ptr: Option<u32>, layout: &VarPageLayout) -> Result<Option<VarStream>> {
        let ptr = match var_ptr {
            Some(p) => p,
            None => return Ok(None),
        };
        if key < self.min_var_record_id {
            return Err(Error::Overwritten);
        }

        let page_size = self.config.page_size as u32;
        let total = self.var_total_bytes();
        let physical_page = ptr / page_size;
        let offset_in_page = ptr % page_size;

        self.var_store
            .as_mut()
            .ok_or(Error::FeatureDisabled("var data"))?
            .read_page(physical_page, self.buf_mut(BufferRole::VarRead))?;
        self.stats.record_data_read();

        let len_bytes: [u8; 4] = self.buf(BufferRole::VarRead)
            [offset_in_page as usize..offset_in_page as usize + 4]
            .try_into()
            .unwrap();
        let length = u32::from_le_bytes(len_bytes);

        let mut start = (ptr + 4) % total;
        if start % page_size == 0 {
            start = (start + layout.header_size as u32) % total;
        }

        Ok(Some(VarStream {
            file_offset: start,
            total_bytes: length,
            bytes_read: 0,
        }))
    }

    /// Copies up to `buf.len()` bytes from `stream` into `buf`, skipping
    /// page headers crossed along the way. Returns the number of bytes
    /// actually copied, which is less than requested once the stream is
    /// exhausted.
    pub fn stream_read(&mut self, stream: &mut VarStream, buf: &mut [u8]) -> Result<usize> {
        let layout = self.var_layout_or_disabled()?;
        let page_size = self.config.page_size as u32;
        let total = self.var_total_bytes();
        let want = buf.len().min(stream.remaining() as usize);
        let mut copied = 0usize;

        while copied < want {
            let mut offset_in_page = stream.file_offset % page_size;
            if (offset_in_page as usize) < layout.header_size {
                offset_in_page = layout.header_size as u32;
                let physical_page = stream.file_offset / page_size;
                stream.file_offset = physical_page * page_size + offset_in_page;
            }
            let physical_page = stream.file_offset / page_size;

            self.var_store
                .as_mut()
                .ok_or(Error::FeatureDisabled("var data"))?
                .read_page(physical_page, self.buf_mut(BufferRole::VarRead))?;
            self.stats.record_data_read();

            let avail = (page_size - offset_in_page) as usize;
            let n = avail.min(want - copied);
            let start = offset_in_page as usize;
            buf[copied..copied + n].copy_from_slice(&self.buf(BufferRole::VarRead)[start..start + n]);

            copied += n;
            stream.bytes_read += n as u32;
            stream.file_offset = (stream.file_offset + n as u32) % total;
        }
        Ok(copied)
    }
}
