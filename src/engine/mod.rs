//! Engine: the single-writer, single-process database instance that owns
//! the three circular logs, the buffer pool, and the learned index.
//!
//! Split the way `measureme`'s `Profiler` is split from its serialization
//! sink: this module owns construction/lifecycle, [`write`] owns the insert
//! path, [`read`] the lookup path, [`iter`] the range scan.

mod iter;
mod read;
mod var;
mod write;

pub use iter::{DbIterator, IteratorBounds};
pub use read::VarStream;

use crate::backend::{OpenMode, PageStore};
use crate::config::{EngineConfig, Features};
use crate::error::{Error, Result};
use crate::page::{
    self, DataPageLayout, IndexPageLayout, VarPageLayout,
};
use crate::radix::RadixTable;
use crate::ring::CircularLog;
use crate::spline::SplineIndex;
use crate::stats::Stats;
use std::cmp::Ordering;

/// The database instance. `S` is the page store backend shared by all three
/// logs (mixing backend types per log is not a configuration this engine
/// exposes).
/// A role a buffer-pool slot is permanently assigned at open time. Page
/// codec functions take a byte slice and operate in terms of layout
/// offsets, never in terms of which role produced the slice; `BufferRole`
/// only exists to address into the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BufferRole {
    DataWrite,
    DataRead,
    IndexWrite,
    IndexRead,
    VarWrite,
    VarRead,
}

/// Byte offset of each role's slot within [`Engine::buffer_pool`]. Roles
/// whose feature is disabled keep an offset of `0` and are never addressed
/// (every call site gates on the owning `Option<_>` layout first).
#[derive(Clone, Copy, Debug, Default)]
struct BufferOffsets {
    data_write: usize,
    data_read: usize,
    index_write: usize,
    index_read: usize,
    var_write: usize,
    var_read: usize,
}

pub struct Engine<S: PageStore> {
    pub(crate) config: EngineConfig,
    pub(crate) data_layout: DataPageLayout,
    pub(crate) index_layout: Option<IndexPageLayout>,
    pub(crate) var_layout: Option<VarPageLayout>,

    pub(crate) data_store: S,
    pub(crate) index_store: Option<S>,
    pub(crate) var_store: Option<S>,

    pub(crate) data_ring: CircularLog,
    pub(crate) index_ring: Option<CircularLog>,
    pub(crate) var_ring: Option<CircularLog>,

    pub(crate) spline: SplineIndex,
    pub(crate) radix: Option<RadixTable>,
    pub(crate) stats: Stats,

    /// One contiguous region holding every page-sized scratch buffer, sliced
    /// by role through [`Engine::buf`]/[`Engine::buf_mut`] rather than kept
    /// as separate allocations.
    buffer_pool: Vec<u8>,
    buffer_offsets: BufferOffsets,

    pub(crate) index_write_count: u16,
    pub(crate) index_first_covered: u32,
    pub(crate) var_write_pos: u32,

    pub(crate) first_key: Option<u64>,
    pub(crate) last_key: Option<u64>,
    pub(crate) records_written: u64,
    pub(crate) min_key_estimate: Option<u64>,
    pub(crate) min_var_record_id: u64,
}

impl<S: PageStore> Engine<S> {
    /// Constructs a fresh engine, formatting all backing files.
    pub fn init(
        config: EngineConfig,
        data_store: S,
        index_store: Option<S>,
        var_store: Option<S>,
    ) -> Result<Self> {
        Self::open(config, OpenMode::Truncate, data_store, index_store, var_store)
    }

    /// Rehydrates an engine from files written by a previous instance.
    pub fn open_existing(
        config: EngineConfig,
        data_store: S,
        index_store: Option<S>,
        var_store: Option<S>,
    ) -> Result<Self> {
        Self::open(config, OpenMode::OpenExisting, data_store, index_store, var_store)
    }

    fn open(
        config: EngineConfig,
        mode: OpenMode,
        mut data_store: S,
        mut index_store: Option<S>,
        mut var_store: Option<S>,
    ) -> Result<Self> {
        config.validate()?;

        let uses_index = config.features.contains(Features::USE_INDEX);
        let uses_var = config.features.contains(Features::USE_VDATA);

        let data_layout = DataPageLayout::new(&config)?;
        let index_layout = if uses_index {
            Some(IndexPageLayout::new(&config)?)
        } else {
            None
        };
        let var_layout = if uses_var {
            Some(VarPageLayout::new(&config)?)
        } else {
            None
        };

        if uses_index && index_store.is_none() {
            return Err(Error::ConfigInvalid(
                "USE_INDEX requires an index page store".into(),
            ));
        }
        if uses_var && var_store.is_none() {
            return Err(Error::ConfigInvalid(
                "USE_VDATA requires a variable-data page store".into(),
            ));
        }
        CircularLog::validate_sizes(config.num_data_pages, config.erase_size_in_pages)?;
        if uses_index {
            CircularLog::validate_sizes(config.num_index_pages, config.erase_size_in_pages)?;
        }
        if uses_var {
            CircularLog::validate_sizes(config.num_var_pages, config.erase_size_in_pages)?;
        }

        data_store.open(mode)?;
        if let Some(s) = index_store.as_mut() {
            s.open(mode)?;
        }
        if let Some(s) = var_store.as_mut() {
            s.open(mode)?;
        }

        let mut scratch = vec![0u8; config.page_size as usize];
        let (data_ring, index_ring, var_ring) = match mode {
            OpenMode::Truncate => (
                CircularLog::new_empty(config.num_data_pages, config.erase_size_in_pages),
                index_store
                    .as_ref()
                    .map(|_| CircularLog::new_empty(config.num_index_pages, config.erase_size_in_pages)),
                var_store
                    .as_ref()
                    .map(|_| CircularLog::new_empty(config.num_var_pages, config.erase_size_in_pages)),
            ),
            OpenMode::OpenExisting => {
                let dr = CircularLog::rehydrate(
                    &mut data_store,
                    config.num_data_pages,
                    config.erase_size_in_pages,
                    &mut scratch,
                )?;
                let ir = match index_store.as_mut() {
                    Some(s) => Some(CircularLog::rehydrate(
                        s,
                        config.num_index_pages,
                        config.erase_size_in_pages,
                        &mut scratch,
                    )?),
                    None => None,
                };
                let vr = match var_store.as_mut() {
                    Some(s) => Some(CircularLog::rehydrate(
                        s,
                        config.num_var_pages,
                        config.erase_size_in_pages,
                        &mut scratch,
                    )?),
                    None => None,
                };
                (dr, ir, vr)
            }
        };

        let radix = if config.radix_bits > 0 {
            Some(RadixTable::new(config.radix_bits))
        } else {
            None
        };

        let page_size = config.page_size as usize;
        let mut next_slot = 0usize;
        let mut offsets = BufferOffsets::default();
        offsets.data_write = next_slot;
        next_slot += page_size;
        offsets.data_read = next_slot;
        next_slot += page_size;
        if uses_index {
            offsets.index_write = next_slot;
            next_slot += page_size;
            offsets.index_read = next_slot;
            next_slot += page_size;
        }
        if uses_var {
            offsets.var_write = next_slot;
            next_slot += page_size;
            offsets.var_read = next_slot;
            next_slot += page_size;
        }
        let mut buffer_pool = vec![0u8; next_slot];
        page::codec::init_empty(&mut buffer_pool[offsets.data_write..offsets.data_write + page_size], &data_layout);

        let mut engine = Engine {
            config,
            data_layout,
            index_layout,
            var_layout,
            data_store,
            index_store,
            var_store,
            data_ring,
            index_ring,
            var_ring,
            spline: SplineIndex::new(0, 0)?, // replaced below once config is known
            radix,
            stats: Stats::new(),
            buffer_pool,
            buffer_offsets: offsets,
            index_write_count: 0,
            index_first_covered: 0,
            var_write_pos: var_layout.map(|l| l.header_size as u32).unwrap_or(0),
            first_key: None,
            last_key: None,
            records_written: 0,
            min_key_estimate: None,
            min_var_record_id: 0,
        };
        engine.spline = SplineIndex::new(config.num_spline_points, config.index_max_error)?;

        if mode == OpenMode::OpenExisting {
            engine.rehydrate_derived_state()?;
        }

        Ok(engine)
    }

    fn rehydrate_derived_state(&mut self) -> Result<()> {
        let ring = self.data_ring;
        if ring.is_empty() {
            log::debug!("rehydrate: data ring is empty, nothing to rebuild");
            return Ok(());
        }
        log::debug!(
            "rehydrate: rebuilding spline from logical pages {}..{}",
            ring.min_logical_id, ring.next_logical_id
        );
        let layout = self.data_layout;
        let records_per_page = layout.records_per_page as u64;
        let span = (ring.next_logical_id - ring.min_logical_id) as u64;

        let mut scratch = vec![0u8; self.config.page_size as usize];
        let mut first_key = None;
        let mut last_key = None;
        for logical in ring.min_logical_id..ring.next_logical_id {
            let physical = ring.physical_slot(logical);
            self.data_store.read_page(physical, &mut scratch)?;
            let mn = page::codec::min_key(&scratch, &layout);
            if let Some(mn) = mn {
                self.spline.add(mn, logical);
                if first_key.is_none() {
                    first_key = Some(mn);
                }
            }
            if let Some(mx) = page::codec::max_key(&scratch, &layout) {
                last_key = Some(mx);
            }
        }
        self.first_key = first_key;
        self.last_key = last_key;
        self.min_key_estimate = first_key;
        self.records_written = span * records_per_page;

        if let Some(radix) = self.radix.as_mut() {
            radix.rebuild(&self.spline);
        }
        Ok(())
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    fn data_compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.config.data_compare {
            Some(f) => f(a, b),
            None => a.cmp(b),
        }
    }

    /// Predicts `(page, lo, hi)` for `key`, narrowing the spline's binary
    /// search with a radix probe first when a radix table is configured.
    pub(crate) fn predict_page(&self, key: u64) -> Option<(u32, u32, u32)> {
        match &self.radix {
            Some(radix) => {
                let hint = radix.find(key);
                self.spline.find_with_hint(key, Some(hint))
            }
            None => self.spline.find(key),
        }
    }

    fn role_offset(&self, role: BufferRole) -> usize {
        match role {
            BufferRole::DataWrite => self.buffer_offsets.data_write,
            BufferRole::DataRead => self.buffer_offsets.data_read,
            BufferRole::IndexWrite => self.buffer_offsets.index_write,
            BufferRole::IndexRead => self.buffer_offsets.index_read,
            BufferRole::VarWrite => self.buffer_offsets.var_write,
            BufferRole::VarRead => self.buffer_offsets.var_read,
        }
    }

    pub(crate) fn buf(&self, role: BufferRole) -> &[u8] {
        let off = self.role_offset(role);
        let page_size = self.config.page_size as usize;
        &self.buffer_pool[off..off + page_size]
    }

    pub(crate) fn buf_mut(&mut self, role: BufferRole) -> &mut [u8] {
        let off = self.role_offset(role);
        let page_size = self.config.page_size as usize;
        &mut self.buffer_pool[off..off + page_size]
    }

    /// Writes every non-empty buffer to its circular log. The caller must
    /// call this before [`Engine::close`] to persist the tail: close flushes
    /// nothing implicitly.
    pub fn flush(&mut self) -> Result<()> {
        write::flush(self)
    }

    /// Closes all backing stores without flushing pending buffers.
    pub fn close(mut self) -> Result<()> {
        self.data_store.close()?;
        if let Some(s) = self.index_store.as_mut() {
            s.close()?;
        }
        if let Some(s) = self.var_store.as_mut() {
            s.close()?;
        }
        Ok(())
    }
}
