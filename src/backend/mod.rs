//! File backend abstraction: page-aligned I/O over an opaque handle.
//!
//! Modeled on `measureme`'s swappable `SerializationSink` trait (one
//! concrete type backed by a plain `std::fs::File`, another by an `mmap`'d
//! region) generalized from append-only writes to random-access page
//! read/write, since the engine needs to re-read arbitrary pages for
//! lookups rather than only ever appending.

mod std_file;
pub use std_file::StdFilePageStore;

#[cfg(feature = "mmap")]
mod mmap;
#[cfg(feature = "mmap")]
pub use mmap::MmapPageStore;

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Create (or erase) the backing storage.
    Truncate,
    /// Open storage that already holds a previous run's pages.
    OpenExisting,
}

/// A page-aligned store of `num_pages` fixed `page_size` physical pages.
///
/// All I/O is page-granular: the core issues one logical page per call and
/// never assumes sub-page atomicity. A failed call must leave the store's
/// externally observable state unchanged (no partial page torn across two
/// calls).
pub trait PageStore {
    fn open(&mut self, mode: OpenMode) -> Result<()>;
    fn read_page(&mut self, page_idx: u32, buf: &mut [u8]) -> Result<()>;
    fn write_page(&mut self, page_idx: u32, buf: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
