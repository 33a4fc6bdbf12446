//! `flashseries`: an embedded, page-oriented, append-only time-series
//! key-value engine for constrained storage (NOR/NAND flash, SD cards).
//!
//! Records with a strictly ascending `(key, data)` pair are packed into
//! fixed-size pages and written sequentially into a bounded circular file.
//! A piecewise-linear learned index (see [`spline`]) maps keys to small
//! physical page ranges so point lookups avoid scanning the whole log.
//! Two optional side logs add per-page bitmap predicate pushdown
//! ([`config::Features::USE_BMAP`]) and variable-length payloads
//! ([`config::Features::USE_VDATA`]).
//!
//! The engine is single-threaded and single-writer by design: callers must
//! serialize access externally.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod page;
pub mod radix;
pub mod ring;
pub mod spline;
pub mod stats;

pub use backend::{OpenMode, PageStore, StdFilePageStore};
pub use config::{EngineConfig, Features};
pub use engine::{DbIterator, Engine, IteratorBounds, VarStream};
pub use error::{Error, Result};

#[cfg(feature = "mmap")]
pub use backend::MmapPageStore;
