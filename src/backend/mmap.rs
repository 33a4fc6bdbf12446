use super::{OpenMode, PageStore};
use crate::error::Result;
use crate::page::UNWRITTEN_LOGICAL_ID;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Page store backed by a memory-mapped file.
///
/// Grounded in `async_mmap_serialization_sink.rs`'s file-backed mapping,
/// rewritten from raw `libc::mmap`/append-only-cursor semantics to a safe
/// `memmap2::MmapMut` over a fixed-size, page-indexed region, since this
/// store must support random-access reads rather than only sequential
/// appends.
pub struct MmapPageStore {
    path: PathBuf,
    page_size: u32,
    num_pages: u32,
    mmap: Option<MmapMut>,
}

impl MmapPageStore {
    pub fn new(path: impl Into<PathBuf>, page_size: u32, num_pages: u32) -> Self {
        MmapPageStore {
            path: path.into(),
            page_size,
            num_pages,
            mmap: None,
        }
    }

    fn mmap_mut(&mut self) -> &mut MmapMut {
        self.mmap.as_mut().expect("page store used before open()")
    }

    fn page_range(&self, page_idx: u32) -> std::ops::Range<usize> {
        let start = page_idx as usize * self.page_size as usize;
        start..start + self.page_size as usize
    }
}

impl PageStore for MmapPageStore {
    fn open(&mut self, mode: OpenMode) -> Result<()> {
        let total_len = self.page_size as u64 * self.num_pages as u64;
        match mode {
            OpenMode::Truncate => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&self.path)?;
                file.set_len(total_len)?;
                let mmap = unsafe { MmapMut::map_mut(&file)? };
                self.mmap = Some(mmap);

                for idx in 0..self.num_pages {
                    let range = self.page_range(idx);
                    self.mmap_mut().as_mut()[range][0..4]
                        .copy_from_slice(&UNWRITTEN_LOGICAL_ID.to_le_bytes());
                }
                self.flush()
            }
            OpenMode::OpenExisting => {
                let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
                let mmap = unsafe { MmapMut::map_mut(&file)? };
                self.mmap = Some(mmap);
                Ok(())
            }
        }
    }

    fn read_page(&mut self, page_idx: u32, buf: &mut [u8]) -> Result<()> {
        let range = self.page_range(page_idx);
        let page_size = self.page_size as usize;
        buf[..page_size].copy_from_slice(&self.mmap_mut().as_ref()[range]);
        Ok(())
    }

    fn write_page(&mut self, page_idx: u32, buf: &[u8]) -> Result<()> {
        let range = self.page_range(page_idx);
        let page_size = self.page_size as usize;
        self.mmap_mut().as_mut()[range].copy_from_slice(&buf[..page_size]);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.mmap_mut().flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.mmap = None;
        Ok(())
    }
}
