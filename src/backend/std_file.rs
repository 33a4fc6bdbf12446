use super::{OpenMode, PageStore};
use crate::error::Result;
use crate::page::UNWRITTEN_LOGICAL_ID;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Page store backed by a plain `std::fs::File`, addressed with explicit
/// `seek` + `read_exact`/`write_all`. Grounded in `file_serialization_sink.rs`'s
/// file-handle management, adapted from sequential buffered appends to
/// random-access page I/O — `BufWriter` does not fit a store that must
/// re-read arbitrary pages for lookups.
pub struct StdFilePageStore {
    path: PathBuf,
    page_size: u32,
    num_pages: u32,
    file: Option<File>,
}

impl StdFilePageStore {
    pub fn new(path: impl Into<PathBuf>, page_size: u32, num_pages: u32) -> Self {
        StdFilePageStore {
            path: path.into(),
            page_size,
            num_pages,
            file: None,
        }
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        Ok(self
            .file
            .as_mut()
            .expect("page store used before open()"))
    }
}

impl PageStore for StdFilePageStore {
    fn open(&mut self, mode: OpenMode) -> Result<()> {
        match mode {
            OpenMode::Truncate => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let mut file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&self.path)?;
                file.set_len(self.page_size as u64 * self.num_pages as u64)?;
                self.file = Some(file);

                let mut sentinel = vec![0u8; self.page_size as usize];
                sentinel[0..4].copy_from_slice(&UNWRITTEN_LOGICAL_ID.to_le_bytes());
                for idx in 0..self.num_pages {
                    self.write_page(idx, &sentinel)?;
                }
                self.flush()
            }
            OpenMode::OpenExisting => {
                let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
                self.file = Some(file);
                Ok(())
            }
        }
    }

    fn read_page(&mut self, page_idx: u32, buf: &mut [u8]) -> Result<()> {
        let page_size = self.page_size;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(page_idx as u64 * page_size as u64))?;
        file.read_exact(&mut buf[..page_size as usize])?;
        Ok(())
    }

    fn write_page(&mut self, page_idx: u32, buf: &[u8]) -> Result<()> {
        let page_size = self.page_size;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(page_idx as u64 * page_size as u64))?;
        file.write_all(&buf[..page_size as usize])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file_mut()?.sync_data()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}
