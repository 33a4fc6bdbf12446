use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Computed byte offsets for a data page, derived once from an
/// [`EngineConfig`]. Every optional header field (bitmap, min/max) is
/// present only when its feature flag was set; absent fields have no
/// meaningful offset and must not be read.
#[derive(Clone, Copy, Debug)]
pub struct DataPageLayout {
    pub key_size: usize,
    pub data_size: usize,
    pub page_size: usize,
    pub var_ptr_size: usize,
    pub bitmap_size: usize,
    pub use_maxmin: bool,
    pub use_bmap: bool,
    pub use_vdata: bool,
    pub bitmap_offset: usize,
    pub min_key_offset: usize,
    pub max_key_offset: usize,
    pub min_data_offset: usize,
    pub max_data_offset: usize,
    pub header_size: usize,
    pub record_size: usize,
    pub records_per_page: usize,
}

pub const LOGICAL_ID_OFFSET: usize = 0;
pub const COUNT_OFFSET: usize = 4;
const FIXED_HEADER_PREFIX: usize = 6; // logical_id(4) + count(2)

impl DataPageLayout {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let key_size = config.key_size as usize;
        let data_size = config.data_size as usize;
        let page_size = config.page_size as usize;
        let use_bmap = config.features.contains(crate::config::Features::USE_BMAP);
        let use_maxmin = config
            .features
            .contains(crate::config::Features::USE_MAX_MIN);
        let use_vdata = config.features.contains(crate::config::Features::USE_VDATA);
        let bitmap_size = if use_bmap { config.bitmap_size as usize } else { 0 };
        let var_ptr_size = if use_vdata { 4 } else { 0 };

        let mut offset = FIXED_HEADER_PREFIX;
        let bitmap_offset = offset;
        if use_bmap {
            offset += bitmap_size;
        }
        let min_key_offset = offset;
        let max_key_offset = offset + key_size;
        let min_data_offset = max_key_offset + key_size;
        let max_data_offset = min_data_offset + data_size;
        if use_maxmin {
            offset = max_data_offset + data_size;
        }
        let header_size = offset;

        let record_size = key_size + data_size + var_ptr_size;
        if header_size >= page_size || record_size == 0 {
            return Err(Error::ConfigInvalid(
                "page_size too small for the configured header".into(),
            ));
        }
        let records_per_page = (page_size - header_size) / record_size;
        if records_per_page == 0 {
            return Err(Error::ConfigInvalid(
                "page_size cannot fit even a single record".into(),
            ));
        }

        Ok(DataPageLayout {
            key_size,
            data_size,
            page_size,
            var_ptr_size,
            bitmap_size,
            use_maxmin,
            use_bmap,
            use_vdata,
            bitmap_offset,
            min_key_offset,
            max_key_offset,
            min_data_offset,
            max_data_offset,
            header_size,
            record_size,
            records_per_page,
        })
    }

    #[inline]
    pub fn record_offset(&self, slot: usize) -> usize {
        self.header_size + slot * self.record_size
    }
}

/// Computed layout for an index page: fixed 16-byte header followed by a
/// packed sequence of per-data-page bitmaps.
#[derive(Clone, Copy, Debug)]
pub struct IndexPageLayout {
    pub page_size: usize,
    pub bitmap_size: usize,
    pub bitmaps_per_page: usize,
}

pub const IDX_HEADER_SIZE: usize = 16;
pub const IDX_LOGICAL_ID_OFFSET: usize = 0;
pub const IDX_COUNT_OFFSET: usize = 4;
pub const IDX_FIRST_COVERED_OFFSET: usize = 8;

impl IndexPageLayout {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let page_size = config.page_size as usize;
        let bitmap_size = config.bitmap_size as usize;
        if page_size <= IDX_HEADER_SIZE || bitmap_size == 0 {
            return Err(Error::ConfigInvalid(
                "page_size too small for the index page header".into(),
            ));
        }
        let bitmaps_per_page = (page_size - IDX_HEADER_SIZE) / bitmap_size;
        if bitmaps_per_page == 0 {
            return Err(Error::ConfigInvalid(
                "page_size cannot fit a single bitmap slot".into(),
            ));
        }
        Ok(IndexPageLayout {
            page_size,
            bitmap_size,
            bitmaps_per_page,
        })
    }

    #[inline]
    pub fn bitmap_offset(&self, slot: usize) -> usize {
        IDX_HEADER_SIZE + slot * self.bitmap_size
    }
}

/// Computed layout for a variable-data page: 4-byte logical id + a copy of
/// the maximum key stored on the page, followed by stream bytes.
#[derive(Clone, Copy, Debug)]
pub struct VarPageLayout {
    pub page_size: usize,
    pub key_size: usize,
    pub header_size: usize,
}

pub const VAR_LOGICAL_ID_OFFSET: usize = 0;

impl VarPageLayout {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let key_size = config.key_size as usize;
        let header_size = 4 + key_size;
        let page_size = config.page_size as usize;
        if page_size <= header_size {
            return Err(Error::ConfigInvalid(
                "page_size too small for the variable-data page header".into(),
            ));
        }
        Ok(VarPageLayout {
            page_size,
            key_size,
            header_size,
        })
    }

    #[inline]
    pub fn max_key_offset(&self) -> usize {
        4
    }
}
