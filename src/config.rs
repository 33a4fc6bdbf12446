//! Init-time configuration and feature flags.
//!
//! Every size and feature combination that the engine cannot operate with
//! is rejected here, before any file handle is touched, so a failed
//! [`EngineConfig::validate`] leaves nothing for the caller to tear down.

use crate::error::{Error, Result};
use std::cmp::Ordering;

/// Feature bitmask, one bit per optional capability.
///
/// Widened into a typed newtype instead of raw integer constants so
/// callers cannot accidentally OR in an undefined bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Features(u8);

impl Features {
    pub const NONE: Features = Features(0);
    pub const USE_INDEX: Features = Features(1);
    pub const USE_MAX_MIN: Features = Features(2);
    /// Reserved for a future sum aggregate; the engine accepts and
    /// round-trips the bit but implements no behavior for it yet.
    pub const USE_SUM: Features = Features(4);
    pub const USE_BMAP: Features = Features(8);
    pub const USE_VDATA: Features = Features(16);
    pub const RESET_DATA: Features = Features(32);

    pub fn contains(self, flag: Features) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for Features {
    type Output = Features;
    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Features) {
        self.0 |= rhs.0;
    }
}

/// Signature for the caller-supplied data comparator. Keys are always
/// unsigned integers compared numerically by the engine itself; only the
/// opaque `data` column needs a caller-supplied ordering, and only when
/// [`Features::USE_MAX_MIN`] is enabled.
pub type DataComparator = fn(&[u8], &[u8]) -> Ordering;

/// `updateBitmap`: folds one record's `data` value into a page's running
/// bitmap.
pub type UpdateBitmapFn = fn(data: &[u8], bitmap: &mut [u8]);
/// `buildBitmapFromRange`: builds a query bitmap from a `[minData, maxData]`
/// predicate range.
pub type BuildBitmapFromRangeFn = fn(min_data: &[u8], max_data: &[u8], bitmap: &mut [u8]);
/// `inBitmap`: true if `data` could plausibly be present given `bitmap`.
pub type InBitmapFn = fn(data: &[u8], bitmap: &[u8]) -> bool;

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub key_size: u8,
    pub data_size: u16,
    pub page_size: u16,
    pub num_data_pages: u32,
    pub num_index_pages: u32,
    pub num_var_pages: u32,
    pub erase_size_in_pages: u32,
    pub buffer_size_in_blocks: u8,
    pub num_spline_points: u32,
    pub index_max_error: u32,
    pub radix_bits: u8,
    pub bitmap_size: u8,
    pub features: Features,
    pub data_compare: Option<DataComparator>,
    pub update_bitmap: Option<UpdateBitmapFn>,
    pub build_bitmap_from_range: Option<BuildBitmapFromRangeFn>,
    pub in_bitmap: Option<InBitmapFn>,
}

impl EngineConfig {
    fn uses_index(&self) -> bool {
        self.features.contains(Features::USE_INDEX)
    }
    fn uses_var(&self) -> bool {
        self.features.contains(Features::USE_VDATA)
    }
    fn uses_bmap(&self) -> bool {
        self.features.contains(Features::USE_BMAP)
    }
    fn uses_maxmin(&self) -> bool {
        self.features.contains(Features::USE_MAX_MIN)
    }

    /// Checks every invariant that should reject a configuration with
    /// `ConfigInvalid`, independent of page-layout arithmetic (that lives in
    /// [`crate::page::DataPageLayout`] and friends).
    pub fn validate(&self) -> Result<()> {
        if self.key_size == 0 || self.key_size > 8 {
            return Err(Error::ConfigInvalid(format!(
                "key_size must be in 1..=8, got {}",
                self.key_size
            )));
        }
        if self.data_size == 0 {
            return Err(Error::ConfigInvalid("data_size must be non-zero".into()));
        }
        if self.page_size == 0 {
            return Err(Error::ConfigInvalid("page_size must be non-zero".into()));
        }
        if self.erase_size_in_pages == 0 {
            return Err(Error::ConfigInvalid(
                "erase_size_in_pages must be non-zero".into(),
            ));
        }
        if self.num_data_pages < 2 * self.erase_size_in_pages {
            return Err(Error::ConfigInvalid(
                "num_data_pages must be at least 2 erase blocks".into(),
            ));
        }
        if self.num_data_pages % self.erase_size_in_pages != 0 {
            return Err(Error::ConfigInvalid(
                "num_data_pages must be a multiple of erase_size_in_pages".into(),
            ));
        }
        if self.uses_index() && self.num_data_pages < 4 * self.erase_size_in_pages {
            return Err(Error::ConfigInvalid(
                "num_data_pages must be at least 4 erase blocks when the index is enabled".into(),
            ));
        }
        if self.uses_index() {
            if self.num_index_pages < 2 * self.erase_size_in_pages {
                return Err(Error::ConfigInvalid(
                    "num_index_pages must be at least 2 erase blocks".into(),
                ));
            }
            if self.num_index_pages % self.erase_size_in_pages != 0 {
                return Err(Error::ConfigInvalid(
                    "num_index_pages must be a multiple of erase_size_in_pages".into(),
                ));
            }
            if self.bitmap_size == 0 || self.bitmap_size > 8 {
                return Err(Error::ConfigInvalid(
                    "bitmap_size must be in 1..=8 bytes".into(),
                ));
            }
        }
        if self.uses_var() {
            if self.num_var_pages < 2 * self.erase_size_in_pages {
                return Err(Error::ConfigInvalid(
                    "num_var_pages must be at least 2 erase blocks".into(),
                ));
            }
            if self.num_var_pages % self.erase_size_in_pages != 0 {
                return Err(Error::ConfigInvalid(
                    "num_var_pages must be a multiple of erase_size_in_pages".into(),
                ));
            }
        }
        if self.uses_bmap() && !self.uses_index() {
            return Err(Error::ConfigInvalid(
                "USE_BMAP requires USE_INDEX".into(),
            ));
        }
        if self.uses_bmap() {
            if self.update_bitmap.is_none()
                || self.build_bitmap_from_range.is_none()
                || self.in_bitmap.is_none()
            {
                return Err(Error::ConfigInvalid(
                    "USE_BMAP requires update_bitmap, build_bitmap_from_range and in_bitmap callbacks".into(),
                ));
            }
        }
        if self.uses_maxmin() && self.data_compare.is_none() {
            return Err(Error::ConfigInvalid(
                "USE_MAX_MIN requires a data comparator".into(),
            ));
        }
        if self.num_spline_points < 2 {
            return Err(Error::ConfigInvalid(
                "num_spline_points must allow at least 2 knots".into(),
            ));
        }
        let min_buffer_slots: u8 = if self.uses_var() && self.uses_index() {
            6
        } else if self.uses_index() {
            4
        } else {
            2
        };
        if self.buffer_size_in_blocks < min_buffer_slots {
            return Err(Error::ConfigInvalid(format!(
                "buffer_size_in_blocks must be at least {} for the enabled features",
                min_buffer_slots
            )));
        }
        Ok(())
    }
}
