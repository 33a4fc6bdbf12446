//! Page layout descriptors and codecs.
//!
//! Layout offsets are computed once at engine-init time into a
//! [`DataPageLayout`] / [`IndexPageLayout`] / [`VarPageLayout`] rather than
//! re-derived from the feature flags on every access. Codec functions take
//! a byte slice and a layout reference,
//! never a typed struct over the buffer, since the buffer pool is one
//! contiguous owned region sliced by role (see [`crate::engine`]).

pub mod codec;
pub mod index;
mod layout;
pub mod var;

pub use layout::*;

/// Sentinel stored in a record's `var_ptr` field meaning "no variable
/// payload for this record".
pub const NO_VAR_DATA: u32 = 0xFFFF_FFFF;

/// Sentinel a fresh [`PageStore`](crate::backend::PageStore) page is stamped
/// with in its first 4 bytes (the logical id field, common to all three page
/// kinds) so rehydration can tell "never written" apart from "written with
/// logical id 0" without relying on end-of-file detection.
pub const UNWRITTEN_LOGICAL_ID: u32 = 0xFFFF_FFFF;

/// Reads a `size` (1..=8) byte little-endian unsigned integer, widened into
/// a `u64` local. Keys and other sub-word quantities are always moved this
/// way — never through a native-endian cast — since the on-disk format is
/// little-endian regardless of host.
#[inline]
pub fn read_uint_le(bytes: &[u8], size: usize) -> u64 {
    debug_assert!(size <= 8);
    let mut scratch = [0u8; 8];
    scratch[..size].copy_from_slice(&bytes[..size]);
    u64::from_le_bytes(scratch)
}

/// Writes the low `size` bytes of `value` as little-endian into `bytes`.
#[inline]
pub fn write_uint_le(bytes: &mut [u8], size: usize, value: u64) {
    debug_assert!(size <= 8);
    let scratch = value.to_le_bytes();
    bytes[..size].copy_from_slice(&scratch[..size]);
}
