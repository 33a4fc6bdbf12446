use super::layout::{DataPageLayout, COUNT_OFFSET, LOGICAL_ID_OFFSET};
use super::{read_uint_le, write_uint_le, NO_VAR_DATA};
use std::cmp::Ordering;

/// All-ones sentinel for an uninitialized page's min-key header field, so
/// the very first insert's min-key comparison always updates it.
fn all_ones(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

/// Zeroes `buf` and, if min/max tracking is enabled, stamps the min-key
/// field with the all-ones sentinel. Everything else in an uninitialized
/// page is zero: count, bitmap, max key/data.
pub fn init_empty(buf: &mut [u8], layout: &DataPageLayout) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    if layout.use_maxmin {
        write_uint_le(
            &mut buf[layout.min_key_offset..],
            layout.key_size,
            all_ones(layout.key_size),
        );
    }
}

pub fn logical_id(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[LOGICAL_ID_OFFSET..LOGICAL_ID_OFFSET + 4].try_into().unwrap())
}

pub fn set_logical_id(buf: &mut [u8], id: u32) {
    buf[LOGICAL_ID_OFFSET..LOGICAL_ID_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
}

pub fn record_count(buf: &[u8]) -> u16 {
    u16::from_le_bytes(buf[COUNT_OFFSET..COUNT_OFFSET + 2].try_into().unwrap())
}

pub fn set_record_count(buf: &mut [u8], count: u16) {
    buf[COUNT_OFFSET..COUNT_OFFSET + 2].copy_from_slice(&count.to_le_bytes());
}

/// The key stored in record slot `slot`. Caller must ensure `slot <
/// record_count(buf)`.
pub fn record_key(buf: &[u8], layout: &DataPageLayout, slot: usize) -> u64 {
    let off = layout.record_offset(slot);
    read_uint_le(&buf[off..], layout.key_size)
}

pub fn record_data<'a>(buf: &'a [u8], layout: &DataPageLayout, slot: usize) -> &'a [u8] {
    let off = layout.record_offset(slot) + layout.key_size;
    &buf[off..off + layout.data_size]
}

pub fn record_var_ptr(buf: &[u8], layout: &DataPageLayout, slot: usize) -> Option<u32> {
    if !layout.use_vdata {
        return None;
    }
    let off = layout.record_offset(slot) + layout.key_size + layout.data_size;
    let ptr = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
    if ptr == NO_VAR_DATA {
        None
    } else {
        Some(ptr)
    }
}

/// Writes one record into `slot`, including the var pointer field (sentinel
/// when `var_ptr` is `None`) if variable data is enabled.
pub fn write_record(
    buf: &mut [u8],
    layout: &DataPageLayout,
    slot: usize,
    key: u64,
    data: &[u8],
    var_ptr: Option<u32>,
) {
    debug_assert_eq!(data.len(), layout.data_size);
    let off = layout.record_offset(slot);
    write_uint_le(&mut buf[off..], layout.key_size, key);
    let data_off = off + layout.key_size;
    buf[data_off..data_off + layout.data_size].copy_from_slice(data);
    if layout.use_vdata {
        let ptr_off = data_off + layout.data_size;
        let ptr = var_ptr.unwrap_or(NO_VAR_DATA);
        buf[ptr_off..ptr_off + 4].copy_from_slice(&ptr.to_le_bytes());
    }
}

/// Header min key: the header field if min/max tracking is enabled,
/// otherwise the first record's key (valid invariant as long as
/// `record_count(buf) > 0`).
pub fn min_key(buf: &[u8], layout: &DataPageLayout) -> Option<u64> {
    if layout.use_maxmin {
        Some(read_uint_le(&buf[layout.min_key_offset..], layout.key_size))
    } else if record_count(buf) > 0 {
        Some(record_key(buf, layout, 0))
    } else {
        None
    }
}

pub fn max_key(buf: &[u8], layout: &DataPageLayout) -> Option<u64> {
    if layout.use_maxmin {
        Some(read_uint_le(&buf[layout.max_key_offset..], layout.key_size))
    } else {
        let count = record_count(buf) as usize;
        if count > 0 {
            Some(record_key(buf, layout, count - 1))
        } else {
            None
        }
    }
}

pub fn update_bitmap(buf: &mut [u8], layout: &DataPageLayout, data: &[u8], update: impl Fn(&[u8], &mut [u8])) {
    debug_assert!(layout.use_bmap);
    let off = layout.bitmap_offset;
    update(data, &mut buf[off..off + layout.bitmap_size]);
}

pub fn bitmap<'a>(buf: &'a [u8], layout: &DataPageLayout) -> &'a [u8] {
    debug_assert!(layout.use_bmap);
    &buf[layout.bitmap_offset..layout.bitmap_offset + layout.bitmap_size]
}

/// Updates the header min/max key and data fields given a newly-inserted
/// record. Keys arrive in strictly ascending order so the max-key branch
/// always fires; the comparisons follow the literal min/max algorithm
/// rather than assuming that shortcut, so the codec stays correct even if
/// the write path is ever fed out of order by a future relaxation.
pub fn update_minmax(
    buf: &mut [u8],
    layout: &DataPageLayout,
    key: u64,
    data: &[u8],
    data_compare: impl Fn(&[u8], &[u8]) -> Ordering,
) {
    debug_assert!(layout.use_maxmin);
    let cur_min = read_uint_le(&buf[layout.min_key_offset..], layout.key_size);
    if key < cur_min {
        write_uint_le(&mut buf[layout.min_key_offset..], layout.key_size, key);
    }
    let cur_max = read_uint_le(&buf[layout.max_key_offset..], layout.key_size);
    if key > cur_max {
        write_uint_le(&mut buf[layout.max_key_offset..], layout.key_size, key);
    }

    let (min_off, max_off, data_size) = (layout.min_data_offset, layout.max_data_offset, layout.data_size);
    let count = record_count(buf);
    if count == 0 {
        buf[min_off..min_off + data_size].copy_from_slice(data);
        buf[max_off..max_off + data_size].copy_from_slice(data);
        return;
    }
    if data_compare(data, &buf[min_off..min_off + data_size]) == Ordering::Less {
        let tmp = data.to_vec();
        buf[min_off..min_off + data_size].copy_from_slice(&tmp);
    }
    if data_compare(data, &buf[max_off..max_off + data_size]) == Ordering::Greater {
        let tmp = data.to_vec();
        buf[max_off..max_off + data_size].copy_from_slice(&tmp);
    }
}

/// Intra-page search: interpolation guess for the first binary-search
/// midpoint, then standard binary search. Returns the slot of the unique
/// record matching `key`, or `None`.
pub fn search(buf: &[u8], layout: &DataPageLayout, key: u64) -> Option<usize> {
    let count = record_count(buf) as usize;
    if count == 0 {
        return None;
    }
    let lo_key = min_key(buf, layout)?;
    let hi_key = max_key(buf, layout)?;

    let mut lo = 0usize;
    let mut hi = count - 1;
    let mut first = true;

    loop {
        let mid = if first {
            first = false;
            if count > 1 && hi_key > lo_key {
                let slope = (hi_key - lo_key) as f64 / (count - 1) as f64;
                let guess = ((key as f64) - (lo_key as f64)) / slope;
                let guess = guess.floor();
                if guess >= 0.0 && (guess as usize) < count {
                    guess as usize
                } else {
                    (lo + hi) / 2
                }
            } else {
                (lo + hi) / 2
            }
        } else {
            lo + (hi - lo) / 2
        };

        let mid_key = record_key(buf, layout, mid);
        match mid_key.cmp(&key) {
            Ordering::Equal => return Some(mid),
            Ordering::Less => {
                if mid == hi {
                    return None;
                }
                lo = mid + 1;
            }
            Ordering::Greater => {
                if mid == lo {
                    return None;
                }
                hi = mid - 1;
            }
        }
        if lo > hi {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, Features};

    fn test_config() -> EngineConfig {
        EngineConfig {
            key_size: 4,
            data_size: 4,
            page_size: 64,
            num_data_pages: 8,
            num_index_pages: 0,
            num_var_pages: 0,
            erase_size_in_pages: 2,
            buffer_size_in_blocks: 2,
            num_spline_points: 32,
            index_max_error: 4,
            radix_bits: 0,
            bitmap_size: 0,
            features: Features::NONE,
            data_compare: None,
            update_bitmap: None,
            build_bitmap_from_range: None,
            in_bitmap: None,
        }
    }

    #[test]
    fn layout_matches_scenario_1() {
        let layout = DataPageLayout::new(&test_config()).unwrap();
        assert_eq!(layout.header_size, 6);
        assert_eq!(layout.record_size, 8);
        assert_eq!(layout.records_per_page, 7);
    }

    #[test]
    fn write_and_search_round_trip() {
        let config = test_config();
        let layout = DataPageLayout::new(&config).unwrap();
        let mut buf = vec![0u8; layout.page_size];
        init_empty(&mut buf, &layout);

        for i in 0u64..7 {
            write_record(&mut buf, &layout, i as usize, i + 1, &((100 + i) as u32).to_le_bytes(), None);
        }
        set_record_count(&mut buf, 7);

        assert_eq!(search(&buf, &layout, 1), Some(0));
        assert_eq!(search(&buf, &layout, 7), Some(6));
        assert_eq!(search(&buf, &layout, 4), Some(3));
        assert_eq!(search(&buf, &layout, 8), None);
        assert_eq!(search(&buf, &layout, 0), None);
    }

    #[test]
    fn search_on_empty_page_is_none() {
        let config = test_config();
        let layout = DataPageLayout::new(&config).unwrap();
        let mut buf = vec![0u8; layout.page_size];
        init_empty(&mut buf, &layout);
        assert_eq!(search(&buf, &layout, 1), None);
    }
}
