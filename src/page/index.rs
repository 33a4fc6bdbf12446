use super::layout::{
    IndexPageLayout, IDX_COUNT_OFFSET, IDX_FIRST_COVERED_OFFSET, IDX_LOGICAL_ID_OFFSET,
};

pub fn init_empty(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = 0;
    }
}

pub fn logical_id(buf: &[u8]) -> u32 {
    u32::from_le_bytes(
        buf[IDX_LOGICAL_ID_OFFSET..IDX_LOGICAL_ID_OFFSET + 4]
            .try_into()
            .unwrap(),
    )
}

pub fn set_logical_id(buf: &mut [u8], id: u32) {
    buf[IDX_LOGICAL_ID_OFFSET..IDX_LOGICAL_ID_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
}

pub fn count(buf: &[u8]) -> u16 {
    u16::from_le_bytes(buf[IDX_COUNT_OFFSET..IDX_COUNT_OFFSET + 2].try_into().unwrap())
}

pub fn set_count(buf: &mut [u8], count: u16) {
    buf[IDX_COUNT_OFFSET..IDX_COUNT_OFFSET + 2].copy_from_slice(&count.to_le_bytes());
}

pub fn first_covered_data_page(buf: &[u8]) -> u32 {
    u32::from_le_bytes(
        buf[IDX_FIRST_COVERED_OFFSET..IDX_FIRST_COVERED_OFFSET + 4]
            .try_into()
            .unwrap(),
    )
}

pub fn set_first_covered_data_page(buf: &mut [u8], page: u32) {
    buf[IDX_FIRST_COVERED_OFFSET..IDX_FIRST_COVERED_OFFSET + 4].copy_from_slice(&page.to_le_bytes());
}

pub fn bitmap_slot<'a>(buf: &'a [u8], layout: &IndexPageLayout, slot: usize) -> &'a [u8] {
    let off = layout.bitmap_offset(slot);
    &buf[off..off + layout.bitmap_size]
}

pub fn write_bitmap_slot(buf: &mut [u8], layout: &IndexPageLayout, slot: usize, bitmap: &[u8]) {
    let off = layout.bitmap_offset(slot);
    buf[off..off + layout.bitmap_size].copy_from_slice(bitmap);
}
