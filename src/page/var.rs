use super::layout::{VarPageLayout, VAR_LOGICAL_ID_OFFSET};
use super::read_uint_le;

pub fn init_empty(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = 0;
    }
}

pub fn logical_id(buf: &[u8]) -> u32 {
    u32::from_le_bytes(
        buf[VAR_LOGICAL_ID_OFFSET..VAR_LOGICAL_ID_OFFSET + 4]
            .try_into()
            .unwrap(),
    )
}

pub fn set_logical_id(buf: &mut [u8], id: u32) {
    buf[VAR_LOGICAL_ID_OFFSET..VAR_LOGICAL_ID_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
}

pub fn max_key_on_page(buf: &[u8], layout: &VarPageLayout) -> u64 {
    let off = layout.max_key_offset();
    read_uint_le(&buf[off..], layout.key_size)
}

pub fn set_max_key_on_page(buf: &mut [u8], layout: &VarPageLayout, key: u64) {
    let off = layout.max_key_offset();
    super::write_uint_le(&mut buf[off..], layout.key_size, key);
}
