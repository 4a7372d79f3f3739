// src/registermap/decode.rs
//
// Decode algorithm (spec.md §4.1): for each declared point, locate the
// enclosing block, compute the byte offset, apply byte/word order, and
// scale. A missing block or malformed buffer yields `None` for the
// affected point only — decoding never aborts the whole frame.

use std::collections::HashMap;

use super::load::{ByteOrder, PointType, RegisterMap, WordOrder};
use crate::types::PointName;

pub fn decode_points_from_blocks(
    map: &RegisterMap,
    block_buffers: &HashMap<String, Vec<u8>>,
) -> HashMap<PointName, f64> {
    let mut out = HashMap::new();
    for (name, point) in map.points() {
        let width = point.point_type.width();
        let Some(block) = map.enclosing_block(point.addr, width) else {
            continue;
        };
        let Some(buf) = block_buffers.get(&block.name) else {
            continue;
        };

        let byte_index = ((point.addr - block.start) as usize) * 2;
        let byte_len = (width as usize) * 2;
        if byte_index + byte_len > buf.len() {
            continue;
        }
        let raw_bytes = &buf[byte_index..byte_index + byte_len];

        let byte_order = point.byte_order.unwrap_or(map.byte_order);
        let word_order = point.word_order.unwrap_or(map.word_order);

        let Some(mut value) = decode_scalar(raw_bytes, point.point_type, byte_order, word_order)
        else {
            continue;
        };

        if let Some(scale) = point.scale {
            value *= scale;
        }
        if let Some(offset) = point.offset {
            value += offset;
        }

        out.insert(name.clone(), value);
    }
    out
}

/// Decode one point's raw register bytes into a scalar, honoring the
/// selected byte and word order. Returns `None` only on a buffer-length
/// mismatch (decode must never panic).
fn decode_scalar(
    raw: &[u8],
    point_type: PointType,
    byte_order: ByteOrder,
    word_order: WordOrder,
) -> Option<f64> {
    match point_type {
        PointType::U16 => {
            if raw.len() != 2 {
                return None;
            }
            Some(read_u16(raw, byte_order) as f64)
        }
        PointType::I16 => {
            if raw.len() != 2 {
                return None;
            }
            Some(read_u16(raw, byte_order) as i16 as f64)
        }
        PointType::U32 => {
            let bytes = reorder_32(raw, byte_order, word_order)?;
            Some(u32::from_be_bytes(bytes) as f64)
        }
        PointType::I32 => {
            let bytes = reorder_32(raw, byte_order, word_order)?;
            Some(i32::from_be_bytes(bytes) as f64)
        }
        PointType::Float32 => {
            let bytes = reorder_32(raw, byte_order, word_order)?;
            Some(f32::from_be_bytes(bytes) as f64)
        }
    }
}

fn read_u16(raw: &[u8], byte_order: ByteOrder) -> u16 {
    match byte_order {
        ByteOrder::Be => u16::from_be_bytes([raw[0], raw[1]]),
        ByteOrder::Le => u16::from_le_bytes([raw[0], raw[1]]),
    }
}

/// Normalize a 32-bit point's two registers into big-endian bytes ready
/// for `from_be_bytes`, applying word swap (CDAB) and per-register byte
/// order (LE) as declared.
fn reorder_32(raw: &[u8], byte_order: ByteOrder, word_order: WordOrder) -> Option<[u8; 4]> {
    if raw.len() != 4 {
        return None;
    }
    // Each register is 2 bytes; read them per the declared byte order to
    // get the register's numeric value, then place hi/lo per word order.
    let reg_hi = read_u16(&raw[0..2], byte_order);
    let reg_lo = read_u16(&raw[2..4], byte_order);
    let (hi, lo) = match word_order {
        WordOrder::Abcd => (reg_hi, reg_lo),
        WordOrder::Cdab => (reg_lo, reg_hi),
    };
    let combined = ((hi as u32) << 16) | (lo as u32);
    Some(combined.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registermap::RegisterMap;

    #[test]
    fn s1_u16_scaled_big_endian() {
        // ph declared u16, scale=0.01, addr=100, block A start=100 len=2.
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [{"name": "A", "fn": 3, "start": 100, "len": 2}],
            "points": {"ph": {"addr": 100, "type": "u16", "scale": 0.01}}
        }"#;
        let map = RegisterMap::from_str(json, "test").unwrap();
        let mut buffers = HashMap::new();
        buffers.insert("A".to_string(), vec![0x02, 0xE4, 0x00, 0x00]);
        let decoded = decode_points_from_blocks(&map, &buffers);
        assert!((decoded["ph"] - 7.40).abs() < 1e-9);
    }

    #[test]
    fn s2_float32_cdab_word_swap() {
        // temp1_C float32, word_order=CDAB, addr=200; bytes [00,00,41,C8]
        // reorder to [41,C8,00,00] -> 25.0
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [{"name": "B", "fn": 3, "start": 200, "len": 2}],
            "points": {"temp1_C": {"addr": 200, "type": "float32", "word_order": "CDAB"}}
        }"#;
        let map = RegisterMap::from_str(json, "test").unwrap();
        let mut buffers = HashMap::new();
        buffers.insert("B".to_string(), vec![0x00, 0x00, 0x41, 0xC8]);
        let decoded = decode_points_from_blocks(&map, &buffers);
        assert!((decoded["temp1_C"] - 25.0).abs() < 1e-6);
    }

    #[test]
    fn missing_block_yields_no_value() {
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [{"name": "A", "fn": 3, "start": 100, "len": 1}],
            "points": {"ph": {"addr": 100, "type": "u16"}}
        }"#;
        let map = RegisterMap::from_str(json, "test").unwrap();
        let decoded = decode_points_from_blocks(&map, &HashMap::new());
        assert!(decoded.get("ph").is_none());
    }

    #[test]
    fn i16_is_sign_extended() {
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [{"name": "A", "fn": 3, "start": 0, "len": 1}],
            "points": {"neg": {"addr": 0, "type": "i16"}}
        }"#;
        let map = RegisterMap::from_str(json, "test").unwrap();
        let mut buffers = HashMap::new();
        buffers.insert("A".to_string(), vec![0xFF, 0xFF]);
        let decoded = decode_points_from_blocks(&map, &buffers);
        assert_eq!(decoded["neg"], -1.0);
    }
}
