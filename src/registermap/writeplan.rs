// src/registermap/writeplan.rs
//
// planWrite (spec.md §4.1): validates a candidate write against the
// point's declared constraints (read-only, safe bounds, deadband) and
// produces the FC6/FC16 wire plan without issuing it. The deadband
// "last value by point" state is owned here, not mutated onto the point
// definition (spec.md §9, Open Question 2).

use std::collections::HashMap;
use std::sync::Mutex;

use super::load::{PointType, RegisterMap, WordOrder};
use crate::types::PointName;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteReason {
    Applied,
    Clamped,
    DeadbandSkip,
}

#[derive(Debug, Clone)]
pub struct WritePlan {
    pub function_code: u8, // 6 or 16
    pub start: u16,
    pub quantity: u16,
    pub words: Vec<u16>,
    pub value_applied: f64,
    pub reason: WriteReason,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanWriteError {
    #[error("unknown point '{0}'")]
    UnknownPoint(String),
    #[error("point '{0}' is read-only")]
    ReadOnly(String),
    #[error("value is not a finite number")]
    NotANumber,
    #[error("value {value} is out of safe bounds [{lo}, {hi}] and clamping is disabled")]
    OutOfBounds { value: f64, lo: f64, hi: f64 },
}

pub fn plan_write(
    map: &RegisterMap,
    last_set: &Mutex<HashMap<PointName, f64>>,
    point_name: &str,
    raw_value: f64,
    allow_clamp: bool,
) -> Result<WritePlan, PlanWriteError> {
    let point = map
        .point(point_name)
        .ok_or_else(|| PlanWriteError::UnknownPoint(point_name.to_string()))?;

    if point.read_only {
        return Err(PlanWriteError::ReadOnly(point_name.to_string()));
    }

    if raw_value.is_nan() {
        return Err(PlanWriteError::NotANumber);
    }

    let mut value = raw_value;
    let mut reason = WriteReason::Applied;

    if let Some((lo, hi)) = point.safe_bounds {
        if value < lo || value > hi {
            if allow_clamp {
                value = value.clamp(lo, hi);
                reason = WriteReason::Clamped;
            } else {
                return Err(PlanWriteError::OutOfBounds { value, lo, hi });
            }
        }
    }

    if let Some(deadband) = point.deadband {
        let mut guard = last_set.lock().unwrap();
        if let Some(prev) = guard.get(point_name).copied() {
            if (value - prev).abs() < deadband {
                reason = WriteReason::DeadbandSkip;
            }
        }
        guard.insert(point_name.to_string(), value);
    }

    let byte_order = point.byte_order.unwrap_or(map.byte_order);
    let word_order = point.word_order.unwrap_or(map.word_order);

    // decode() turns a raw register into an engineering value via
    // `raw * scale + offset`; invert that here so the register we write
    // decodes back to the value the caller asked for.
    let mut register_value = value;
    if let Some(offset) = point.offset {
        register_value -= offset;
    }
    if let Some(scale) = point.scale {
        if scale != 0.0 {
            register_value /= scale;
        }
    }

    let (function_code, words) = match point.point_type {
        PointType::U16 => (6, vec![encode_u16(register_value as i64 as u16, byte_order)]),
        PointType::I16 => (6, vec![encode_u16(register_value as i16 as u16, byte_order)]),
        PointType::U32 | PointType::I32 => {
            let raw = match point.point_type {
                PointType::U32 => (register_value as i64 as u32).to_be_bytes(),
                _ => (register_value as i64 as i32).to_be_bytes(),
            };
            (16, split_32(raw, byte_order, word_order))
        }
        PointType::Float32 => {
            let raw = (register_value as f32).to_be_bytes();
            (16, split_32(raw, byte_order, word_order))
        }
    };

    Ok(WritePlan {
        function_code,
        start: point.addr,
        quantity: words.len() as u16,
        words,
        value_applied: value,
        reason,
    })
}

fn encode_u16(value: u16, byte_order: super::load::ByteOrder) -> u16 {
    match byte_order {
        super::load::ByteOrder::Be => value,
        // The wire value is still a single 16-bit register; byte order
        // only matters for how its two bytes are laid out, which the
        // transport layer handles when serializing — here we just swap
        // the byte representation so downstream encoding is consistent.
        super::load::ByteOrder::Le => value.swap_bytes(),
    }
}

fn split_32(raw_be: [u8; 4], byte_order: super::load::ByteOrder, word_order: WordOrder) -> Vec<u16> {
    let hi_reg = u16::from_be_bytes([raw_be[0], raw_be[1]]);
    let lo_reg = u16::from_be_bytes([raw_be[2], raw_be[3]]);
    let (first, second) = match word_order {
        WordOrder::Abcd => (hi_reg, lo_reg),
        WordOrder::Cdab => (lo_reg, hi_reg),
    };
    vec![encode_u16(first, byte_order), encode_u16(second, byte_order)]
}
