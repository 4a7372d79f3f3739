// src/registermap/load.rs
//
// Parses and validates a register map JSON file (spec.md §6):
// {schema_ver, byte_order, word_order, blocks:[...], points:{...}}.
// Validation is eager: every point must lie entirely within exactly one
// block, or the load fails (spec.md §7, config errors are fatal at load).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::PointName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ByteOrder {
    Be,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordOrder {
    #[serde(rename = "ABCD")]
    Abcd,
    #[serde(rename = "CDAB")]
    Cdab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    U16,
    I16,
    U32,
    I32,
    Float32,
}

impl PointType {
    /// Width in 16-bit registers.
    pub fn width(&self) -> u16 {
        match self {
            PointType::U16 | PointType::I16 => 1,
            PointType::U32 | PointType::I32 | PointType::Float32 => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    #[serde(rename = "fn")]
    pub function: u8,
    pub start: u16,
    pub len: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointDef {
    pub addr: u16,
    #[serde(rename = "type")]
    pub point_type: PointType,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub offset: Option<f64>,
    #[serde(default)]
    pub byte_order: Option<ByteOrder>,
    #[serde(default)]
    pub word_order: Option<WordOrder>,
    #[serde(default)]
    pub safe_bounds: Option<(f64, f64)>,
    #[serde(default)]
    pub deadband: Option<f64>,
    #[serde(default, rename = "ro")]
    pub read_only: bool,
}

/// Raw on-disk shape, deserialized directly from the register map file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMapFile {
    pub schema_ver: u32,
    pub byte_order: ByteOrder,
    pub word_order: WordOrder,
    pub blocks: Vec<Block>,
    pub points: HashMap<PointName, PointDef>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterMapError {
    #[error("failed to read register map {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse register map {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("point '{point}' (addr {addr}, width {width}) is not contained in exactly one block")]
    PointNotContained {
        point: String,
        addr: u16,
        width: u16,
    },
    #[error("block '{name}' only supports fn=3 (holding registers), got fn={function}")]
    UnsupportedFunction { name: String, function: u8 },
}

/// Immutable, validated register map. Construction (`RegisterMap::load`)
/// is the only place the containment invariant is checked.
#[derive(Debug, Clone)]
pub struct RegisterMap {
    pub schema_ver: u32,
    pub byte_order: ByteOrder,
    pub word_order: WordOrder,
    blocks: Vec<Block>,
    points: HashMap<PointName, PointDef>,
}

impl RegisterMap {
    pub fn load(path: &Path) -> Result<Self, RegisterMapError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegisterMapError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&text, &path.display().to_string())
    }

    pub fn from_str(text: &str, path_label: &str) -> Result<Self, RegisterMapError> {
        let file: RegisterMapFile =
            serde_json::from_str(text).map_err(|source| RegisterMapError::Parse {
                path: path_label.to_string(),
                source,
            })?;
        Self::from_file(file)
    }

    pub fn from_file(file: RegisterMapFile) -> Result<Self, RegisterMapError> {
        for block in &file.blocks {
            if block.function != 3 {
                return Err(RegisterMapError::UnsupportedFunction {
                    name: block.name.clone(),
                    function: block.function,
                });
            }
        }

        for (name, point) in &file.points {
            let width = point.point_type.width();
            let contained = file.blocks.iter().filter(|b| {
                point.addr >= b.start && point.addr + width <= b.start + b.len
            });
            if contained.count() != 1 {
                return Err(RegisterMapError::PointNotContained {
                    point: name.clone(),
                    addr: point.addr,
                    width,
                });
            }
        }

        Ok(RegisterMap {
            schema_ver: file.schema_ver,
            byte_order: file.byte_order,
            word_order: file.word_order,
            blocks: file.blocks,
            points: file.points,
        })
    }

    /// Shallow-cloned list of declared blocks, in declared order.
    pub fn get_blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn points(&self) -> &HashMap<PointName, PointDef> {
        &self.points
    }

    pub fn point(&self, name: &str) -> Option<&PointDef> {
        self.points.get(name)
    }

    /// Locate the block whose range fully contains `[addr, addr+width-1]`.
    pub fn enclosing_block(&self, addr: u16, width: u16) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| addr >= b.start && addr + width <= b.start + b.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "schema_ver": 1,
            "byte_order": "BE",
            "word_order": "ABCD",
            "blocks": [{"name": "A", "fn": 3, "start": 100, "len": 4}],
            "points": {
                "ph": {"addr": 100, "type": "u16", "scale": 0.01},
                "temp1_C": {"addr": 101, "type": "float32", "word_order": "CDAB"}
            }
        }"#
    }

    #[test]
    fn loads_valid_map() {
        let map = RegisterMap::from_str(sample_json(), "test").unwrap();
        assert_eq!(map.get_blocks().len(), 1);
        assert!(map.point("ph").is_some());
    }

    #[test]
    fn rejects_point_outside_any_block() {
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [{"name": "A", "fn": 3, "start": 100, "len": 2}],
            "points": {"oob": {"addr": 500, "type": "u16"}}
        }"#;
        let err = RegisterMap::from_str(json, "test").unwrap_err();
        assert!(matches!(err, RegisterMapError::PointNotContained { .. }));
    }

    #[test]
    fn rejects_point_spanning_two_blocks() {
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [
                {"name": "A", "fn": 3, "start": 100, "len": 1},
                {"name": "B", "fn": 3, "start": 101, "len": 1}
            ],
            "points": {"straddles": {"addr": 100, "type": "u32"}}
        }"#;
        let err = RegisterMap::from_str(json, "test").unwrap_err();
        assert!(matches!(err, RegisterMapError::PointNotContained { .. }));
    }

    #[test]
    fn rejects_non_fc3_block() {
        let json = r#"{
            "schema_ver": 1, "byte_order": "BE", "word_order": "ABCD",
            "blocks": [{"name": "A", "fn": 4, "start": 0, "len": 1}],
            "points": {}
        }"#;
        let err = RegisterMap::from_str(json, "test").unwrap_err();
        assert!(matches!(err, RegisterMapError::UnsupportedFunction { .. }));
    }
}
