// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Thrift binary protocol reader and writer.
//!
//! Replication messages travel through the log as Thrift binary structs.
//! This module decodes them into a generic [`WireStruct`] tree, which
//! [`crate::message`] then maps onto typed messages. Unknown fields survive
//! as wire values so they can be re-encoded unchanged.
//!
//! # Encoding
//!
//! ```text
//! struct   := field* STOP
//! field    := type:u8 id:i16be value
//! binary   := len:i32be bytes
//! list/set := elem_type:u8 size:i32be value*
//! map      := key_type:u8 value_type:u8 size:i32be (key value)*
//! ```
//!
//! All lengths are checked against the remaining input before allocating, so
//! corrupted length prefixes fail fast instead of reserving gigabytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nesting limit for structs and containers.
const MAX_DEPTH: usize = 64;

/// Wire-level decode failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of input at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("invalid type id {type_id} at offset {offset}")]
    InvalidType { type_id: u8, offset: usize },

    #[error("negative length {length} at offset {offset}")]
    NegativeLength { length: i32, offset: usize },

    #[error("nesting too deep")]
    DepthExceeded,

    #[error("field {field} of {container}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        container: &'static str,
        field: i16,
        expected: WireType,
        actual: WireType,
    },

    #[error("unknown {name} enum value {value}")]
    InvalidEnum { name: &'static str, value: i32 },

    #[error("field {field} of {container} is not valid UTF-8")]
    InvalidUtf8 { container: &'static str, field: i16 },

    #[error("unexpected preamble byte {found:#04x}")]
    InvalidPreamble { found: u8 },
}

/// Thrift wire type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    Bool,
    I8,
    Double,
    I16,
    I32,
    I64,
    Binary,
    Struct,
    Map,
    Set,
    List,
}

impl WireType {
    const STOP: u8 = 0;

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(WireType::Bool),
            3 => Some(WireType::I8),
            4 => Some(WireType::Double),
            6 => Some(WireType::I16),
            8 => Some(WireType::I32),
            10 => Some(WireType::I64),
            11 => Some(WireType::Binary),
            12 => Some(WireType::Struct),
            13 => Some(WireType::Map),
            14 => Some(WireType::Set),
            15 => Some(WireType::List),
            _ => None,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WireType::Bool => 2,
            WireType::I8 => 3,
            WireType::Double => 4,
            WireType::I16 => 6,
            WireType::I32 => 8,
            WireType::I64 => 10,
            WireType::Binary => 11,
            WireType::Struct => 12,
            WireType::Map => 13,
            WireType::Set => 14,
            WireType::List => 15,
        }
    }

    /// Smallest possible encoded size, used to bound container sizes.
    fn min_size(self) -> usize {
        match self {
            WireType::Bool | WireType::I8 => 1,
            WireType::I16 => 2,
            WireType::I32 | WireType::Binary => 4,
            WireType::Double | WireType::I64 => 8,
            WireType::Struct => 1,
            WireType::Map => 6,
            WireType::Set | WireType::List => 5,
        }
    }
}

/// A decoded Thrift value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireValue {
    Bool(bool),
    I8(i8),
    Double(f64),
    I16(i16),
    I32(i32),
    I64(i64),
    Binary(#[serde(with = "crate::message::base64_bytes")] Vec<u8>),
    Struct(WireStruct),
    Map {
        key_type: WireType,
        value_type: WireType,
        entries: Vec<(WireValue, WireValue)>,
    },
    Set {
        elem_type: WireType,
        items: Vec<WireValue>,
    },
    List {
        elem_type: WireType,
        items: Vec<WireValue>,
    },
}

impl WireValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Bool(_) => WireType::Bool,
            WireValue::I8(_) => WireType::I8,
            WireValue::Double(_) => WireType::Double,
            WireValue::I16(_) => WireType::I16,
            WireValue::I32(_) => WireType::I32,
            WireValue::I64(_) => WireType::I64,
            WireValue::Binary(_) => WireType::Binary,
            WireValue::Struct(_) => WireType::Struct,
            WireValue::Map { .. } => WireType::Map,
            WireValue::Set { .. } => WireType::Set,
            WireValue::List { .. } => WireType::List,
        }
    }

    /// Natural JSON rendering for opaque values (binary as UTF-8 when
    /// possible, struct fields keyed by id).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            WireValue::Bool(b) => Value::Bool(*b),
            WireValue::I8(v) => Value::from(*v),
            WireValue::Double(v) => Value::from(*v),
            WireValue::I16(v) => Value::from(*v),
            WireValue::I32(v) => Value::from(*v),
            WireValue::I64(v) => Value::from(*v),
            WireValue::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => Value::String(crate::message::base64_bytes::encode(bytes)),
            },
            WireValue::Struct(s) => s.to_json(),
            WireValue::Map { entries, .. } => Value::Array(
                entries
                    .iter()
                    .map(|(k, v)| Value::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
            WireValue::Set { items, .. } | WireValue::List { items, .. } => {
                Value::Array(items.iter().map(WireValue::to_json).collect())
            }
        }
    }
}

/// One struct field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireField {
    pub id: i16,
    pub value: WireValue,
}

/// A struct as an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireStruct {
    pub fields: Vec<WireField>,
}

impl WireStruct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn with(mut self, id: i16, value: WireValue) -> Self {
        self.fields.push(WireField { id, value });
        self
    }

    /// Append a field only when the value is present.
    pub fn with_opt(self, id: i16, value: Option<WireValue>) -> Self {
        match value {
            Some(v) => self.with(id, v),
            None => self,
        }
    }

    /// Last value for a field id (Thrift semantics: later duplicates win).
    pub fn get(&self, id: i16) -> Option<&WireValue> {
        self.fields.iter().rev().find(|f| f.id == id).map(|f| &f.value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|f| (f.id.to_string(), f.value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Decode one struct from the start of `buf`, returning it and the number of
/// bytes it occupied. Trailing bytes are left alone.
pub fn decode_struct(buf: &[u8]) -> Result<(WireStruct, usize), WireError> {
    let mut reader = WireReader::new(buf);
    let value = reader.read_struct(0)?;
    Ok((value, reader.pos))
}

/// Measure the encoded length of the struct at the start of `buf` without
/// building it.
pub fn struct_len(buf: &[u8]) -> Result<usize, WireError> {
    let mut reader = WireReader::new(buf);
    reader.skip(WireType::Struct, 0)?;
    Ok(reader.pos)
}

/// Encode a struct.
pub fn encode_struct(value: &WireStruct) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_struct(&mut out, value);
    out
}

struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(WireError::UnexpectedEof {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn read_i16(&mut self) -> Result<i16, WireError> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i32(&mut self) -> Result<i32, WireError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, WireError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(i64::from_be_bytes(arr))
    }

    fn read_type(&mut self) -> Result<WireType, WireError> {
        let offset = self.pos;
        let type_id = self.read_u8()?;
        WireType::from_u8(type_id).ok_or(WireError::InvalidType { type_id, offset })
    }

    /// Read a container size and check it can fit in the remaining input.
    fn read_size(&mut self, min_elem: usize) -> Result<usize, WireError> {
        let offset = self.pos;
        let length = self.read_i32()?;
        if length < 0 {
            return Err(WireError::NegativeLength { length, offset });
        }
        let size = length as usize;
        let remaining = self.buf.len() - self.pos;
        let needed = size.saturating_mul(min_elem);
        if needed > remaining {
            return Err(WireError::UnexpectedEof {
                offset: self.pos,
                needed: needed - remaining,
            });
        }
        Ok(size)
    }

    fn read_struct(&mut self, depth: usize) -> Result<WireStruct, WireError> {
        if depth > MAX_DEPTH {
            return Err(WireError::DepthExceeded);
        }
        let mut out = WireStruct::new();
        loop {
            let offset = self.pos;
            let type_id = self.read_u8()?;
            if type_id == WireType::STOP {
                return Ok(out);
            }
            let ty = WireType::from_u8(type_id).ok_or(WireError::InvalidType { type_id, offset })?;
            let id = self.read_i16()?;
            let value = self.read_value(ty, depth + 1)?;
            out.fields.push(WireField { id, value });
        }
    }

    fn read_value(&mut self, ty: WireType, depth: usize) -> Result<WireValue, WireError> {
        if depth > MAX_DEPTH {
            return Err(WireError::DepthExceeded);
        }
        Ok(match ty {
            WireType::Bool => WireValue::Bool(self.read_u8()? != 0),
            WireType::I8 => WireValue::I8(self.read_u8()? as i8),
            WireType::Double => WireValue::Double(f64::from_bits(self.read_i64()? as u64)),
            WireType::I16 => WireValue::I16(self.read_i16()?),
            WireType::I32 => WireValue::I32(self.read_i32()?),
            WireType::I64 => WireValue::I64(self.read_i64()?),
            WireType::Binary => {
                let len = self.read_size(1)?;
                WireValue::Binary(self.take(len)?.to_vec())
            }
            WireType::Struct => WireValue::Struct(self.read_struct(depth)?),
            WireType::Map => {
                let key_type = self.read_type()?;
                let value_type = self.read_type()?;
                let size = self.read_size(key_type.min_size() + value_type.min_size())?;
                let mut entries = Vec::with_capacity(size);
                for _ in 0..size {
                    let k = self.read_value(key_type, depth + 1)?;
                    let v = self.read_value(value_type, depth + 1)?;
                    entries.push((k, v));
                }
                WireValue::Map {
                    key_type,
                    value_type,
                    entries,
                }
            }
            WireType::Set | WireType::List => {
                let elem_type = self.read_type()?;
                let size = self.read_size(elem_type.min_size())?;
                let mut items = Vec::with_capacity(size);
                for _ in 0..size {
                    items.push(self.read_value(elem_type, depth + 1)?);
                }
                if ty == WireType::Set {
                    WireValue::Set { elem_type, items }
                } else {
                    WireValue::List { elem_type, items }
                }
            }
        })
    }

    fn skip(&mut self, ty: WireType, depth: usize) -> Result<(), WireError> {
        if depth > MAX_DEPTH {
            return Err(WireError::DepthExceeded);
        }
        match ty {
            WireType::Bool | WireType::I8 => self.take(1).map(|_| ()),
            WireType::I16 => self.take(2).map(|_| ()),
            WireType::I32 => self.take(4).map(|_| ()),
            WireType::Double | WireType::I64 => self.take(8).map(|_| ()),
            WireType::Binary => {
                let len = self.read_size(1)?;
                self.take(len).map(|_| ())
            }
            WireType::Struct => loop {
                let offset = self.pos;
                let type_id = self.read_u8()?;
                if type_id == WireType::STOP {
                    return Ok(());
                }
                let field_ty =
                    WireType::from_u8(type_id).ok_or(WireError::InvalidType { type_id, offset })?;
                self.read_i16()?;
                self.skip(field_ty, depth + 1)?;
            },
            WireType::Map => {
                let key_type = self.read_type()?;
                let value_type = self.read_type()?;
                let size = self.read_size(key_type.min_size() + value_type.min_size())?;
                for _ in 0..size {
                    self.skip(key_type, depth + 1)?;
                    self.skip(value_type, depth + 1)?;
                }
                Ok(())
            }
            WireType::Set | WireType::List => {
                let elem_type = self.read_type()?;
                let size = self.read_size(elem_type.min_size())?;
                for _ in 0..size {
                    self.skip(elem_type, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

fn write_struct(out: &mut Vec<u8>, value: &WireStruct) {
    for field in &value.fields {
        out.push(field.value.wire_type().as_u8());
        out.extend_from_slice(&field.id.to_be_bytes());
        write_value(out, &field.value);
    }
    out.push(WireType::STOP);
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    // Thrift sizes are i32; larger values cannot be represented on the wire.
    let len = i32::try_from(len).unwrap_or(i32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
}

fn write_value(out: &mut Vec<u8>, value: &WireValue) {
    match value {
        WireValue::Bool(b) => out.push(u8::from(*b)),
        WireValue::I8(v) => out.push(*v as u8),
        WireValue::Double(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        WireValue::I16(v) => out.extend_from_slice(&v.to_be_bytes()),
        WireValue::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
        WireValue::I64(v) => out.extend_from_slice(&v.to_be_bytes()),
        WireValue::Binary(bytes) => {
            write_len(out, bytes.len());
            out.extend_from_slice(bytes);
        }
        WireValue::Struct(s) => write_struct(out, s),
        WireValue::Map {
            key_type,
            value_type,
            entries,
        } => {
            out.push(key_type.as_u8());
            out.push(value_type.as_u8());
            write_len(out, entries.len());
            for (k, v) in entries {
                write_value(out, k);
                write_value(out, v);
            }
        }
        WireValue::Set { elem_type, items } | WireValue::List { elem_type, items } => {
            out.push(elem_type.as_u8());
            write_len(out, items.len());
            for item in items {
                write_value(out, item);
            }
        }
    }
}
