//! The write side of the container codec.
//!
//! Encodes a value tree back into a `bplist00` container. The tree is first
//! flattened into an object list (parents before children, root at object 0),
//! then each object is serialized and the offset table and trailer appended.
//!
//! Two strictness levels exist. The strict encoder mirrors the common
//! behavior of plist writers and rejects bare null values with an
//! [`UnkeyedError::Encode`]; the lenient encoder emits the null marker the
//! binary format has always had. [`encode_document`] tries strict first and
//! falls back to lenient once.

use tracing::warn;

use crate::error::{Result, UnkeyedError};
use crate::format::{
    min_width, push_be, Trailer, KIND_ARRAY, KIND_ASCII, KIND_DATA, KIND_DATE, KIND_DICT,
    KIND_INT, KIND_REAL, KIND_UID, KIND_UTF16, MAGIC_BYTES, MARKER_FALSE, MARKER_NULL,
    MARKER_TRUE,
};
use crate::value::{Plain, Value};

/// Encodes value trees as binary property lists.
#[derive(Debug, Clone, Copy)]
pub struct BinaryWriter {
    lenient: bool,
}

/// One flattened object awaiting serialization.
enum Flat<'a> {
    Leaf(&'a Value),
    Array(Vec<u64>),
    Dict(Vec<(u64, u64)>),
}

impl BinaryWriter {
    /// A writer that rejects null values with an encode error.
    pub fn strict() -> Self {
        Self { lenient: false }
    }

    /// A writer that emits the null marker for null values.
    pub fn lenient() -> Self {
        Self { lenient: true }
    }

    /// Encodes a raw value tree into container bytes.
    pub fn encode(&self, root: &Value) -> Result<Vec<u8>> {
        let mut objects = Vec::new();
        self.flatten(root, &mut objects)?;

        let ref_size = min_width(objects.len() as u64);
        let mut buf = Vec::from(MAGIC_BYTES);
        let mut offsets = Vec::with_capacity(objects.len());
        for object in &objects {
            offsets.push(buf.len() as u64);
            self.serialize(object, ref_size, &mut buf)?;
        }

        let offset_table_offset = buf.len() as u64;
        let offset_int_size = min_width(offset_table_offset);
        for offset in &offsets {
            push_be(&mut buf, *offset, offset_int_size);
        }

        let trailer = Trailer {
            offset_int_size,
            object_ref_size: ref_size,
            num_objects: objects.len() as u64,
            top_object: 0,
            offset_table_offset,
        };
        buf.extend_from_slice(&trailer.to_bytes());
        Ok(buf)
    }

    /// Assigns object numbers in pre-order; the root always lands at 0.
    fn flatten<'a>(&self, value: &'a Value, out: &mut Vec<Flat<'a>>) -> Result<u64> {
        let id = out.len() as u64;
        match value {
            Value::Null if !self.lenient => {
                return Err(UnkeyedError::Encode(
                    "null value has no strict plist encoding".into(),
                ))
            }
            Value::Array(items) => {
                out.push(Flat::Array(Vec::new()));
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    ids.push(self.flatten(item, out)?);
                }
                out[id as usize] = Flat::Array(ids);
            }
            Value::Dict(entries) => {
                out.push(Flat::Dict(Vec::new()));
                let mut ids = Vec::with_capacity(entries.len());
                for (key, val) in entries {
                    let key_id = self.flatten(key, out)?;
                    let val_id = self.flatten(val, out)?;
                    ids.push((key_id, val_id));
                }
                out[id as usize] = Flat::Dict(ids);
            }
            leaf => out.push(Flat::Leaf(leaf)),
        }
        Ok(id)
    }

    fn serialize(&self, object: &Flat<'_>, ref_size: u8, buf: &mut Vec<u8>) -> Result<()> {
        match object {
            Flat::Leaf(Value::Null) => buf.push(MARKER_NULL),
            Flat::Leaf(Value::Bool(false)) => buf.push(MARKER_FALSE),
            Flat::Leaf(Value::Bool(true)) => buf.push(MARKER_TRUE),
            Flat::Leaf(Value::Int(n)) => push_int(buf, *n),
            Flat::Leaf(Value::Real(r)) => {
                buf.push(KIND_REAL << 4 | 3);
                buf.extend_from_slice(&r.to_be_bytes());
            }
            Flat::Leaf(Value::Date(d)) => {
                buf.push(KIND_DATE << 4 | 3);
                buf.extend_from_slice(&d.to_be_bytes());
            }
            Flat::Leaf(Value::Text(s)) => push_text(buf, s),
            Flat::Leaf(Value::Bytes(b)) => {
                push_marker(buf, KIND_DATA, b.len());
                buf.extend_from_slice(b);
            }
            Flat::Leaf(Value::Uid(n)) => {
                let width = min_width(*n);
                buf.push(KIND_UID << 4 | (width - 1));
                push_be(buf, *n, width);
            }
            Flat::Leaf(Value::Array(_) | Value::Dict(_)) => {
                // Containers are flattened before serialization.
                return Err(UnkeyedError::Encode("unflattened container".into()));
            }
            Flat::Array(ids) => {
                push_marker(buf, KIND_ARRAY, ids.len());
                for id in ids {
                    push_be(buf, *id, ref_size);
                }
            }
            Flat::Dict(ids) => {
                push_marker(buf, KIND_DICT, ids.len());
                for (key_id, _) in ids {
                    push_be(buf, *key_id, ref_size);
                }
                for (_, val_id) in ids {
                    push_be(buf, *val_id, ref_size);
                }
            }
        }
        Ok(())
    }
}

/// Encodes a resolved document, falling back to the lenient encoder when the
/// strict one rejects it.
pub fn encode_document(root: &Plain) -> Result<Vec<u8>> {
    let raw = Value::from(root);
    match BinaryWriter::strict().encode(&raw) {
        Ok(bytes) => Ok(bytes),
        Err(UnkeyedError::Encode(reason)) => {
            warn!(%reason, "strict encoder rejected the document, retrying lenient");
            BinaryWriter::lenient().encode(&raw)
        }
        Err(other) => Err(other),
    }
}

/// Writes a marker byte, spilling counts of 15 and above into an integer
/// object.
fn push_marker(buf: &mut Vec<u8>, kind: u8, count: usize) {
    if count < 0x0F {
        buf.push(kind << 4 | count as u8);
    } else {
        buf.push(kind << 4 | 0x0F);
        push_int(buf, count as i64);
    }
}

fn push_int(buf: &mut Vec<u8>, value: i64) {
    if value < 0 {
        buf.push(KIND_INT << 4 | 3);
        buf.extend_from_slice(&value.to_be_bytes());
        return;
    }
    let width = min_width(value as u64);
    // Size nibble is the exponent: 2^n bytes.
    buf.push(KIND_INT << 4 | width.trailing_zeros() as u8);
    push_be(buf, value as u64, width);
}

fn push_text(buf: &mut Vec<u8>, text: &str) {
    if text.is_ascii() {
        push_marker(buf, KIND_ASCII, text.len());
        buf.extend_from_slice(text.as_bytes());
    } else {
        let units: Vec<u16> = text.encode_utf16().collect();
        push_marker(buf, KIND_UTF16, units.len());
        for unit in units {
            buf.extend_from_slice(&unit.to_be_bytes());
        }
    }
}
