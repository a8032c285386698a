//! The read side of the container codec.
//!
//! [`ArchiveFile`] memory-maps an input file; [`BinaryReader`] parses a
//! `bplist00` byte slice into a [`Value`] tree.
//!
//! Structural object references (the refs that tie containers to their
//! elements) are inlined while parsing, so the returned tree contains nested
//! arrays and dictionaries directly. Only `UID` markers survive as
//! [`Value::Uid`]; those are the keyed-archive references the resolver
//! chases later. A corrupt container whose structural refs form a cycle is
//! rejected with a `Format` error rather than looping.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Result, UnkeyedError};
use crate::format::{
    be_uint, Trailer, KIND_ARRAY, KIND_ASCII, KIND_DATA, KIND_DATE, KIND_DICT, KIND_INT,
    KIND_REAL, KIND_SET, KIND_UID, KIND_UTF16, MAGIC_BYTES, MARKER_FALSE, MARKER_NULL,
    MARKER_TRUE, TRAILER_SIZE,
};
use crate::value::Value;

/// A memory-mapped input file.
#[derive(Debug)]
pub struct ArchiveFile {
    mmap: Mmap,
}

impl ArchiveFile {
    /// Opens and memory-maps a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the map is read-only and we accept the usual caveat that an
        // external writer mutating the file mid-read yields garbage input,
        // which the parser treats as a format error.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// The mapped file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

/// Parses binary property lists from a byte slice.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    trailer: Trailer,
    offsets: Vec<u64>,
}

impl<'a> BinaryReader<'a> {
    /// Validates the container framing and reads the offset table.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < MAGIC_BYTES.len() + TRAILER_SIZE || !data.starts_with(&MAGIC_BYTES) {
            return Err(UnkeyedError::Format("missing bplist00 magic".into()));
        }
        let trailer = Trailer::from_bytes(&data[data.len() - TRAILER_SIZE..])?;

        let entry_size = trailer.offset_int_size as usize;
        let table_start = trailer.offset_table_offset as usize;
        let table_len = (trailer.num_objects as usize)
            .checked_mul(entry_size)
            .ok_or_else(|| UnkeyedError::Format("offset table overflow".into()))?;
        let table_end = table_start
            .checked_add(table_len)
            .filter(|end| *end <= data.len() - TRAILER_SIZE)
            .ok_or_else(|| UnkeyedError::Format("offset table out of bounds".into()))?;

        let offsets = data[table_start..table_end]
            .chunks_exact(entry_size)
            .map(be_uint)
            .collect();

        Ok(Self {
            data,
            trailer,
            offsets,
        })
    }

    /// Convenience: parses a container and returns its top-level value.
    pub fn parse(data: &'a [u8]) -> Result<Value> {
        Self::new(data)?.top()
    }

    /// Returns the number of objects in the container.
    pub fn object_count(&self) -> u64 {
        self.trailer.num_objects
    }

    /// Parses the top-level value, inlining structural references.
    pub fn top(&self) -> Result<Value> {
        let mut path = Vec::new();
        self.object(self.trailer.top_object, &mut path)
    }

    fn object(&self, index: u64, path: &mut Vec<u64>) -> Result<Value> {
        if index >= self.trailer.num_objects {
            return Err(UnkeyedError::Format(format!(
                "object ref {index} out of range"
            )));
        }
        if path.contains(&index) {
            return Err(UnkeyedError::Format(format!(
                "structural reference cycle through object {index}"
            )));
        }
        let offset = self.offsets[index as usize] as usize;
        let marker = *self
            .data
            .get(offset)
            .ok_or_else(|| UnkeyedError::Format(format!("offset of object {index} out of bounds")))?;

        match marker {
            MARKER_NULL => return Ok(Value::Null),
            MARKER_FALSE => return Ok(Value::Bool(false)),
            MARKER_TRUE => return Ok(Value::Bool(true)),
            _ => {}
        }

        let kind = marker >> 4;
        let info = marker & 0x0F;
        let body = offset + 1;
        match kind {
            KIND_INT => self.parse_int(info, body),
            KIND_REAL => self.parse_real(info, body),
            KIND_DATE => {
                let bytes = self.bytes_at(body, 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Value::Date(f64::from_be_bytes(raw)))
            }
            KIND_DATA => {
                let (count, start) = self.count_at(info, body)?;
                Ok(Value::Bytes(self.bytes_at(start, count)?.to_vec()))
            }
            KIND_ASCII => {
                let (count, start) = self.count_at(info, body)?;
                let text = std::str::from_utf8(self.bytes_at(start, count)?)
                    .map_err(|e| UnkeyedError::Format(format!("bad ASCII string: {e}")))?;
                Ok(Value::Text(text.to_string()))
            }
            KIND_UTF16 => {
                let (count, start) = self.count_at(info, body)?;
                let bytes = self.bytes_at(start, count * 2)?;
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                let text = String::from_utf16(&units)
                    .map_err(|e| UnkeyedError::Format(format!("bad UTF-16 string: {e}")))?;
                Ok(Value::Text(text))
            }
            KIND_UID => {
                let width = info as usize + 1;
                if width > 8 {
                    return Err(UnkeyedError::Format(format!("UID of {width} bytes")));
                }
                Ok(Value::Uid(be_uint(self.bytes_at(body, width)?)))
            }
            KIND_ARRAY | KIND_SET => {
                let (count, start) = self.count_at(info, body)?;
                path.push(index);
                let result = self.parse_elements(count, start, path).map(Value::Array);
                path.pop();
                result
            }
            KIND_DICT => {
                let (count, start) = self.count_at(info, body)?;
                path.push(index);
                let result = self.parse_dict(count, start, path);
                path.pop();
                result
            }
            _ => Err(UnkeyedError::Format(format!(
                "unknown object marker 0x{marker:02x} at offset {offset}"
            ))),
        }
    }

    fn parse_int(&self, info: u8, body: usize) -> Result<Value> {
        let width = 1usize << info;
        let bytes = self.bytes_at(body, width)?;
        match width {
            1 | 2 | 4 => Ok(Value::Int(be_uint(bytes) as i64)),
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Value::Int(i64::from_be_bytes(raw)))
            }
            16 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(bytes);
                let wide = i128::from_be_bytes(raw);
                i64::try_from(wide).map(Value::Int).map_err(|_| {
                    UnkeyedError::Format(format!("integer {wide} does not fit in 64 bits"))
                })
            }
            _ => Err(UnkeyedError::Format(format!("integer of {width} bytes"))),
        }
    }

    fn parse_real(&self, info: u8, body: usize) -> Result<Value> {
        match info {
            2 => {
                let bytes = self.bytes_at(body, 4)?;
                let mut raw = [0u8; 4];
                raw.copy_from_slice(bytes);
                Ok(Value::Real(f64::from(f32::from_be_bytes(raw))))
            }
            3 => {
                let bytes = self.bytes_at(body, 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Value::Real(f64::from_be_bytes(raw)))
            }
            _ => Err(UnkeyedError::Format(format!("real with size nibble {info}"))),
        }
    }

    fn parse_elements(&self, count: usize, start: usize, path: &mut Vec<u64>) -> Result<Vec<Value>> {
        let ref_size = self.trailer.object_ref_size as usize;
        let refs = self.bytes_at(start, count * ref_size)?;
        refs.chunks_exact(ref_size)
            .map(|chunk| self.object(be_uint(chunk), path))
            .collect()
    }

    fn parse_dict(&self, count: usize, start: usize, path: &mut Vec<u64>) -> Result<Value> {
        let ref_size = self.trailer.object_ref_size as usize;
        let keys = self.parse_elements(count, start, path)?;
        let values = self.parse_elements(count, start + count * ref_size, path)?;
        Ok(Value::Dict(keys.into_iter().zip(values).collect()))
    }

    /// Reads an element count: either the marker's low nibble or, for counts
    /// of 15 and above, a trailing integer object. Returns the count and the
    /// offset just past it.
    fn count_at(&self, info: u8, pos: usize) -> Result<(usize, usize)> {
        if info != 0x0F {
            return Ok((info as usize, pos));
        }
        let marker = *self
            .data
            .get(pos)
            .ok_or_else(|| UnkeyedError::Format("truncated count".into()))?;
        if marker >> 4 != KIND_INT {
            return Err(UnkeyedError::Format(format!(
                "expected count integer, found marker 0x{marker:02x}"
            )));
        }
        let width = 1usize << (marker & 0x0F);
        if width > 8 {
            return Err(UnkeyedError::Format("count integer too wide".into()));
        }
        let count = be_uint(self.bytes_at(pos + 1, width)?) as usize;
        // A count can never exceed the file size; rejecting it here keeps the
        // later `count * width` arithmetic from overflowing.
        if count > self.data.len() {
            return Err(UnkeyedError::Format(format!(
                "count {count} exceeds container size"
            )));
        }
        Ok((count, pos + 1 + width))
    }

    fn bytes_at(&self, start: usize, len: usize) -> Result<&'a [u8]> {
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| UnkeyedError::Format("object data out of bounds".into()))
    }
}
