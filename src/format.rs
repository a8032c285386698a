//! The physical layout of binary property list containers.
//!
//! # Layout
//! A `bplist00` file is:
//!
//! `[Magic "bplist00"] [Object 0] ... [Object N-1] [Offset Table] [Trailer]`
//!
//! Every object starts with a marker byte: the high nibble selects the kind,
//! the low nibble carries either an immediate payload (booleans), a size
//! exponent (ints, reals) or an element count. Counts of 15 and above are
//! followed by an integer object holding the real count.
//!
//! Containers (arrays, sets, dictionaries) store their elements as object
//! numbers of [`Trailer::object_ref_size`] bytes each. The offset table maps
//! object numbers to absolute file offsets.

use crate::error::{Result, UnkeyedError};

/// Magic bytes identifying the binary container: "bplist00".
pub const MAGIC_BYTES: [u8; 8] = *b"bplist00";

/// The fixed size of the trailer at the end of the file.
pub const TRAILER_SIZE: usize = 32;

/// Marker byte for the null object.
pub const MARKER_NULL: u8 = 0x00;
/// Marker byte for boolean false.
pub const MARKER_FALSE: u8 = 0x08;
/// Marker byte for boolean true.
pub const MARKER_TRUE: u8 = 0x09;

/// High nibble: integer, `2^info` bytes, big endian.
pub const KIND_INT: u8 = 0x1;
/// High nibble: float, `2^info` bytes, big endian.
pub const KIND_REAL: u8 = 0x2;
/// High nibble: date, 8-byte float of Apple-epoch seconds.
pub const KIND_DATE: u8 = 0x3;
/// High nibble: raw data, `count` bytes.
pub const KIND_DATA: u8 = 0x4;
/// High nibble: ASCII string, `count` bytes.
pub const KIND_ASCII: u8 = 0x5;
/// High nibble: UTF-16BE string, `count` code units.
pub const KIND_UTF16: u8 = 0x6;
/// High nibble: keyed-archive reference, `info + 1` bytes, big endian.
pub const KIND_UID: u8 = 0x8;
/// High nibble: array of `count` object refs.
pub const KIND_ARRAY: u8 = 0xA;
/// High nibble: set, laid out like an array.
pub const KIND_SET: u8 = 0xC;
/// High nibble: dictionary, `count` key refs then `count` value refs.
pub const KIND_DICT: u8 = 0xD;

/// The trailer at the very end of the file.
///
/// `Sort version(1, after 5 unused bytes) + OffsetIntSize(1) + ObjectRefSize(1)
/// + NumObjects(8) + TopObject(8) + OffsetTableOffset(8)`, all big endian.
#[derive(Debug, Clone, Copy)]
pub struct Trailer {
    /// Byte width of each offset table entry.
    pub offset_int_size: u8,
    /// Byte width of each object reference inside containers.
    pub object_ref_size: u8,
    /// Number of objects in the file.
    pub num_objects: u64,
    /// Object number of the top-level value.
    pub top_object: u64,
    /// Absolute offset of the offset table.
    pub offset_table_offset: u64,
}

impl Trailer {
    /// Parses the trailer from its 32-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TRAILER_SIZE {
            return Err(UnkeyedError::Format("buffer too small for trailer".into()));
        }
        let trailer = Self {
            offset_int_size: bytes[6],
            object_ref_size: bytes[7],
            num_objects: be_uint(&bytes[8..16]),
            top_object: be_uint(&bytes[16..24]),
            offset_table_offset: be_uint(&bytes[24..32]),
        };
        if !(1..=8).contains(&trailer.offset_int_size)
            || !(1..=8).contains(&trailer.object_ref_size)
        {
            return Err(UnkeyedError::Format(format!(
                "implausible trailer widths: offset={} ref={}",
                trailer.offset_int_size, trailer.object_ref_size
            )));
        }
        Ok(trailer)
    }

    /// Serializes the trailer to its 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[6] = self.offset_int_size;
        buf[7] = self.object_ref_size;
        buf[8..16].copy_from_slice(&self.num_objects.to_be_bytes());
        buf[16..24].copy_from_slice(&self.top_object.to_be_bytes());
        buf[24..32].copy_from_slice(&self.offset_table_offset.to_be_bytes());
        buf
    }
}

/// Reads a big-endian unsigned integer of 1 to 8 bytes.
pub(crate) fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Appends `value` as a big-endian integer of exactly `width` bytes.
pub(crate) fn push_be(buf: &mut Vec<u8>, value: u64, width: u8) {
    let bytes = value.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - width as usize..]);
}

/// The smallest power-of-two-ish width (1, 2, 4 or 8 bytes) that holds `value`.
pub(crate) fn min_width(value: u64) -> u8 {
    if value <= 0xFF {
        1
    } else if value <= 0xFFFF {
        2
    } else if value <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}
