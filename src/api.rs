//! The high-level conversion entry points.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::{Conversion, KeyedArchive};
use crate::convert::CommonObjects;
use crate::error::{Result, UnkeyedError};
use crate::format::MAGIC_BYTES;
use crate::reader::{ArchiveFile, BinaryReader};
use crate::resolver::ResolveOptions;
use crate::value::Value;
use crate::{uid, writer, xml};

/// How many times a nested data blob is unwrapped before giving up.
/// Archives wrapped in a single data payload occur in the wild; archives
/// wrapped twice are already pathological.
const MAX_BLOB_HOPS: usize = 3;

/// Options for a conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Resolver tunables.
    pub resolve: ResolveOptions,
}

/// The main entry point for converting keyed archives.
#[derive(Debug)]
pub struct Unkeyed;

impl Unkeyed {
    /// Decodes input bytes into the top-level value.
    ///
    /// Accepts binary (`bplist00`) and XML containers; XML input is run
    /// through reference normalization. An archive delivered as one
    /// embedded data blob is unwrapped and re-parsed.
    pub fn load_value(bytes: &[u8]) -> Result<Value> {
        let mut value = parse_container(bytes)?;
        let mut hops = 0;
        loop {
            match value {
                Value::Bytes(inner) => {
                    hops += 1;
                    if hops >= MAX_BLOB_HOPS {
                        return Err(UnkeyedError::Format(
                            "data blobs nested too deeply".into(),
                        ));
                    }
                    debug!("unwrapping embedded data blob");
                    value = parse_container(&inner)?;
                }
                other => return Ok(other),
            }
        }
    }

    /// Converts archive bytes into a resolved document with per-root
    /// reporting.
    pub fn deserialize_slice(bytes: &[u8], options: &ConvertOptions) -> Result<Conversion> {
        let top = Self::load_value(bytes)?;
        let archive = KeyedArchive::from_value(&top)?;
        Ok(archive.resolve_all(&CommonObjects, &options.resolve))
    }

    /// Converts an archive file and writes the resolved document as a
    /// binary property list.
    pub fn convert_file(input: &Path, output: &Path, options: &ConvertOptions) -> Result<Conversion> {
        info!(input = %input.display(), "reading archive");
        let file = ArchiveFile::open(input)?;
        let conversion = Self::deserialize_slice(file.bytes(), options)?;
        let bytes = writer::encode_document(&conversion.document)?;
        info!(output = %output.display(), "writing resolved document");
        std::fs::write(output, bytes)?;
        Ok(conversion)
    }
}

fn parse_container(bytes: &[u8]) -> Result<Value> {
    if bytes.starts_with(&MAGIC_BYTES) {
        return BinaryReader::parse(bytes);
    }
    if xml::is_xml(bytes) {
        let mut value = xml::parse(bytes)?;
        uid::normalize(&mut value);
        return Ok(value);
    }
    Err(UnkeyedError::Format(
        "input is neither a binary nor an XML property list".into(),
    ))
}

/// The conventional output path: `<input>_deserialized.plist`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push("_deserialized.plist");
    PathBuf::from(name)
}
