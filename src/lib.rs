//! # Unkeyed
//!
//! A converter for keyed-archive property lists (NSKeyedArchiver output,
//! such as `.sfl2` recent-item files) into plain, fully inlined property
//! lists that any conventional plist tool can read.
//!
//! ## Overview
//!
//! A keyed archive stores an object graph as a flat table of entries
//! (`$objects`) linked by integer references, with named entry points in a
//! `$top` dictionary. That layout is machine-friendly but useless to a
//! human reader: every interesting value hides behind one or more levels of
//! indirection. Unkeyed reconstructs the graph into a self-contained tree:
//!
//! 1. The **container codec** ([`reader`], [`writer`], [`xml`]) decodes the
//!    `bplist00` or XML container into a raw [`Value`] tree and an object
//!    table, and encodes the finished document back to disk.
//! 2. The **reference normalizer** ([`uid`]) rewrites the `{"CF$UID": n}`
//!    records of XML input into native references.
//! 3. The **class converter** ([`convert`]) unpacks entries archived by the
//!    common Foundation collection classes (parallel key/object arrays,
//!    wrapped strings, data and dates) into generic shapes.
//! 4. The **graph resolver** ([`resolver`]) walks each root, chasing
//!    references through the table until none are left, guarding against
//!    cycles and runaway depth.
//! 5. The **root assembler** ([`archive`]) merges the per-root trees into
//!    one document, isolating failures root by root.
//!
//! The output is a tree, not a graph: an entry referenced from several
//! places is duplicated, never aliased.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use unkeyed::{ConvertOptions, Unkeyed};
//!
//! let bytes = std::fs::read("recents.sfl2")?;
//! let conversion = Unkeyed::deserialize_slice(&bytes, &ConvertOptions::default())?;
//! for root in &conversion.roots {
//!     if let Some(error) = &root.error {
//!         eprintln!("root {} failed: {error}", root.name);
//!     }
//! }
//! println!("{}", serde_json::to_string_pretty(&conversion.document)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Safety and error handling
//!
//! * `unsafe` is used once, for memory-mapping the input file.
//! * No `unwrap()` or `panic!()` in the library (enforced by clippy lints).
//! * Malformed containers surface as [`UnkeyedError::Format`]; broken
//!   references fail only the root that contains them.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod api;
pub mod archive;
pub mod convert;
pub mod error;
pub mod format;
pub mod inspector;
pub mod reader;
pub mod resolver;
pub mod uid;
pub mod value;
pub mod writer;
pub mod xml;

pub use api::{default_output_path, ConvertOptions, Unkeyed};
pub use archive::{locate_roots, Conversion, KeyedArchive, RootOutcome, DEFAULT_ROOT};
pub use convert::{CommonObjects, Converter};
pub use error::{Result, UnkeyedError};
pub use inspector::{inspect, ArchiveReport};
pub use reader::{ArchiveFile, BinaryReader};
pub use resolver::{Diagnostic, ResolveOptions, Resolver};
pub use value::{Plain, Value, CLASS_KEY, PASSTHROUGH_KEY};
pub use writer::{encode_document, BinaryWriter};
