//! The graph resolution engine.
//!
//! A keyed archive is a flat object table whose entries point at each other
//! through integer references. [`Resolver::resolve_root`] walks one entry
//! point of that graph and produces a self-contained [`Plain`] tree with
//! every reference replaced by the value it points at.
//!
//! Resolution is defensive on two axes:
//!
//! - a per-root visited set rejects reference cycles
//!   ([`UnkeyedError::CyclicReference`]), which would otherwise recurse
//!   forever;
//! - a depth ceiling derived from the table size rejects degenerate acyclic
//!   chains ([`UnkeyedError::RecursionLimit`]) before they exhaust the call
//!   stack.
//!
//! Two normalizations are applied so the result is writable by conventional
//! plist encoders, and both are surfaced as [`Diagnostic`]s rather than
//! errors: null map values become empty text (except under
//! [`PASSTHROUGH_KEY`]), and non-text dictionary keys are rendered as text.
//!
//! The resolver never mutates the table, so independent roots can resolve
//! concurrently against the same table as long as each gets its own visited
//! set.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::convert::Converter;
use crate::error::{Result, UnkeyedError};
use crate::value::{Plain, Value, CLASS_KEY, PASSTHROUGH_KEY};

/// Tunables for graph resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Hard ceiling on resolution depth. `0` derives the ceiling from the
    /// object table size.
    pub max_depth: usize,
}

/// A non-fatal normalization observed while resolving a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A null map value was stored as empty text under `key`.
    NullCoerced {
        /// The dictionary key the null was stored under.
        key: String,
    },
    /// A non-text dictionary key was rendered as text.
    KeyCoerced {
        /// The textual rendering now used as the key.
        rendered: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullCoerced { key } => {
                write!(f, "null value stored as empty text for key {key:?}")
            }
            Self::KeyCoerced { rendered } => {
                write!(f, "non-text dictionary key rendered as {rendered:?}")
            }
        }
    }
}

/// Walks raw values against an object table, inlining every reference.
#[derive(Debug)]
pub struct Resolver<'a> {
    table: &'a [Value],
    converter: &'a dyn Converter,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over `table` using `converter` for class-tagged
    /// entries.
    pub fn new(table: &'a [Value], converter: &'a dyn Converter, options: &ResolveOptions) -> Self {
        let max_depth = if options.max_depth == 0 {
            // Every level of legitimate nesting consumes at least one table
            // entry, so the table size bounds the depth of any acyclic walk.
            table.len() + 64
        } else {
            options.max_depth
        };
        Self {
            table,
            converter,
            max_depth,
        }
    }

    /// Resolves one root value with a fresh visited set.
    ///
    /// The error, if any, covers this root only; diagnostics are returned
    /// even for failed roots.
    pub fn resolve_root(&self, value: &Value) -> (Result<Plain>, Vec<Diagnostic>) {
        let mut visited = HashSet::new();
        let mut diagnostics = Vec::new();
        let result = self.resolve(value, 0, &mut visited, &mut diagnostics);
        (result, diagnostics)
    }

    fn resolve(
        &self,
        value: &Value,
        depth: usize,
        visited: &mut HashSet<u64>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Plain> {
        if depth > self.max_depth {
            return Err(UnkeyedError::RecursionLimit(self.max_depth));
        }
        match value {
            Value::Null => Ok(Plain::Null),
            Value::Bool(b) => Ok(Plain::Bool(*b)),
            Value::Int(n) => Ok(Plain::Int(*n)),
            Value::Real(r) => Ok(Plain::Real(*r)),
            Value::Date(d) => Ok(Plain::Date(*d)),
            Value::Text(s) => Ok(Plain::Text(s.clone())),
            Value::Bytes(b) => Ok(Plain::Bytes(b.clone())),
            Value::Uid(index) => {
                let entry = self
                    .table
                    .get(*index as usize)
                    .ok_or(UnkeyedError::UnresolvedReference { index: *index })?;
                if !visited.insert(*index) {
                    return Err(UnkeyedError::CyclicReference { index: *index });
                }
                let converted = self.converter.convert(entry, self.table)?;
                let resolved = self.resolve(&converted, depth + 1, visited, diagnostics);
                // The entry may be referenced again from a sibling branch,
                // just not from within its own subtree.
                visited.remove(index);
                resolved
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let resolved = self.resolve(item, depth + 1, visited, diagnostics)?;
                    out.push(coerce_null(resolved, None, diagnostics));
                }
                Ok(Plain::Array(out))
            }
            Value::Dict(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, val) in entries {
                    if key.as_text() == Some(CLASS_KEY) {
                        continue;
                    }
                    let key = match self.resolve(key, depth + 1, visited, diagnostics)? {
                        Plain::Text(text) => text,
                        other => {
                            let rendered = other.render_text();
                            debug!(key = %rendered, "non-text dictionary key rendered as text");
                            diagnostics.push(Diagnostic::KeyCoerced {
                                rendered: rendered.clone(),
                            });
                            rendered
                        }
                    };
                    let resolved = self.resolve(val, depth + 1, visited, diagnostics)?;
                    let resolved = coerce_null(resolved, Some(&key), diagnostics);
                    out.push((key, resolved));
                }
                Ok(Plain::Dict(out))
            }
        }
    }
}

/// Replaces a null about to be stored in a container with empty text.
///
/// The one exemption is [`PASSTHROUGH_KEY`]: strict plist encoders tolerate
/// null there as the omitted-base-class sentinel, and rewriting it would
/// change the archive's meaning.
fn coerce_null(value: Plain, key: Option<&str>, diagnostics: &mut Vec<Diagnostic>) -> Plain {
    if !matches!(value, Plain::Null) {
        return value;
    }
    if key == Some(PASSTHROUGH_KEY) {
        return value;
    }
    if let Some(key) = key {
        debug!(key, "null value stored as empty text");
        diagnostics.push(Diagnostic::NullCoerced {
            key: key.to_string(),
        });
    }
    Plain::Text(String::new())
}
