//! Keyed-archive structure: root location and multi-root assembly.
//!
//! A keyed archive is a property list whose top level carries two
//! distinguished entries: `$objects`, the flat object table, and `$top`, a
//! dictionary mapping root names to references into that table. The
//! conventional single root is named `root`; some archives expose several.
//!
//! [`KeyedArchive::resolve_all`] resolves every root independently. One
//! root failing (an out-of-range or cyclic reference) does not abort the
//! others; the failed root contributes an explicit failure marker to the
//! document and its error is reported in the per-root outcome.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::convert::Converter;
use crate::error::{Result, UnkeyedError};
use crate::resolver::{Diagnostic, ResolveOptions, Resolver};
use crate::value::{Plain, Value};

/// The conventional name of a single-root archive's entry point.
pub const DEFAULT_ROOT: &str = "root";

/// Extracts the ordered root map from a decoded top-level value.
///
/// Returns an empty list when the `$top` entry is absent; the caller
/// decides whether that is fatal.
pub fn locate_roots(top: &Value) -> Vec<(String, Value)> {
    match top.get("$top") {
        Some(Value::Dict(entries)) => entries
            .iter()
            .filter_map(|(key, val)| key.as_text().map(|name| (name.to_string(), val.clone())))
            .collect(),
        _ => Vec::new(),
    }
}

/// A decoded keyed archive: the object table plus its named roots.
#[derive(Debug)]
pub struct KeyedArchive {
    objects: Vec<Value>,
    roots: Vec<(String, Value)>,
    archiver: Option<String>,
    version: Option<i64>,
}

/// The per-root report of a conversion.
#[derive(Debug)]
pub struct RootOutcome {
    /// The root's name as discovered in `$top`.
    pub name: String,
    /// The resolution failure, if this root failed.
    pub error: Option<UnkeyedError>,
    /// Normalizations observed while resolving this root.
    pub diagnostics: Vec<Diagnostic>,
}

/// The assembled document plus per-root reporting.
#[derive(Debug)]
pub struct Conversion {
    /// The final reference-free document.
    pub document: Plain,
    /// One outcome per root, in discovery order.
    pub roots: Vec<RootOutcome>,
}

impl Conversion {
    /// True when every root resolved without error.
    pub fn is_clean(&self) -> bool {
        self.roots.iter().all(|root| root.error.is_none())
    }
}

impl KeyedArchive {
    /// Interprets a decoded top-level value as a keyed archive.
    ///
    /// Fails with [`UnkeyedError::NotAnArchive`] when the `$top` or
    /// `$objects` entries are missing; an empty `$top` is accepted and
    /// yields an empty document later.
    pub fn from_value(top: &Value) -> Result<Self> {
        let Some(Value::Array(objects)) = top.get("$objects") else {
            return Err(UnkeyedError::NotAnArchive);
        };
        if top.get("$top").is_none() {
            return Err(UnkeyedError::NotAnArchive);
        }
        let roots = locate_roots(top);
        if roots.is_empty() {
            warn!("$top carries no roots; the document will be empty");
        }
        let archiver = top
            .get("$archiver")
            .and_then(Value::as_text)
            .map(str::to_string);
        if let Some(name) = archiver.as_deref() {
            if name != "NSKeyedArchiver" {
                debug!(archiver = name, "unusual archiver name");
            }
        }
        Ok(Self {
            objects: objects.clone(),
            roots,
            archiver,
            version: top.get("$version").and_then(Value::as_int),
        })
    }

    /// The object table.
    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    /// Root names in discovery order.
    pub fn root_names(&self) -> Vec<&str> {
        self.roots.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The `$archiver` entry, if present.
    pub fn archiver(&self) -> Option<&str> {
        self.archiver.as_deref()
    }

    /// The `$version` entry, if present.
    pub fn version(&self) -> Option<i64> {
        self.version
    }

    /// Resolves every root and assembles the output document.
    ///
    /// Roots resolve in parallel; the table is read-only during resolution
    /// and each root gets its own visited set, so no state is shared. The
    /// output order is always discovery order.
    pub fn resolve_all(&self, converter: &dyn Converter, options: &ResolveOptions) -> Conversion {
        let resolver = Resolver::new(&self.objects, converter, options);
        let (values, roots): (Vec<Plain>, Vec<RootOutcome>) = self
            .roots
            .par_iter()
            .map(|(name, value)| {
                debug!(root = name.as_str(), "resolving root");
                let (result, diagnostics) = resolver.resolve_root(value);
                match result {
                    Ok(resolved) => (
                        assemble_root(name, resolved),
                        RootOutcome {
                            name: name.clone(),
                            error: None,
                            diagnostics,
                        },
                    ),
                    Err(error) => {
                        warn!(root = name.as_str(), %error, "root failed to resolve");
                        (
                            failure_marker(name, &error),
                            RootOutcome {
                                name: name.clone(),
                                error: Some(error),
                                diagnostics,
                            },
                        )
                    }
                }
            })
            .unzip();

        let document = match values.len() {
            0 => Plain::Array(Vec::new()),
            1 => values.into_iter().next().unwrap_or(Plain::Array(Vec::new())),
            _ => Plain::Array(values),
        };
        Conversion { document, roots }
    }
}

/// Wraps a root value so non-default roots stay distinguishable in merged
/// output. Dictionaries and the default `root` name are left as-is.
fn assemble_root(name: &str, value: Plain) -> Plain {
    if !value.is_dict() && !name.eq_ignore_ascii_case(DEFAULT_ROOT) {
        Plain::Dict(vec![(name.to_string(), value)])
    } else {
        value
    }
}

/// The explicit stand-in a failed root contributes to the document.
fn failure_marker(name: &str, error: &UnkeyedError) -> Plain {
    Plain::Dict(vec![(
        name.to_string(),
        Plain::Text(format!("<unresolved: {error}>")),
    )])
}
