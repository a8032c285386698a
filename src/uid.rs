//! Normalization of textual references.
//!
//! XML property lists have no native reference type; keyed archives in XML
//! form spell a reference as a one-entry dictionary `{"CF$UID": n}`. This
//! pass rewrites those records into [`Value::Uid`] so the resolver only ever
//! sees native references.
//!
//! The rewrite is idempotent: a `Uid` is not a dictionary, so running the
//! pass again leaves the tree untouched.

use crate::value::Value;

/// Dictionary key marking a textual reference record.
pub const UID_KEY: &str = "CF$UID";

/// Rewrites `{"CF$UID": n}` records into native references, recursively.
///
/// The value itself is never replaced, only its descendants; a whole
/// document consisting of a single reference record does not occur in
/// practice, and keeping the walk child-oriented matches how the records
/// are embedded.
pub fn normalize(value: &mut Value) {
    match value {
        Value::Dict(entries) => {
            for (_, child) in entries.iter_mut() {
                visit_child(child);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                visit_child(child);
            }
        }
        _ => {}
    }
}

fn visit_child(child: &mut Value) {
    if let Some(index) = reference_index(child) {
        *child = Value::Uid(index);
        return;
    }
    normalize(child);
}

fn reference_index(value: &Value) -> Option<u64> {
    let Value::Dict(_) = value else { return None };
    let n = value.get(UID_KEY)?.as_int()?;
    u64::try_from(n).ok()
}
