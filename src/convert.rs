//! Class-specific unpacking of archive entries.
//!
//! Keyed archives store instances of collection classes as records with
//! class-internal field names (`NS.keys`, `NS.objects`, ...). Before the
//! generic walk recurses into such an entry it is handed to a [`Converter`],
//! which turns known shapes into plain arrays and dictionaries. Unknown
//! classes pass through unchanged and are traversed generically.
//!
//! The converter may return values that still contain references; the
//! resolver keeps chasing those.

use std::fmt;

use crate::error::{Result, UnkeyedError};
use crate::value::{Value, CLASS_KEY};

/// The seam for class-specific unpacking rules.
pub trait Converter: Send + Sync + fmt::Debug {
    /// Unpacks one table entry before generic traversal continues.
    fn convert(&self, entry: &Value, table: &[Value]) -> Result<Value>;
}

/// Unpacking rules for the common Foundation collection classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonObjects;

impl Converter for CommonObjects {
    fn convert(&self, entry: &Value, table: &[Value]) -> Result<Value> {
        // The shared null sentinel: table entry 0 holds the string "$null".
        if entry.as_text() == Some("$null") {
            return Ok(Value::Null);
        }
        let Some(name) = class_name(entry, table)? else {
            return Ok(entry.clone());
        };
        match name {
            "NSDictionary" | "NSMutableDictionary" => {
                let keys = elements(entry, table, "NS.keys")?;
                let objects = elements(entry, table, "NS.objects")?;
                if keys.len() != objects.len() {
                    return Err(UnkeyedError::Format(format!(
                        "{name} with {} keys but {} objects",
                        keys.len(),
                        objects.len()
                    )));
                }
                Ok(Value::Dict(keys.into_iter().zip(objects).collect()))
            }
            "NSArray" | "NSMutableArray" | "NSSet" | "NSMutableSet" | "NSOrderedSet" => {
                elements(entry, table, "NS.objects").map(Value::Array)
            }
            "NSString" | "NSMutableString" => Ok(entry
                .get("NS.string")
                .cloned()
                .unwrap_or(Value::Text(String::new()))),
            "NSData" | "NSMutableData" => Ok(entry
                .get("NS.data")
                .cloned()
                .unwrap_or(Value::Bytes(Vec::new()))),
            "NSDate" => match entry.get("NS.time") {
                Some(Value::Real(t)) => Ok(Value::Date(*t)),
                Some(Value::Int(t)) => Ok(Value::Date(*t as f64)),
                Some(other) => Ok(other.clone()),
                None => Ok(Value::Date(0.0)),
            },
            "NSNull" => Ok(Value::Null),
            _ => Ok(entry.clone()),
        }
    }
}

/// Resolves an entry's `$class` reference to its `$classname`.
fn class_name<'t>(entry: &Value, table: &'t [Value]) -> Result<Option<&'t str>> {
    let Some(class_ref) = entry.get(CLASS_KEY) else {
        return Ok(None);
    };
    let Some(index) = class_ref.as_uid() else {
        // A malformed or already-inlined class record; leave the entry to
        // generic traversal.
        return Ok(None);
    };
    let class_entry = table
        .get(index as usize)
        .ok_or(UnkeyedError::UnresolvedReference { index })?;
    Ok(class_entry.get("$classname").and_then(Value::as_text))
}

/// Fetches a class-internal element list, following one reference hop when
/// the field itself is stored as a reference to a separate array entry.
fn elements(entry: &Value, table: &[Value], field: &str) -> Result<Vec<Value>> {
    let raw = match entry.get(field) {
        Some(v) => v,
        None => return Ok(Vec::new()),
    };
    let list = match raw {
        Value::Uid(index) => table
            .get(*index as usize)
            .ok_or(UnkeyedError::UnresolvedReference { index: *index })?,
        other => other,
    };
    match list {
        Value::Array(items) => Ok(items.clone()),
        other => Ok(vec![other.clone()]),
    }
}
