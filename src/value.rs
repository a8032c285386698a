//! The dynamic value model.
//!
//! Two value types flow through the crate:
//!
//! - [`Value`] is a raw property list value as decoded from a container. It
//!   may contain [`Value::Uid`] references into the object table of a keyed
//!   archive.
//! - [`Plain`] is a fully resolved value: a self-contained tree with textual
//!   dictionary keys and no references. This is what the writers consume.
//!
//! Dictionary entry order is preserved in both representations so that
//! multi-root output and re-encoded documents stay deterministic.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Reserved dictionary key naming the class of an archived object.
pub const CLASS_KEY: &str = "$class";

/// Dictionary key under which a null value survives resolution unchanged.
///
/// `NS.base` conventionally references table entry 0, the `$null` sentinel,
/// as an omitted base-class marker. Everywhere else a null map value is
/// stored as empty text, because strict plist encoders reject bare nulls.
pub const PASSTHROUGH_KEY: &str = "NS.base";

/// Seconds between the Unix epoch and the Apple epoch (2001-01-01T00:00:00Z).
pub(crate) const APPLE_EPOCH_UNIX: i64 = 978_307_200;

/// A raw property list value.
///
/// `Uid` is the reference type linking keyed-archive entries together; it
/// only appears in archives and never in resolved output.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The null marker (or the `$null` sentinel after conversion).
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Real(f64),
    /// Seconds since the Apple epoch (2001-01-01T00:00:00Z).
    Date(f64),
    /// A text string.
    Text(String),
    /// A raw byte payload.
    Bytes(Vec<u8>),
    /// A reference: an index into the object table.
    Uid(u64),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A dictionary with entry order preserved as decoded.
    Dict(Vec<(Value, Value)>),
}

impl Value {
    /// Looks up a dictionary entry by textual key. Returns `None` for
    /// non-dictionary values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the reference index, if this is a reference.
    pub fn as_uid(&self) -> Option<u64> {
        match self {
            Value::Uid(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// A fully resolved, reference-free value tree.
///
/// Dictionary keys are always text; values containing nulls only occur under
/// [`PASSTHROUGH_KEY`] or at the top level of a root.
#[derive(Debug, Clone, PartialEq)]
pub enum Plain {
    /// A preserved null (see [`PASSTHROUGH_KEY`]).
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Real(f64),
    /// Seconds since the Apple epoch.
    Date(f64),
    /// A text string.
    Text(String),
    /// A raw byte payload.
    Bytes(Vec<u8>),
    /// An ordered sequence.
    Array(Vec<Plain>),
    /// A dictionary with textual keys, entry order preserved.
    Dict(Vec<(String, Plain)>),
}

impl Plain {
    /// Looks up a dictionary entry by key.
    pub fn get(&self, key: &str) -> Option<&Plain> {
        match self {
            Plain::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns true for dictionary values.
    pub fn is_dict(&self) -> bool {
        matches!(self, Plain::Dict(_))
    }

    /// Renders the value as text, used when a non-text value ends up in key
    /// position. Scalars use their natural text form; containers fall back
    /// to their JSON rendering.
    pub fn render_text(&self) -> String {
        match self {
            Plain::Null => String::new(),
            Plain::Bool(b) => b.to_string(),
            Plain::Int(n) => n.to_string(),
            Plain::Real(r) => r.to_string(),
            Plain::Date(d) => apple_date_to_rfc3339(*d),
            Plain::Text(s) => s.clone(),
            Plain::Bytes(b) => base64::encode(b),
            Plain::Array(_) | Plain::Dict(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<&Plain> for Value {
    fn from(plain: &Plain) -> Self {
        match plain {
            Plain::Null => Value::Null,
            Plain::Bool(b) => Value::Bool(*b),
            Plain::Int(n) => Value::Int(*n),
            Plain::Real(r) => Value::Real(*r),
            Plain::Date(d) => Value::Date(*d),
            Plain::Text(s) => Value::Text(s.clone()),
            Plain::Bytes(b) => Value::Bytes(b.clone()),
            Plain::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            Plain::Dict(entries) => Value::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (Value::Text(k.clone()), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Plain {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Plain::Null => serializer.serialize_unit(),
            Plain::Bool(b) => serializer.serialize_bool(*b),
            Plain::Int(n) => serializer.serialize_i64(*n),
            Plain::Real(r) => serializer.serialize_f64(*r),
            Plain::Date(d) => serializer.serialize_str(&apple_date_to_rfc3339(*d)),
            Plain::Text(s) => serializer.serialize_str(s),
            Plain::Bytes(b) => serializer.serialize_str(&base64::encode(b)),
            Plain::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Plain::Dict(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Renders Apple-epoch seconds as an RFC 3339 timestamp.
pub(crate) fn apple_date_to_rfc3339(seconds: f64) -> String {
    let unix = seconds + APPLE_EPOCH_UNIX as f64;
    let whole = unix.floor();
    let nanos = ((unix - whole) * 1e9) as u32;
    match chrono::DateTime::<chrono::Utc>::from_timestamp(whole as i64, nanos) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        // Out of chrono's representable range; fall back to the raw number.
        None => seconds.to_string(),
    }
}

/// Parses an RFC 3339 timestamp into Apple-epoch seconds.
pub(crate) fn rfc3339_to_apple_date(text: &str) -> Option<f64> {
    let dt = chrono::DateTime::parse_from_rfc3339(text).ok()?;
    Some(dt.timestamp_millis() as f64 / 1000.0 - APPLE_EPOCH_UNIX as f64)
}
