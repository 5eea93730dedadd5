//! The dynamic value model.
//!
//! Because the schema arrives at runtime rather than at compile time (schema
//! compilation is an external collaborator), there is no
//! per-record Rust type to generate. [`Value`] plays the role every
//! generated "frozen class" plays in the original framework; [`MutableValue`]
//! plays the role of every generated "mutable/builder class". Table-driven
//! dispatch over each record's field list (see [`crate::record`]) takes the
//! place of per-record generated code.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::array::FrozenArray;
use crate::record::enum_::FrozenEnum;
use crate::record::struct_::{FrozenStruct, MutableStruct};

/// The canonical, immutable, hashable, `==`-comparable representation of any
/// value reachable from a schema: a primitive, an optional, a keyed or
/// unkeyed array, or a record (struct/enum) instance.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    /// Signed Unix milliseconds, clamped to ±8,640,000,000,000,000.
    Timestamp(i64),
    Optional(Option<Box<Value>>),
    Array(FrozenArray),
    Struct(FrozenStruct),
    Enum(FrozenEnum),
}

impl Value {
    /// Walks one segment of a keyed array's dotted attribute chain. For a
    /// struct this looks up a field by name; for an enum it recognizes the
    /// synthetic `kind` attribute, whose value is the variant's tag string,
    /// not its payload.
    pub fn get_attribute(&self, name: &str) -> Option<Value> {
        match self {
            Value::Struct(s) => s.get_field_by_name(name),
            Value::Enum(e) if name == "kind" => Some(Value::String(e.kind_name())),
            Value::Optional(Some(inner)) => inner.get_attribute(name),
            _ => None,
        }
    }

    /// Converts a leaf value (the end of a key path) to a hashable
    /// [`KeyValue`], or `None` if the chain bottomed out on something that
    /// can't serve as a map key (absent optional, a composite value).
    pub fn as_key_value(&self) -> Option<KeyValue> {
        match self {
            Value::Bool(b) => Some(KeyValue::Bool(*b)),
            Value::Int32(v) => Some(KeyValue::Int32(*v)),
            Value::Int64(v) => Some(KeyValue::Int64(*v)),
            Value::UInt64(v) => Some(KeyValue::UInt64(*v)),
            Value::Float32(v) => Some(KeyValue::FloatBits((*v as f64).to_bits())),
            Value::Float64(v) => Some(KeyValue::FloatBits(v.to_bits())),
            Value::String(s) => Some(KeyValue::String(s.clone())),
            Value::Bytes(b) => Some(KeyValue::Bytes(b.clone())),
            Value::Timestamp(v) => Some(KeyValue::Int64(*v)),
            Value::Optional(Some(inner)) => inner.as_key_value(),
            Value::Optional(None) => None,
            Value::Enum(e) => Some(KeyValue::String(e.kind_name())),
            Value::Struct(_) | Value::Array(_) => None,
        }
    }

    /// Resolves a dotted key path against this value, returning `None` if any
    /// segment is absent.
    pub fn resolve_key_path(&self, path: &[String]) -> Option<KeyValue> {
        let mut current = self.clone();
        for segment in path {
            current = current.get_attribute(segment)?;
        }
        current.as_key_value()
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Value::Enum(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (UInt64(a), UInt64(b)) => a == b,
            (Float32(a), Float32(b)) => a == b,
            (Float64(a), Float64(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Optional(a), Optional(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Struct(a), Struct(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::UInt64(v) => v.hash(state),
            Value::Float32(v) => v.to_bits().hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Optional(o) => o.hash(state),
            Value::Array(a) => a.hash(state),
            Value::Struct(s) => s.hash(state),
            Value::Enum(e) => e.hash(state),
        }
    }
}

/// The mutable/builder counterpart of [`Value`]. Only struct fields actually
/// need a distinct builder shape (array and enum fields are promoted to/from
/// plain `Vec`/frozen values eagerly); see [`crate::record::struct_`].
#[derive(Clone, Debug)]
pub enum MutableValue {
    Frozen(Value),
    Struct(MutableStruct),
    Array(Vec<MutableValue>),
}

impl MutableValue {
    pub fn into_frozen_hint(self) -> Option<Value> {
        match self {
            MutableValue::Frozen(v) => Some(v),
            _ => None,
        }
    }

    /// Materializes the current value into a plain frozen [`Value`],
    /// recursing through a lazily-upgraded struct or array. Used by
    /// [`MutableStruct::get`] and, before re-coercion, by
    /// [`MutableStruct::to_frozen`].
    pub fn to_frozen_snapshot(&self) -> Value {
        match self {
            MutableValue::Frozen(v) => v.clone(),
            MutableValue::Struct(s) => s.clone().to_frozen(),
            MutableValue::Array(items) => {
                let frozen: Vec<Value> = items.iter().map(MutableValue::to_frozen_snapshot).collect();
                Value::Array(FrozenArray::new(frozen, None))
            }
        }
    }
}

/// An opaque preserved token: either the exact bytes a binary decode
/// consumed, or the exact JSON value a JSON decode consumed. Re-emitted
/// verbatim in its own format; see
/// [`crate::wire::decode_generic_json`]/[`crate::wire::encode_generic_json`]
/// for the best-effort cross-format path.
#[derive(Clone, Debug)]
pub enum RawToken {
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl RawToken {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RawToken::Json(v) => v.clone(),
            RawToken::Binary(bytes) => {
                let mut reader = crate::wire::WireReader::new(bytes);
                crate::wire::decode_generic_json(&mut reader).unwrap_or(serde_json::Value::Null)
            }
        }
    }

    pub fn write_binary(&self, writer: &mut crate::wire::WireWriter) {
        match self {
            RawToken::Binary(bytes) => writer.write_raw(bytes),
            RawToken::Json(value) => crate::wire::encode_generic_json(value, writer),
        }
    }

    /// `true` for the one-byte `[0]` token: the canonical "nothing here"
    /// placeholder a removed slot gets when it was never populated.
    pub fn is_zero(&self) -> bool {
        match self {
            RawToken::Binary(bytes) => bytes.as_slice() == [0u8],
            RawToken::Json(serde_json::Value::Number(n)) => n.as_i64() == Some(0),
            _ => false,
        }
    }
}

impl PartialEq for RawToken {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawToken::Binary(a), RawToken::Binary(b)) => a == b,
            (RawToken::Json(a), RawToken::Json(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for RawToken {}

impl Hash for RawToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            RawToken::Binary(b) => {
                0u8.hash(state);
                b.hash(state);
            }
            RawToken::Json(v) => {
                1u8.hash(state);
                v.to_string().hash(state);
            }
        }
    }
}

/// A hashable key derived from a keyed array's attribute chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    /// Bit pattern of the key value promoted to `f64`.
    FloatBits(u64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::String(Arc::from(s))
    }
}
impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int32(v)
    }
}
impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int64(v)
    }
}
impl From<u64> for KeyValue {
    fn from(v: u64) -> Self {
        KeyValue::UInt64(v)
    }
}
