//! The `enum` record kind: a closed set of named constants
//! plus an optional set of named value variants, each carrying a payload of
//! its own type. Constant number `0` is reserved for the implicit `UNKNOWN`
//! member (`?`), which every enum has whether or not the schema lists it --
//! it is both the default value and the landing spot for a value-variant
//! number nothing in this schema version recognizes.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::adapter::{Adapter, AdapterHandle};
use crate::error::{JsonError, TypeError, WireError};
use crate::registry::Registry;
use crate::value::{RawToken, Value};
use crate::wire::{EnumHeader, WireReader, WireWriter};

#[derive(Debug, Clone)]
pub struct ConstantSpec {
    pub number: u32,
    pub name: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct ValueVariantSpec {
    pub number: u32,
    pub name: Arc<str>,
    pub adapter: AdapterHandle,
}

/// An instance of an enum record. Either the implicit `UNKNOWN` (number 0),
/// a declared constant, a declared value variant carrying a payload, or a
/// value-variant number this schema version doesn't recognize, which
/// preserves its payload verbatim.
#[derive(Clone, Debug)]
pub struct FrozenEnum {
    inner: Arc<EnumData>,
}

#[derive(Debug)]
enum EnumData {
    Constant { number: u32, name: Arc<str> },
    Value { number: u32, name: Arc<str>, payload: Value },
    Unrecognized { number: u32, payload: RawToken },
}

impl FrozenEnum {
    pub fn kind_name(&self) -> Arc<str> {
        match &*self.inner {
            EnumData::Constant { name, .. } => name.clone(),
            EnumData::Value { name, .. } => name.clone(),
            EnumData::Unrecognized { .. } => Arc::from("?"),
        }
    }

    pub fn number(&self) -> u32 {
        match &*self.inner {
            EnumData::Constant { number, .. } => *number,
            EnumData::Value { number, .. } => *number,
            EnumData::Unrecognized { number, .. } => *number,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(&*self.inner, EnumData::Constant { number: 0, .. } | EnumData::Unrecognized { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match &*self.inner {
            EnumData::Value { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

impl PartialEq for FrozenEnum {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.inner, &*other.inner) {
            (EnumData::Constant { number: a, .. }, EnumData::Constant { number: b, .. }) => a == b,
            (
                EnumData::Value { number: a, payload: pa, .. },
                EnumData::Value { number: b, payload: pb, .. },
            ) => a == b && pa == pb,
            (
                EnumData::Unrecognized { number: a, payload: pa },
                EnumData::Unrecognized { number: b, payload: pb },
            ) => a == b && pa == pb,
            _ => false,
        }
    }
}
impl Eq for FrozenEnum {}

impl Hash for FrozenEnum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &*self.inner {
            EnumData::Constant { number, .. } => {
                0u8.hash(state);
                number.hash(state);
            }
            EnumData::Value { number, payload, .. } => {
                1u8.hash(state);
                number.hash(state);
                payload.hash(state);
            }
            EnumData::Unrecognized { number, payload } => {
                2u8.hash(state);
                number.hash(state);
                payload.hash(state);
            }
        }
    }
}

/// Adapter for one enum record.
#[derive(Debug)]
pub struct EnumAdapter {
    record_id: Arc<str>,
    constants: Vec<ConstantSpec>,
    value_variants: Vec<ValueVariantSpec>,
    number_to_constant: HashMap<u32, usize>,
    number_to_value_variant: HashMap<u32, usize>,
    name_to_number: HashMap<String, (u32, bool)>,
}

impl EnumAdapter {
    pub fn new(
        record_id: impl Into<Arc<str>>,
        constants: Vec<ConstantSpec>,
        value_variants: Vec<ValueVariantSpec>,
    ) -> Self {
        let mut number_to_constant = HashMap::new();
        let mut number_to_value_variant = HashMap::new();
        let mut name_to_number = HashMap::new();
        for (i, c) in constants.iter().enumerate() {
            number_to_constant.insert(c.number, i);
            name_to_number.insert(c.name.to_string(), (c.number, false));
        }
        for (i, v) in value_variants.iter().enumerate() {
            number_to_value_variant.insert(v.number, i);
            name_to_number.insert(v.name.to_string(), (v.number, true));
        }
        EnumAdapter {
            record_id: record_id.into(),
            constants,
            value_variants,
            number_to_constant,
            number_to_value_variant,
            name_to_number,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn unknown(&self) -> Value {
        Value::Enum(FrozenEnum {
            inner: Arc::new(EnumData::Constant { number: 0, name: Arc::from("?") }),
        })
    }

    /// Builds the named constant, or an error if `name` isn't declared.
    pub fn constant(&self, name: &str) -> Result<Value, TypeError> {
        match self.name_to_number.get(name) {
            Some((number, false)) => {
                let spec = &self.constants[self.number_to_constant[number]];
                Ok(Value::Enum(FrozenEnum {
                    inner: Arc::new(EnumData::Constant { number: spec.number, name: spec.name.clone() }),
                }))
            }
            _ => Err(TypeError {
                expected: format!("constant of {}", self.record_id),
                found: name.to_string(),
            }),
        }
    }

    /// Builds the named value variant with `payload` coerced to its declared
    /// type.
    pub fn value_variant(&self, name: &str, payload: Value) -> Result<Value, TypeError> {
        match self.name_to_number.get(name) {
            Some((number, true)) => {
                let spec = &self.value_variants[self.number_to_value_variant[number]];
                let payload = spec.adapter.to_frozen(payload)?;
                Ok(Value::Enum(FrozenEnum {
                    inner: Arc::new(EnumData::Value { number: spec.number, name: spec.name.clone(), payload }),
                }))
            }
            _ => Err(TypeError {
                expected: format!("value variant of {}", self.record_id),
                found: name.to_string(),
            }),
        }
    }
}

impl Adapter for EnumAdapter {
    fn default_value(&self) -> Value {
        self.unknown()
    }

    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match input {
            Value::Enum(e) => Ok(Value::Enum(e)),
            other => Err(TypeError {
                expected: self.record_id.to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Enum(e) if e.is_unknown())
    }

    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        let Value::Enum(e) = value else {
            out.write_tag(0);
            return;
        };
        match &*e.inner {
            EnumData::Constant { number, .. } => out.write_uint64(*number as u64),
            EnumData::Value { number, payload, .. } => {
                let _ = out.write_array_header(2);
                out.write_uint64(*number as u64);
                let spec = &self.value_variants[self.number_to_value_variant[number]];
                spec.adapter.encode_binary(payload, out);
            }
            EnumData::Unrecognized { number, payload } => {
                let _ = out.write_array_header(2);
                out.write_uint64(*number as u64);
                payload.write_binary(out);
            }
        }
    }

    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, WireError> {
        match input.read_enum_header()? {
            EnumHeader::Constant(0) => Ok(self.unknown()),
            EnumHeader::Constant(number) => match self.number_to_constant.get(&number) {
                Some(&i) => {
                    let spec = &self.constants[i];
                    Ok(Value::Enum(FrozenEnum {
                        inner: Arc::new(EnumData::Constant { number: spec.number, name: spec.name.clone() }),
                    }))
                }
                None => Ok(self.unknown()),
            },
            EnumHeader::ValueVariant(number) => match self.number_to_value_variant.get(&number) {
                Some(&i) => {
                    let spec = &self.value_variants[i];
                    let payload = spec.adapter.decode_binary(input)?;
                    Ok(Value::Enum(FrozenEnum {
                        inner: Arc::new(EnumData::Value { number: spec.number, name: spec.name.clone(), payload }),
                    }))
                }
                None => {
                    let payload = RawToken::Binary(input.read_raw_token()?);
                    Ok(Value::Enum(FrozenEnum {
                        inner: Arc::new(EnumData::Unrecognized { number, payload }),
                    }))
                }
            },
        }
    }

    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value {
        let Value::Enum(e) = value else {
            return serde_json::Value::String("?".to_string());
        };
        match &*e.inner {
            EnumData::Constant { name, .. } => serde_json::Value::String(name.to_string()),
            EnumData::Value { number, name, payload } => {
                let spec = &self.value_variants[self.number_to_value_variant[number]];
                let payload_json = spec.adapter.to_json(payload, readable);
                if readable {
                    let mut obj = serde_json::Map::new();
                    obj.insert("kind".to_string(), serde_json::Value::String(name.to_string()));
                    obj.insert("value".to_string(), payload_json);
                    serde_json::Value::Object(obj)
                } else {
                    serde_json::Value::Array(vec![
                        serde_json::Value::Number((*number).into()),
                        payload_json,
                    ])
                }
            }
            EnumData::Unrecognized { number, payload } => {
                if readable {
                    serde_json::Value::String("?".to_string())
                } else {
                    serde_json::Value::Array(vec![
                        serde_json::Value::Number((*number).into()),
                        payload.to_json(),
                    ])
                }
            }
        }
    }

    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::String(name) => match self.name_to_number.get(name.as_str()) {
                Some((number, false)) => {
                    let spec = &self.constants[self.number_to_constant[number]];
                    Ok(Value::Enum(FrozenEnum {
                        inner: Arc::new(EnumData::Constant { number: spec.number, name: spec.name.clone() }),
                    }))
                }
                _ => Ok(self.unknown()),
            },
            serde_json::Value::Object(obj) => {
                let kind = obj.get("kind").and_then(|v| v.as_str()).ok_or_else(|| {
                    JsonError(format!("enum object for {} missing \"kind\"", self.record_id))
                })?;
                match self.name_to_number.get(kind) {
                    Some((number, true)) => {
                        let spec = &self.value_variants[self.number_to_value_variant[number]];
                        let payload = match obj.get("value") {
                            Some(v) => spec.adapter.from_json(v)?,
                            None => spec.adapter.default_value(),
                        };
                        Ok(Value::Enum(FrozenEnum {
                            inner: Arc::new(EnumData::Value { number: spec.number, name: spec.name.clone(), payload }),
                        }))
                    }
                    _ => Ok(self.unknown()),
                }
            }
            serde_json::Value::Array(items) if items.len() == 2 => {
                let number = items[0].as_u64().unwrap_or(0) as u32;
                match self.number_to_value_variant.get(&number) {
                    Some(&i) => {
                        let spec = &self.value_variants[i];
                        let payload = spec.adapter.from_json(&items[1])?;
                        Ok(Value::Enum(FrozenEnum {
                            inner: Arc::new(EnumData::Value { number: spec.number, name: spec.name.clone(), payload }),
                        }))
                    }
                    None => Ok(Value::Enum(FrozenEnum {
                        inner: Arc::new(EnumData::Unrecognized {
                            number,
                            payload: RawToken::Json(items[1].clone()),
                        }),
                    })),
                }
            }
            other => Err(JsonError(format!("invalid enum JSON for {}: {other}", self.record_id))),
        }
    }

    fn finalize(&self, registry: &Registry) {
        for v in &self.value_variants {
            v.adapter.finalize(registry);
        }
    }

    fn type_name(&self) -> String {
        self.record_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive;

    fn make_adapter() -> EnumAdapter {
        EnumAdapter::new(
            "test.Shape",
            vec![
                ConstantSpec { number: 0, name: Arc::from("?") },
                ConstantSpec { number: 1, name: Arc::from("CIRCLE") },
            ],
            vec![ValueVariantSpec {
                number: 2,
                name: Arc::from("SQUARE_SIDE"),
                adapter: primitive::int32_adapter(),
            }],
        )
    }

    #[test]
    fn default_is_unknown() {
        let adapter = make_adapter();
        assert!(!adapter.is_not_default(&adapter.default_value()));
    }

    #[test]
    fn value_variant_roundtrips_through_binary() {
        let adapter = make_adapter();
        let value = adapter.value_variant("SQUARE_SIDE", Value::Int32(4)).unwrap();
        let mut buf = Vec::new();
        adapter.encode_binary(&value, &mut WireWriter::new(&mut buf));
        let mut reader = WireReader::new(&buf);
        assert_eq!(adapter.decode_binary(&mut reader).unwrap(), value);
    }

    #[test]
    fn unrecognized_value_variant_preserves_payload() {
        let adapter = make_adapter();
        let mut buf = Vec::new();
        {
            let mut w = WireWriter::new(&mut buf);
            w.write_array_header(2).unwrap();
            w.write_uint64(99);
            w.write_string("from the future");
        }
        let mut reader = WireReader::new(&buf);
        let decoded = adapter.decode_binary(&mut reader).unwrap();
        let mut out = Vec::new();
        adapter.encode_binary(&decoded, &mut WireWriter::new(&mut out));
        assert_eq!(buf, out);
    }

    #[test]
    fn unknown_constant_number_falls_back_to_unknown() {
        let adapter = make_adapter();
        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_uint64(42);
        let mut reader = WireReader::new(&buf);
        let decoded = adapter.decode_binary(&mut reader).unwrap();
        assert_eq!(decoded, adapter.unknown());
    }
}
