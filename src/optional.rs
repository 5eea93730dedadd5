//! The `optional` type constructor: wraps any other type,
//! adding the absent-value state. There is exactly one `Optional` adapter per
//! distinct inner adapter, identity-shared through the
//! [`crate::registry::Registry`]'s optional cache so that two `optional<int32>`
//! fields in different structs resolve to the same [`AdapterHandle`].

use crate::adapter::{Adapter, AdapterHandle};
use crate::error::{JsonError, TypeError, WireError};
use crate::registry::Registry;
use crate::value::Value;
use crate::wire::{WireReader, WireWriter};

/// Unboxes one level of `Value::Optional` if `value` is one, otherwise
/// returns `value` unchanged. Lets adapters accept either the wrapped or the
/// unwrapped form, mirroring `to_frozen`'s general leniency.
fn unwrap_present(value: Value) -> Option<Value> {
    match value {
        Value::Optional(None) => None,
        Value::Optional(Some(inner)) => Some(*inner),
        other => Some(other),
    }
}

#[derive(Debug)]
pub struct OptionalAdapter {
    inner: AdapterHandle,
}

impl OptionalAdapter {
    pub fn new(inner: AdapterHandle) -> Self {
        OptionalAdapter { inner }
    }
}

impl Adapter for OptionalAdapter {
    fn default_value(&self) -> Value {
        Value::Optional(None)
    }

    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match unwrap_present(input) {
            None => Ok(Value::Optional(None)),
            Some(present) => {
                let frozen = self.inner.to_frozen(present)?;
                Ok(Value::Optional(Some(Box::new(frozen))))
            }
        }
    }

    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Optional(None))
    }

    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        match value {
            Value::Optional(Some(inner)) => self.inner.encode_binary(inner, out),
            _ => out.write_tag(0),
        }
    }

    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, WireError> {
        // The absent state and the inner type's own default share wire tag 0;
        // a present-but-default value is therefore indistinguishable from
        // absent, which is the documented, accepted lossy corner of the
        // format.
        let value = self.inner.decode_binary(input)?;
        if self.inner.is_not_default(&value) {
            Ok(Value::Optional(Some(Box::new(value))))
        } else {
            Ok(Value::Optional(None))
        }
    }

    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value {
        match value {
            Value::Optional(Some(inner)) => self.inner.to_json(inner, readable),
            _ => serde_json::Value::Null,
        }
    }

    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        if json.is_null() {
            Ok(Value::Optional(None))
        } else {
            let inner = self.inner.from_json(json)?;
            Ok(Value::Optional(Some(Box::new(inner))))
        }
    }

    fn finalize(&self, registry: &Registry) {
        self.inner.finalize(registry);
    }

    fn type_name(&self) -> String {
        format!("optional<{}>", self.inner.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive;

    #[test]
    fn absent_and_present_default_collide_on_the_wire() {
        let adapter = OptionalAdapter::new(primitive::int32_adapter());
        let mut buf = Vec::new();
        adapter.encode_binary(&Value::Optional(None), &mut WireWriter::new(&mut buf));
        let mut buf2 = Vec::new();
        adapter.encode_binary(
            &Value::Optional(Some(Box::new(Value::Int32(0)))),
            &mut WireWriter::new(&mut buf2),
        );
        assert_eq!(buf, buf2);
    }

    #[test]
    fn present_nonzero_roundtrips() {
        let adapter = OptionalAdapter::new(primitive::int32_adapter());
        let value = Value::Optional(Some(Box::new(Value::Int32(7))));
        let mut buf = Vec::new();
        adapter.encode_binary(&value, &mut WireWriter::new(&mut buf));
        let mut reader = WireReader::new(&buf);
        assert_eq!(adapter.decode_binary(&mut reader).unwrap(), value);
    }

    #[test]
    fn json_null_is_absent() {
        let adapter = OptionalAdapter::new(primitive::string_adapter());
        assert_eq!(
            adapter.from_json(&serde_json::Value::Null).unwrap(),
            Value::Optional(None)
        );
    }
}
