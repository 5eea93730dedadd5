//! The published, per-type facade over an [`crate::adapter::Adapter`]:
//! binary encode/decode and both JSON flavors, plus the
//! resolved `Method`/`Constant` values a module publishes alongside its
//! record types.

use crate::adapter::AdapterHandle;
use crate::error::{Error, JsonError, WireError};
use crate::registry::{InitializedModule, Registry};
use crate::schema::TypeTerm;
use crate::value::Value;
use crate::wire::{WireReader, WireWriter};

/// A ready-to-use encoder/decoder for one resolved type. Cheap to clone
/// (an `Arc` underneath); typically kept around for the process lifetime and
/// reused across many calls rather than rebuilt per message.
#[derive(Clone, Debug)]
pub struct Serializer {
    adapter: AdapterHandle,
}

impl Serializer {
    pub fn new(adapter: AdapterHandle) -> Self {
        Serializer { adapter }
    }

    /// Resolves `type_term` against an already-initialized registry. Safe to
    /// call at any point after [`crate::registry::init_module`] returns.
    pub fn of(type_term: &TypeTerm, registry: &Registry) -> Self {
        Serializer::new(registry.resolve(type_term))
    }

    pub fn type_name(&self) -> String {
        self.adapter.type_name()
    }

    pub fn to_bytes(&self, value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        self.adapter.encode_binary(value, &mut WireWriter::new(&mut buf));
        buf
    }

    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Value, WireError> {
        let mut reader = WireReader::new(bytes);
        self.adapter.decode_binary(&mut reader)
    }

    /// Compact (dense, array-based) JSON.
    pub fn to_json(&self, value: &Value) -> serde_json::Value {
        self.adapter.to_json(value, false)
    }

    pub fn to_json_code(&self, value: &Value) -> String {
        self.to_json(value).to_string()
    }

    /// Human-readable (field-name-keyed) JSON.
    pub fn to_readable_json(&self, value: &Value) -> serde_json::Value {
        self.adapter.to_json(value, true)
    }

    pub fn to_readable_json_code(&self, value: &Value) -> String {
        serde_json::to_string_pretty(&self.to_readable_json(value)).unwrap_or_default()
    }

    /// Accepts either JSON flavor: both decode through the same
    /// `Adapter::from_json`, which recognizes an object or an array on a
    /// struct, and a string/object/pair on an enum.
    pub fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        self.adapter.from_json(json)
    }

    pub fn from_json_code(&self, code: &str) -> Result<Value, Error> {
        let json: serde_json::Value =
            serde_json::from_str(code).map_err(|e| Error::Json(JsonError(e.to_string())))?;
        Ok(self.from_json(&json)?)
    }
}

/// A schema's exported remote-call signature, resolved to adapters.
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub number: u32,
    pub request: Serializer,
    pub response: Serializer,
}

/// A schema's exported named constant, already decoded to a frozen value.
#[derive(Clone, Debug)]
pub struct Constant {
    pub name: String,
    pub value: Value,
}

/// Republishes an [`InitializedModule`]'s methods and constants as the
/// public, serializer-shaped types applications actually call.
pub fn publish(module: InitializedModule) -> (Registry, Vec<Method>, Vec<Constant>) {
    let methods = module
        .methods
        .into_iter()
        .map(|m| Method {
            name: m.name,
            number: m.number,
            request: Serializer::new(m.request),
            response: Serializer::new(m.response),
        })
        .collect();
    let constants = module
        .constants
        .into_iter()
        .map(|c| Constant { name: c.name, value: c.value })
        .collect();
    (module.registry, methods, constants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive;

    #[test]
    fn binary_and_json_roundtrip_for_a_primitive() {
        let serializer = Serializer::new(primitive::string_adapter());
        let value = Value::String(std::sync::Arc::from("hello"));
        let bytes = serializer.to_bytes(&value);
        assert_eq!(serializer.from_bytes(&bytes).unwrap(), value);

        let json = serializer.to_json(&value);
        assert_eq!(serializer.from_json(&json).unwrap(), value);
    }
}
