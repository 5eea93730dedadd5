//! The `array` and keyed-array type constructors.
//!
//! A keyed array is a plain array that also remembers a dotted attribute
//! path; [`FrozenArray`] builds the key -> index map lazily, the first time
//! anyone actually looks an item up by key, and never rebuilds it afterward
//! (the array is frozen, so the map can never go stale). Later keys win on a
//! duplicate, matching the *last write wins* rule used for the rest of the
//! dynamic value model.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::adapter::{Adapter, AdapterHandle};
use crate::error::{JsonError, TypeError, WireError};
use crate::registry::Registry;
use crate::value::{KeyValue, MutableValue, Value};
use crate::wire::{WireReader, WireWriter};

/// A frozen, possibly-keyed sequence of values. Cheaply cloneable: the item
/// vector and the lazily-built key index are both behind `Arc`.
#[derive(Clone, Debug)]
pub struct FrozenArray {
    inner: Arc<ArrayData>,
}

#[derive(Debug)]
struct ArrayData {
    items: Vec<Value>,
    key_path: Option<Arc<[String]>>,
    key_index: OnceLock<std::collections::HashMap<KeyValue, usize>>,
}

impl FrozenArray {
    pub fn new(items: Vec<Value>, key_path: Option<Arc<[String]>>) -> Self {
        FrozenArray {
            inner: Arc::new(ArrayData {
                items,
                key_path,
                key_index: OnceLock::new(),
            }),
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.inner.items
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }

    pub fn is_keyed(&self) -> bool {
        self.inner.key_path.is_some()
    }

    fn index(&self) -> Option<&std::collections::HashMap<KeyValue, usize>> {
        let key_path = self.inner.key_path.as_ref()?;
        Some(self.inner.key_index.get_or_init(|| {
            let mut map = std::collections::HashMap::with_capacity(self.inner.items.len());
            for (i, item) in self.inner.items.iter().enumerate() {
                if let Some(key) = item.resolve_key_path(key_path) {
                    // Last write wins: a later duplicate key displaces an
                    // earlier one.
                    map.insert(key, i);
                }
            }
            map
        }))
    }

    /// Looks up an item by its key, building the index on first use.
    /// Returns `None` for an unkeyed array or a key with no match.
    pub fn get_by_key(&self, key: &KeyValue) -> Option<&Value> {
        let i = *self.index()?.get(key)?;
        self.inner.items.get(i)
    }

    /// `true` if `self` and `other` are the exact same underlying instance
    /// (not merely `==`-equal). Used to verify the process-lifetime empty
    /// instance an [`ArrayAdapter`] hands out is actually shared.
    pub fn is_same_instance(&self, other: &FrozenArray) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for FrozenArray {
    fn eq(&self, other: &Self) -> bool {
        self.inner.items == other.inner.items
    }
}
impl Eq for FrozenArray {}

impl Hash for FrozenArray {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.items.hash(state);
    }
}

/// Adapter for `array<T>` and `array<T>(key_path)`. Identity-shared by the
/// registry so that two fields of the same item type and key path reuse the
/// same [`AdapterHandle`].
#[derive(Debug)]
pub struct ArrayAdapter {
    item: AdapterHandle,
    key_path: Option<Arc<[String]>>,
    /// The process-lifetime empty instance every empty array of this
    /// `(item, key_path)` aliases to, built on first use.
    empty: OnceLock<FrozenArray>,
}

impl ArrayAdapter {
    pub fn new(item: AdapterHandle, key_path: Option<Vec<String>>) -> Self {
        ArrayAdapter {
            item,
            key_path: key_path.map(|p| p.into()),
            empty: OnceLock::new(),
        }
    }

    /// The shared empty instance for this adapter's `(item, key_path)`.
    /// Every empty array this adapter produces -- via `build`, decode, or
    /// JSON decode -- is this exact instance.
    fn empty_instance(&self) -> &FrozenArray {
        self.empty
            .get_or_init(|| FrozenArray::new(Vec::new(), self.key_path.clone()))
    }

    fn build(&self, items: Vec<Value>) -> Value {
        if items.is_empty() {
            Value::Array(self.empty_instance().clone())
        } else {
            Value::Array(FrozenArray::new(items, self.key_path.clone()))
        }
    }
}

impl Adapter for ArrayAdapter {
    fn default_value(&self) -> Value {
        self.build(Vec::new())
    }

    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match input {
            Value::Array(arr) => {
                let mut items = Vec::with_capacity(arr.len());
                for item in arr.items() {
                    items.push(self.item.to_frozen(item.clone())?);
                }
                Ok(self.build(items))
            }
            other => Err(TypeError {
                expected: self.type_name(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn is_not_default(&self, value: &Value) -> bool {
        !matches!(value, Value::Array(a) if a.is_empty())
    }

    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        if let Value::Array(arr) = value {
            let _ = out.write_array_header(arr.len());
            for item in arr.items() {
                self.item.encode_binary(item, out);
            }
        } else {
            let _ = out.write_array_header(0);
        }
    }

    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, WireError> {
        let len = input.read_array_header()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.item.decode_binary(input)?);
        }
        Ok(self.build(items))
    }

    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value {
        let empty = self.empty_instance();
        let arr = if let Value::Array(a) = value { a } else { empty };
        serde_json::Value::Array(
            arr.items()
                .iter()
                .map(|item| self.item.to_json(item, readable))
                .collect(),
        )
    }

    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.item.from_json(element)?);
                }
                Ok(self.build(items))
            }
            other => Err(JsonError(format!("expected array, found {other}"))),
        }
    }

    fn finalize(&self, registry: &Registry) {
        self.item.finalize(registry);
    }

    fn upgrade_to_mutable(&self, value: &Value) -> Result<MutableValue, TypeError> {
        match value {
            Value::Array(arr) => {
                let items = arr.items().iter().map(|item| MutableValue::Frozen(item.clone())).collect();
                Ok(MutableValue::Array(items))
            }
            other => Err(TypeError {
                expected: format!("{0} or mutable {0}", self.type_name()),
                found: format!("{other:?}"),
            }),
        }
    }

    fn type_name(&self) -> String {
        match &self.key_path {
            Some(path) => format!("array<{}>({})", self.item.type_name(), path.join(".")),
            None => format!("array<{}>", self.item.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive;

    #[test]
    fn empty_array_is_default() {
        let adapter = ArrayAdapter::new(primitive::int32_adapter(), None);
        assert!(!adapter.is_not_default(&adapter.default_value()));
    }

    #[test]
    fn every_empty_array_from_this_adapter_is_the_same_instance() {
        let adapter = ArrayAdapter::new(primitive::int32_adapter(), None);
        let via_default = adapter.default_value();
        let via_build = adapter.build(Vec::new());
        let via_decode = {
            let mut buf = Vec::new();
            adapter.encode_binary(&via_default, &mut WireWriter::new(&mut buf));
            let mut reader = WireReader::new(&buf);
            adapter.decode_binary(&mut reader).unwrap()
        };
        let via_json = adapter.from_json(&serde_json::json!([])).unwrap();

        let Value::Array(a) = &via_default else { panic!("expected array") };
        for other in [&via_build, &via_decode, &via_json] {
            let Value::Array(b) = other else { panic!("expected array") };
            assert!(a.inner.items.is_empty() && b.inner.items.is_empty());
            assert!(Arc::ptr_eq(&a.inner, &b.inner), "expected the same shared empty instance");
        }
    }

    #[test]
    fn binary_roundtrip() {
        let adapter = ArrayAdapter::new(primitive::string_adapter(), None);
        let value = adapter
            .from_json(&serde_json::json!(["a", "b", "c"]))
            .unwrap();
        let mut buf = Vec::new();
        adapter.encode_binary(&value, &mut WireWriter::new(&mut buf));
        let mut reader = WireReader::new(&buf);
        assert_eq!(adapter.decode_binary(&mut reader).unwrap(), value);
    }

    #[test]
    fn keyed_lookup_prefers_the_last_duplicate() {
        let path: Arc<[String]> = Arc::from(vec!["id".to_string()]);
        let items = vec![
            Value::Struct(make_struct("a", 1)),
            Value::Struct(make_struct("b", 1)),
        ];
        let arr = FrozenArray::new(items, Some(path));
        let found = arr.get_by_key(&KeyValue::Int32(1)).unwrap();
        assert_eq!(found.get_attribute("name"), Some(Value::String(Arc::from("b"))));
    }

    fn make_struct(name: &str, id: i32) -> crate::record::struct_::FrozenStruct {
        use crate::record::struct_::FrozenStruct;
        FrozenStruct::for_test(vec![
            ("name".to_string(), Value::String(Arc::from(name))),
            ("id".to_string(), Value::Int32(id)),
        ])
    }
}
