//! The `struct` record kind.
//!
//! A struct's wire and JSON-dense shapes are both positional, ordered by
//! field *number* -- the reserved number space `{field.number} ∪
//! removed_numbers` forms a slot sequence of length `max(reserved) + 1`, and
//! every encode/decode/JSON path dispatches through `slot_to_field` rather
//! than a field's position in the (internally sorted) field table, so a
//! struct with removed numbers still encodes and decodes correctly. Trailing
//! default slots are trimmed from the end by finding the highest non-default
//! slot and writing (or encoding to JSON) only up to it, with a zero
//! placeholder for any gap before that point. A slot number beyond every
//! number this schema version knows about is preserved verbatim in `tail` so
//! that round-tripping through an older binding doesn't lose data a newer
//! one wrote; a removed/gap slot that was itself carrying unrecognized data
//! is preserved the same way, keyed by its slot index.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::adapter::{Adapter, AdapterHandle};
use crate::error::{JsonError, TypeError, WireError};
use crate::registry::Registry;
use crate::value::{MutableValue, RawToken, Value};
use crate::wire::{WireReader, WireWriter};

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub number: u32,
    pub name: Arc<str>,
    pub adapter: AdapterHandle,
    /// Whether the mutable builder exposes a lazy `mutable_<name>`-style
    /// accessor for this field.
    pub has_mutable_getter: bool,
}

/// Adapter for one struct record. Shared by every `Value::Struct` instance
/// of that record; holds the field table and slot bookkeeping once.
#[derive(Debug)]
pub struct StructAdapter {
    record_id: Arc<str>,
    fields: Arc<[FieldSpec]>,
    /// `max(reserved numbers) + 1`, or 0 if there are no fields and no
    /// removed numbers.
    slot_count: usize,
    /// Length `slot_count`; `slot_to_field[n]` is the index into `fields`
    /// for live field number `n`, or `None` for a removed/reserved number.
    slot_to_field: Arc<[Option<usize>]>,
    name_index: Arc<HashMap<String, usize>>,
    names: Arc<[Arc<str>]>,
}

impl StructAdapter {
    /// `removed_numbers` extends the reserved number space beyond the live
    /// fields so their slots stay permanently reserved; schema-level
    /// validation (duplicate/collision checks) is the caller's job, in
    /// `crate::registry`.
    pub fn new(record_id: impl Into<Arc<str>>, fields: Vec<FieldSpec>, removed_numbers: &[u32]) -> Self {
        let fields: Arc<[FieldSpec]> = fields.into();
        let mut name_index = HashMap::with_capacity(fields.len());
        let mut names = Vec::with_capacity(fields.len());
        for (i, f) in fields.iter().enumerate() {
            name_index.insert(f.name.to_string(), i);
            names.push(f.name.clone());
        }
        let max_number = fields
            .iter()
            .map(|f| f.number)
            .chain(removed_numbers.iter().copied())
            .max();
        let slot_count = max_number.map(|n| n as usize + 1).unwrap_or(0);
        let mut slot_to_field = vec![None; slot_count];
        for (i, f) in fields.iter().enumerate() {
            slot_to_field[f.number as usize] = Some(i);
        }
        StructAdapter {
            record_id: record_id.into(),
            fields,
            slot_count,
            slot_to_field: slot_to_field.into(),
            name_index: Arc::new(name_index),
            names: names.into(),
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Builds a fresh [`MutableStruct`] with every field at its default.
    pub fn new_mutable(&self) -> MutableStruct {
        let values = self
            .fields
            .iter()
            .map(|f| MutableValue::Frozen(f.adapter.default_value()))
            .collect();
        MutableStruct {
            record_id: self.record_id.clone(),
            fields: self.fields.clone(),
            names: self.names.clone(),
            name_index: self.name_index.clone(),
            values,
        }
    }

    /// Demotes an already-frozen instance of this record to a mutable
    /// builder: scalars are copied, recursive upgrades (for
    /// `has_mutable_getter` fields) stay lazy.
    fn to_mutable_from_frozen(&self, s: &FrozenStruct) -> MutableStruct {
        let values = self
            .fields
            .iter()
            .map(|f| {
                MutableValue::Frozen(s.get_field_by_name(&f.name).unwrap_or_else(|| f.adapter.default_value()))
            })
            .collect();
        MutableStruct {
            record_id: self.record_id.clone(),
            fields: self.fields.clone(),
            names: self.names.clone(),
            name_index: self.name_index.clone(),
            values,
        }
    }

    fn default_values(&self) -> Vec<Value> {
        self.fields.iter().map(|f| f.adapter.default_value()).collect()
    }

    /// Returns the 0-based slot index of the last slot (named field, removed
    /// slot carrying preserved data, or tail entry) that is not at its
    /// default. `None` means every slot is default: the struct encodes as an
    /// empty array.
    fn highest_nondefault_slot(
        &self,
        values: &[Value],
        removed_tokens: &HashMap<usize, RawToken>,
        tail: &[RawToken],
    ) -> Option<usize> {
        for (i, tok) in tail.iter().enumerate().rev() {
            if !tok.is_zero() {
                return Some(self.slot_count + i);
            }
        }
        for slot in (0..self.slot_count).rev() {
            match self.slot_to_field[slot] {
                Some(idx) => {
                    if self.fields[idx].adapter.is_not_default(&values[idx]) {
                        return Some(slot);
                    }
                }
                None => {
                    if removed_tokens.get(&slot).is_some_and(|tok| !tok.is_zero()) {
                        return Some(slot);
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct MutableStruct {
    record_id: Arc<str>,
    fields: Arc<[FieldSpec]>,
    names: Arc<[Arc<str>]>,
    name_index: Arc<HashMap<String, usize>>,
    values: Vec<MutableValue>,
}

impl Clone for MutableStruct {
    fn clone(&self) -> Self {
        MutableStruct {
            record_id: self.record_id.clone(),
            fields: self.fields.clone(),
            names: self.names.clone(),
            name_index: self.name_index.clone(),
            values: self.values.clone(),
        }
    }
}

/// What [`MutableStruct::mutable`] hands back for a `has_mutable_getter`
/// field: the field's own mutable builder (struct fields) or a mutable list
/// of its elements (array fields).
pub enum MutableRef<'a> {
    Struct(&'a mut MutableStruct),
    Array(&'a mut Vec<MutableValue>),
}

impl MutableStruct {
    pub fn get(&self, name: &str) -> Option<Value> {
        let i = *self.name_index.get(name)?;
        Some(self.values[i].to_frozen_snapshot())
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), TypeError> {
        let i = *self.name_index.get(name).ok_or_else(|| TypeError {
            expected: format!("field of {}", self.record_id),
            found: name.to_string(),
        })?;
        let frozen = self.fields[i].adapter.to_frozen(value)?;
        self.values[i] = MutableValue::Frozen(frozen);
        Ok(())
    }

    /// The lazy `mutable_<name>` accessor: upgrades the field's stored value
    /// to its mutable form in place (only the first time), then returns a
    /// reference to it. Repeated calls return the same upgraded instance.
    pub fn mutable(&mut self, name: &str) -> Result<MutableRef<'_>, TypeError> {
        let i = *self.name_index.get(name).ok_or_else(|| TypeError {
            expected: format!("field of {}", self.record_id),
            found: name.to_string(),
        })?;
        if !self.fields[i].has_mutable_getter {
            return Err(TypeError {
                expected: format!("a field of {} declared with a mutable getter", self.record_id),
                found: self.fields[i].name.to_string(),
            });
        }
        if let MutableValue::Frozen(current) = &self.values[i] {
            let adapter = self.fields[i].adapter.clone();
            let upgraded = adapter.upgrade_to_mutable(current)?;
            self.values[i] = upgraded;
        }
        match &mut self.values[i] {
            MutableValue::Struct(s) => Ok(MutableRef::Struct(s)),
            MutableValue::Array(items) => Ok(MutableRef::Array(items)),
            MutableValue::Frozen(_) => unreachable!("just upgraded out of Frozen above"),
        }
    }

    pub fn to_frozen(mut self) -> Value {
        for i in 0..self.fields.len() {
            if matches!(&self.values[i], MutableValue::Frozen(_)) {
                continue;
            }
            let snapshot = self.values[i].to_frozen_snapshot();
            let coerced = self.fields[i]
                .adapter
                .to_frozen(snapshot)
                .expect("value produced by this struct's own adapter should always coerce");
            self.values[i] = MutableValue::Frozen(coerced);
        }
        let record_id = self.record_id.clone();
        let names = self.names.clone();
        let name_index = self.name_index.clone();
        let values = self
            .values
            .into_iter()
            .map(|v| match v {
                MutableValue::Frozen(v) => v,
                _ => unreachable!("every slot was coerced to Frozen above"),
            })
            .collect();
        Value::Struct(FrozenStruct::new(record_id, names, name_index, values, HashMap::new(), Vec::new()))
    }
}

/// A frozen struct instance: an immutable, hashable record value. Field
/// lookup by name is `O(1)` via a name->index map shared (not rebuilt) across
/// every instance of the same record, courtesy of [`StructAdapter`].
#[derive(Clone, Debug)]
pub struct FrozenStruct {
    inner: Arc<StructValueData>,
}

#[derive(Debug)]
struct StructValueData {
    record_id: Arc<str>,
    names: Arc<[Arc<str>]>,
    name_index: Arc<HashMap<String, usize>>,
    values: Vec<Value>,
    /// Preserved wire/JSON tokens at a removed/reserved slot that carried
    /// non-default data when decoded, keyed by slot index.
    removed_tokens: HashMap<usize, RawToken>,
    /// Preserved wire/JSON tokens for field numbers beyond every number this
    /// schema version declares.
    tail: Vec<RawToken>,
}

impl FrozenStruct {
    pub fn new(
        record_id: Arc<str>,
        names: Arc<[Arc<str>]>,
        name_index: Arc<HashMap<String, usize>>,
        values: Vec<Value>,
        removed_tokens: HashMap<usize, RawToken>,
        tail: Vec<RawToken>,
    ) -> Self {
        FrozenStruct {
            inner: Arc::new(StructValueData {
                record_id,
                names,
                name_index,
                values,
                removed_tokens,
                tail,
            }),
        }
    }

    #[cfg(test)]
    pub fn for_test(fields: Vec<(String, Value)>) -> Self {
        let mut name_index = HashMap::new();
        let mut names = Vec::new();
        let mut values = Vec::new();
        for (i, (name, value)) in fields.into_iter().enumerate() {
            name_index.insert(name.clone(), i);
            names.push(Arc::from(name.as_str()));
            values.push(value);
        }
        FrozenStruct::new(
            Arc::from("test.Record"),
            names.into(),
            Arc::new(name_index),
            values,
            HashMap::new(),
            Vec::new(),
        )
    }

    pub fn record_id(&self) -> &str {
        &self.inner.record_id
    }

    pub fn get_field_by_name(&self, name: &str) -> Option<Value> {
        let i = *self.inner.name_index.get(name)?;
        Some(self.inner.values[i].clone())
    }

    pub fn field_names(&self) -> &[Arc<str>] {
        &self.inner.names
    }
}

// Equality and hash deliberately exclude `removed_tokens`: a removed slot's
// preserved bytes affect only binary re-encoding, not the struct's value
// identity (dense JSON always renders a removed slot as `0` regardless of
// what was preserved there).
impl PartialEq for FrozenStruct {
    fn eq(&self, other: &Self) -> bool {
        self.inner.record_id == other.inner.record_id
            && self.inner.values == other.inner.values
            && self.inner.tail == other.inner.tail
    }
}
impl Eq for FrozenStruct {}

impl Hash for FrozenStruct {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.record_id.hash(state);
        self.inner.values.hash(state);
        self.inner.tail.hash(state);
    }
}

impl Adapter for StructAdapter {
    fn default_value(&self) -> Value {
        Value::Struct(FrozenStruct::new(
            self.record_id.clone(),
            self.names.clone(),
            self.name_index.clone(),
            self.default_values(),
            HashMap::new(),
            Vec::new(),
        ))
    }

    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        match input {
            Value::Struct(s) if s.record_id() == self.record_id.as_ref() => {
                // Already built by this adapter (or an equivalent one):
                // re-coerce every field in case it came from a looser
                // construction path (e.g. a JSON round trip via another
                // binding).
                let mut values = self.default_values();
                for (i, f) in self.fields.iter().enumerate() {
                    if let Some(v) = s.get_field_by_name(&f.name) {
                        values[i] = f.adapter.to_frozen(v)?;
                    }
                }
                Ok(Value::Struct(FrozenStruct::new(
                    self.record_id.clone(),
                    self.names.clone(),
                    self.name_index.clone(),
                    values,
                    HashMap::new(),
                    Vec::new(),
                )))
            }
            other => Err(TypeError {
                expected: self.record_id.to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn is_not_default(&self, value: &Value) -> bool {
        if let Value::Struct(s) = value {
            self.highest_nondefault_slot(&s.inner.values, &s.inner.removed_tokens, &s.inner.tail)
                .is_some()
        } else {
            false
        }
    }

    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        let Value::Struct(s) = value else {
            let _ = out.write_array_header(0);
            return;
        };
        let highest = self.highest_nondefault_slot(&s.inner.values, &s.inner.removed_tokens, &s.inner.tail);
        let len = highest.map(|i| i + 1).unwrap_or(0);
        let _ = out.write_array_header(len);
        for slot in 0..len {
            if slot < self.slot_count {
                match self.slot_to_field[slot] {
                    Some(idx) => self.fields[idx].adapter.encode_binary(&s.inner.values[idx], out),
                    None => match s.inner.removed_tokens.get(&slot) {
                        Some(tok) => tok.write_binary(out),
                        None => out.write_tag(0),
                    },
                }
            } else {
                let tail_i = slot - self.slot_count;
                match s.inner.tail.get(tail_i) {
                    Some(tok) => tok.write_binary(out),
                    None => out.write_tag(0),
                }
            }
        }
    }

    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, WireError> {
        let len = input.read_array_header()?;
        let mut values = self.default_values();
        let mut removed_tokens = HashMap::new();
        let mut tail = Vec::new();
        for slot in 0..len {
            if slot < self.slot_count {
                match self.slot_to_field[slot] {
                    Some(idx) => values[idx] = self.fields[idx].adapter.decode_binary(input)?,
                    None => {
                        // Removed/reserved slot: decode and discard through
                        // the field's own adapter would be wrong (there is
                        // none), so just consume one raw token and keep it
                        // only if it carries non-default data.
                        let raw = RawToken::Binary(input.read_raw_token()?);
                        if !raw.is_zero() {
                            removed_tokens.insert(slot, raw);
                        }
                    }
                }
            } else {
                tail.push(RawToken::Binary(input.read_raw_token()?));
            }
        }
        Ok(Value::Struct(FrozenStruct::new(
            self.record_id.clone(),
            self.names.clone(),
            self.name_index.clone(),
            values,
            removed_tokens,
            tail,
        )))
    }

    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value {
        let default_holder;
        let s = if let Value::Struct(s) = value {
            s
        } else {
            default_holder = self.default_value();
            match &default_holder {
                Value::Struct(s) => s,
                _ => unreachable!(),
            }
        };
        if readable {
            let mut obj = serde_json::Map::new();
            for (idx, f) in self.fields.iter().enumerate() {
                if f.adapter.is_not_default(&s.inner.values[idx]) {
                    obj.insert(f.name.to_string(), f.adapter.to_json(&s.inner.values[idx], true));
                }
            }
            serde_json::Value::Object(obj)
        } else {
            let highest = self.highest_nondefault_slot(&s.inner.values, &s.inner.removed_tokens, &s.inner.tail);
            let len = highest.map(|i| i + 1).unwrap_or(0);
            let mut out = Vec::with_capacity(len);
            for slot in 0..len {
                if slot < self.slot_count {
                    match self.slot_to_field[slot] {
                        Some(idx) => out.push(self.fields[idx].adapter.to_json(&s.inner.values[idx], false)),
                        // A removed slot always renders as a literal 0 in
                        // dense JSON; its preserved bytes (if any) only
                        // matter for binary re-encoding.
                        None => out.push(serde_json::Value::Number(0.into())),
                    }
                } else {
                    let tail_i = slot - self.slot_count;
                    out.push(
                        s.inner
                            .tail
                            .get(tail_i)
                            .map(RawToken::to_json)
                            .unwrap_or(serde_json::Value::Number(0.into())),
                    );
                }
            }
            serde_json::Value::Array(out)
        }
    }

    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        match json {
            serde_json::Value::Object(obj) => {
                let mut values = self.default_values();
                for (i, f) in self.fields.iter().enumerate() {
                    if let Some(v) = obj.get(f.name.as_ref()) {
                        values[i] = f.adapter.from_json(v)?;
                    }
                }
                Ok(Value::Struct(FrozenStruct::new(
                    self.record_id.clone(),
                    self.names.clone(),
                    self.name_index.clone(),
                    values,
                    HashMap::new(),
                    Vec::new(),
                )))
            }
            serde_json::Value::Array(elements) => {
                let mut values = self.default_values();
                let mut removed_tokens = HashMap::new();
                let mut tail = Vec::new();
                for (slot, element) in elements.iter().enumerate() {
                    if slot < self.slot_count {
                        match self.slot_to_field[slot] {
                            Some(idx) => values[idx] = self.fields[idx].adapter.from_json(element)?,
                            None => {
                                let tok = RawToken::Json(element.clone());
                                if !tok.is_zero() {
                                    removed_tokens.insert(slot, tok);
                                }
                            }
                        }
                    } else {
                        tail.push(RawToken::Json(element.clone()));
                    }
                }
                Ok(Value::Struct(FrozenStruct::new(
                    self.record_id.clone(),
                    self.names.clone(),
                    self.name_index.clone(),
                    values,
                    removed_tokens,
                    tail,
                )))
            }
            other => Err(JsonError(format!(
                "expected object or array for {}, found {other}",
                self.record_id
            ))),
        }
    }

    fn finalize(&self, registry: &Registry) {
        for f in self.fields.iter() {
            f.adapter.finalize(registry);
        }
    }

    fn upgrade_to_mutable(&self, value: &Value) -> Result<MutableValue, TypeError> {
        match value {
            Value::Struct(s) if s.record_id() == self.record_id.as_ref() => {
                Ok(MutableValue::Struct(self.to_mutable_from_frozen(s)))
            }
            other => Err(TypeError {
                expected: format!("{0} or mutable {0}", self.record_id),
                found: format!("{other:?}"),
            }),
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

    fn make_adapter() -> Arc<StructAdapter> {
        Arc::new(StructAdapter::new(
            "test.Point",
            vec![
                FieldSpec {
                    number: 1,
                    name: Arc::from("x"),
                    adapter: primitive::int32_adapter(),
                    has_mutable_getter: false,
                },
                FieldSpec {
                    number: 2,
                    name: Arc::from("y"),
                    adapter: primitive::int32_adapter(),
                    has_mutable_getter: false,
                },
            ],
            &[],
        ))
    }

    /// Mirrors the scenario where a field was removed: numbers 0 and 2 are
    /// live, number 1 is reserved. Slot placement must follow `number`, not
    /// the field's position in the (sorted) field table.
    fn make_adapter_with_removed_slot() -> Arc<StructAdapter> {
        Arc::new(StructAdapter::new(
            "test.Point3",
            vec![
                FieldSpec {
                    number: 0,
                    name: Arc::from("x"),
                    adapter: primitive::float32_adapter(),
                    has_mutable_getter: false,
                },
                FieldSpec {
                    number: 2,
                    name: Arc::from("y"),
                    adapter: primitive::float32_adapter(),
                    has_mutable_getter: false,
                },
            ],
            &[1],
        ))
    }

    #[test]
    fn trailing_defaults_are_trimmed_from_the_wire() {
        let adapter = make_adapter();
        let mut mutable = adapter.new_mutable();
        mutable.set("x", Value::Int32(5)).unwrap();
        let value = mutable.to_frozen();
        let mut buf = Vec::new();
        adapter.encode_binary(&value, &mut WireWriter::new(&mut buf));
        // array header (1 element) + one encoded int32 = 2 bytes.
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn binary_roundtrip_preserves_fields() {
        let adapter = make_adapter();
        let mut mutable = adapter.new_mutable();
        mutable.set("x", Value::Int32(5)).unwrap();
        mutable.set("y", Value::Int32(9)).unwrap();
        let value = mutable.to_frozen();
        let mut buf = Vec::new();
        adapter.encode_binary(&value, &mut WireWriter::new(&mut buf));
        let mut reader = WireReader::new(&buf);
        let decoded = adapter.decode_binary(&mut reader).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn unknown_trailing_number_is_preserved_across_binary_roundtrip() {
        let adapter = make_adapter();
        // Simulate data written by a newer schema with a third field.
        let mut buf = Vec::new();
        {
            let mut w = WireWriter::new(&mut buf);
            w.write_array_header(3).unwrap();
            w.write_int32(1);
            w.write_int32(2);
            w.write_string("future");
        }
        let mut reader = WireReader::new(&buf);
        let decoded = adapter.decode_binary(&mut reader).unwrap();
        let mut out = Vec::new();
        adapter.encode_binary(&decoded, &mut WireWriter::new(&mut out));
        assert_eq!(buf, out);
    }

    #[test]
    fn removed_number_reserves_its_slot_in_the_wire_and_dense_json() {
        // Point{x: float32#0, y: float32#2, removed: {1}}; x=1.5, y=2.5.
        let adapter = make_adapter_with_removed_slot();
        let mut mutable = adapter.new_mutable();
        mutable.set("x", Value::Float32(1.5)).unwrap();
        mutable.set("y", Value::Float32(2.5)).unwrap();
        let value = mutable.to_frozen();

        let dense = adapter.to_json(&value, false);
        assert_eq!(dense, serde_json::json!([1.5, 0, 2.5]));
        let readable = adapter.to_json(&value, true);
        assert_eq!(readable, serde_json::json!({"x": 1.5, "y": 2.5}));

        let mut buf = Vec::new();
        adapter.encode_binary(&value, &mut WireWriter::new(&mut buf));
        // tag 249 (3-element array), then x (float32 tag + 4 bytes), then
        // the removed slot's zero tag, then y (float32 tag + 4 bytes).
        assert_eq!(buf[0], crate::wire::TAG_ARRAY_3);

        let mut reader = WireReader::new(&buf);
        let decoded = adapter.decode_binary(&mut reader).unwrap();
        assert_eq!(decoded, value);

        let mut out = Vec::new();
        adapter.encode_binary(&decoded, &mut WireWriter::new(&mut out));
        assert_eq!(buf, out);
    }

    #[test]
    fn removed_slot_preserves_a_nonzero_token_across_roundtrip() {
        // A peer using a schema that still had field number 1 wrote a
        // non-default value there; this binding no longer knows the field
        // but must preserve and re-emit it verbatim.
        let adapter = make_adapter_with_removed_slot();
        let mut buf = Vec::new();
        {
            let mut w = WireWriter::new(&mut buf);
            w.write_array_header(2).unwrap();
            w.write_float32(1.0);
            w.write_string("leftover");
        }
        let mut reader = WireReader::new(&buf);
        let decoded = adapter.decode_binary(&mut reader).unwrap();
        let mut out = Vec::new();
        adapter.encode_binary(&decoded, &mut WireWriter::new(&mut out));
        assert_eq!(buf, out);
    }

    #[test]
    fn dense_json_decode_keeps_tail_and_drops_removed_slot_value() {
        // Decode dense JSON [1.5, 1, 2.5, true]: slot 1 is removed and
        // carries a nonzero value ("1"), slot 3 is beyond slot_count (3) and
        // becomes the unrecognized tail.
        let adapter = make_adapter_with_removed_slot();
        let json = serde_json::json!([1.5, 1, 2.5, true]);
        let decoded = adapter.from_json(&json).unwrap();

        let Value::Struct(s) = &decoded else { panic!("expected a struct") };
        assert_eq!(s.get_field_by_name("x"), Some(Value::Float32(1.5)));
        assert_eq!(s.get_field_by_name("y"), Some(Value::Float32(2.5)));

        let re_encoded = adapter.to_json(&decoded, false);
        assert_eq!(re_encoded, serde_json::json!([1.5, 0, 2.5, true]));
    }

    #[test]
    fn mutable_getter_lazily_upgrades_and_preserves_identity() {
        let nested = Arc::new(StructAdapter::new(
            "test.Nested",
            vec![FieldSpec {
                number: 1,
                name: Arc::from("n"),
                adapter: primitive::int32_adapter(),
                has_mutable_getter: false,
            }],
            &[],
        ));
        let outer = Arc::new(StructAdapter::new(
            "test.Outer",
            vec![FieldSpec {
                number: 1,
                name: Arc::from("child"),
                adapter: nested.clone(),
                has_mutable_getter: true,
            }],
            &[],
        ));

        let mut root = outer.new_mutable();
        {
            let first = root.mutable("child").unwrap();
            let MutableRef::Struct(child) = first else { panic!("expected a struct getter") };
            child.set("n", Value::Int32(7)).unwrap();
        }
        // A second call must return the same upgraded builder, not rebuild
        // (and therefore lose) the pending mutation made above.
        {
            let second = root.mutable("child").unwrap();
            let MutableRef::Struct(child) = second else { panic!("expected a struct getter") };
            assert_eq!(child.get("n"), Some(Value::Int32(7)));
        }

        let frozen = root.to_frozen();
        assert_eq!(
            frozen.get_attribute("child").and_then(|c| c.get_attribute("n")),
            Some(Value::Int32(7))
        );
    }

    #[test]
    fn mutable_getter_on_a_plain_field_is_rejected() {
        let adapter = make_adapter();
        let mut mutable = adapter.new_mutable();
        assert!(mutable.mutable("x").is_err());
    }
}
