//! The module initializer: turns a [`crate::schema::Module`]
//! description into a finite graph of [`AdapterHandle`]s.
//!
//! Schemas can be mutually recursive (`Tree` has a field of type
//! `array<Tree>`), so building can't simply walk field lists depth-first --
//! a record reference that points at a record not yet built would have
//! nothing to point to. [`LazyRecordAdapter`] is the indirection that makes
//! this tractable: every record-typed field resolves, at build time, to a
//! lazy cell; a second pass then walks every record's adapter graph calling
//! [`Adapter::finalize`], which is where those cells get filled in. The cell
//! uses [`OnceLock`] rather than a three-state enum because the only states
//! that matter here are "resolved" and "not yet" -- there is no
//! in-progress-and-must-not-re-enter state to track, unlike the original
//! per-record class finalizer this replaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crate::adapter::{Adapter, AdapterHandle};
use crate::array::ArrayAdapter;
use crate::error::{JsonError, SchemaError, TypeError, WireError};
use crate::optional::OptionalAdapter;
use crate::primitive;
use crate::record::enum_::{ConstantSpec, EnumAdapter, ValueVariantSpec};
use crate::record::struct_::{FieldSpec, StructAdapter};
use crate::schema::{Module, RecordDef, TypeTerm};
use crate::value::{MutableValue, Value};
use crate::wire::{WireReader, WireWriter};

/// A record-typed field or variant payload whose target adapter may not
/// exist yet at the point the reference is built.
#[derive(Debug)]
pub struct LazyRecordAdapter {
    record_id: String,
    resolved: OnceLock<AdapterHandle>,
}

impl LazyRecordAdapter {
    fn new(record_id: impl Into<String>) -> Self {
        LazyRecordAdapter { record_id: record_id.into(), resolved: OnceLock::new() }
    }

    fn target(&self) -> &AdapterHandle {
        self.resolved
            .get()
            .expect("record reference left unresolved past init_module")
    }
}

impl Adapter for LazyRecordAdapter {
    fn default_value(&self) -> Value {
        self.target().default_value()
    }
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError> {
        self.target().to_frozen(input)
    }
    fn is_not_default(&self, value: &Value) -> bool {
        self.target().is_not_default(value)
    }
    fn encode_binary(&self, value: &Value, out: &mut WireWriter) {
        self.target().encode_binary(value, out)
    }
    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, WireError> {
        self.target().decode_binary(input)
    }
    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value {
        self.target().to_json(value, readable)
    }
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError> {
        self.target().from_json(json)
    }
    fn upgrade_to_mutable(&self, value: &Value) -> Result<MutableValue, TypeError> {
        self.target().upgrade_to_mutable(value)
    }
    fn finalize(&self, registry: &Registry) {
        if self.resolved.get().is_some() {
            return;
        }
        if let Some(handle) = registry.get_record(&self.record_id) {
            // Ignore the "already set" error: a second finalize call racing
            // (or simply repeating) this one is the documented no-op.
            let _ = self.resolved.set(handle);
        }
    }
    fn type_name(&self) -> String {
        self.record_id.clone()
    }
}

#[derive(Eq, PartialEq, Hash, Clone)]
struct ArrayKey {
    item: String,
    key_path: Option<Vec<String>>,
}

/// Owns every adapter built for one initialized module: the struct/enum
/// tables, and identity-shared caches for `optional<T>`/`array<T>` so that
/// two occurrences of the same composite type share one [`AdapterHandle`].
pub struct Registry {
    structs: RwLock<HashMap<String, Arc<StructAdapter>>>,
    enums: RwLock<HashMap<String, Arc<EnumAdapter>>>,
    by_id: RwLock<HashMap<String, AdapterHandle>>,
    optionals: Mutex<HashMap<String, AdapterHandle>>,
    arrays: Mutex<HashMap<ArrayKey, AdapterHandle>>,
    lazy_refs: Mutex<Vec<Arc<LazyRecordAdapter>>>,
}

impl Registry {
    fn new() -> Self {
        Registry {
            structs: RwLock::new(HashMap::new()),
            enums: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
            optionals: Mutex::new(HashMap::new()),
            arrays: Mutex::new(HashMap::new()),
            lazy_refs: Mutex::new(Vec::new()),
        }
    }

    pub fn get_struct(&self, record_id: &str) -> Option<Arc<StructAdapter>> {
        self.structs.read().unwrap().get(record_id).cloned()
    }

    pub fn get_enum(&self, record_id: &str) -> Option<Arc<EnumAdapter>> {
        self.enums.read().unwrap().get(record_id).cloned()
    }

    pub fn get_record(&self, record_id: &str) -> Option<AdapterHandle> {
        self.by_id.read().unwrap().get(record_id).cloned()
    }

    fn register(&self, record_id: String, handle: AdapterHandle) {
        self.by_id.write().unwrap().insert(record_id, handle);
    }

    fn optional_adapter(&self, inner: AdapterHandle) -> AdapterHandle {
        let key = inner.type_name();
        let mut cache = self.optionals.lock().unwrap();
        cache
            .entry(key)
            .or_insert_with(|| Arc::new(OptionalAdapter::new(inner)) as AdapterHandle)
            .clone()
    }

    fn array_adapter(&self, inner: AdapterHandle, key_path: Option<Vec<String>>) -> AdapterHandle {
        let key = ArrayKey { item: inner.type_name(), key_path: key_path.clone() };
        let mut cache = self.arrays.lock().unwrap();
        cache
            .entry(key)
            .or_insert_with(|| Arc::new(ArrayAdapter::new(inner, key_path)) as AdapterHandle)
            .clone()
    }

    /// Resolves a [`TypeTerm`] to an [`AdapterHandle`]. Safe to call both
    /// while a module is still being built (record references become lazy
    /// cells) and after it has finished initializing (record references
    /// resolve immediately, since the target is already registered).
    pub fn resolve(&self, term: &TypeTerm) -> AdapterHandle {
        match term {
            TypeTerm::Bool => primitive::bool_adapter(),
            TypeTerm::Int32 => primitive::int32_adapter(),
            TypeTerm::Int64 => primitive::int64_adapter(),
            TypeTerm::UInt64 => primitive::uint64_adapter(),
            TypeTerm::Float32 => primitive::float32_adapter(),
            TypeTerm::Float64 => primitive::float64_adapter(),
            TypeTerm::String => primitive::string_adapter(),
            TypeTerm::Bytes => primitive::bytes_adapter(),
            TypeTerm::Timestamp => primitive::timestamp_adapter(),
            TypeTerm::Optional(inner) => self.optional_adapter(self.resolve(inner)),
            TypeTerm::Array(inner, key_path) => {
                self.array_adapter(self.resolve(inner), key_path.clone())
            }
            TypeTerm::Record(id) => {
                let lazy = Arc::new(LazyRecordAdapter::new(id.clone()));
                lazy.finalize(self);
                self.lazy_refs.lock().unwrap().push(lazy.clone());
                lazy as AdapterHandle
            }
        }
    }
}

/// Everything [`init_module`] produces: the adapter registry plus the
/// resolved, ready-to-call methods and constants the schema declared.
pub struct InitializedModule {
    pub registry: Registry,
    pub methods: Vec<ResolvedMethod>,
    pub constants: Vec<ResolvedConstant>,
}

pub struct ResolvedMethod {
    pub name: String,
    pub number: u32,
    pub request: AdapterHandle,
    pub response: AdapterHandle,
}

pub struct ResolvedConstant {
    pub name: String,
    pub value: Value,
}

fn check_number_collisions(
    record_id: &str,
    live_numbers: &[u32],
    removed_numbers: &[u32],
) -> Result<(), SchemaError> {
    let mut seen = std::collections::HashSet::new();
    for &n in live_numbers {
        if !seen.insert(n) {
            return Err(SchemaError::FieldNumberCollision { record_id: record_id.to_string(), number: n });
        }
    }
    for &n in removed_numbers {
        if seen.contains(&n) {
            return Err(SchemaError::RemovedNumberCollision { record_id: record_id.to_string(), number: n });
        }
    }
    Ok(())
}

/// Builds and finalizes every adapter for `module`, validating schema
/// consistency eagerly so that no `SchemaError` can surface later from a
/// serializer built on top of the result.
pub fn init_module(module: &Module) -> Result<InitializedModule, SchemaError> {
    #[cfg(feature = "log")]
    log::debug!(
        "initializing module: {} records, {} methods, {} constants",
        module.records.len(),
        module.methods.len(),
        module.constants.len()
    );
    let registry = Registry::new();
    let mut seen_ids = std::collections::HashSet::new();

    for record in &module.records {
        let id = match record {
            RecordDef::Struct(s) => &s.id,
            RecordDef::Enum(e) => &e.id,
        };
        if !seen_ids.insert(id.clone()) {
            return Err(SchemaError::DuplicateRecordId(id.clone()));
        }
    }

    // Pass 1: build every record's adapter. Record-typed fields resolve
    // through `registry.resolve`, which hands back a lazy cell for anything
    // not registered yet.
    for record in &module.records {
        match record {
            RecordDef::Struct(def) => {
                let numbers: Vec<u32> = def.fields.iter().map(|f| f.number).collect();
                check_number_collisions(&def.id, &numbers, &def.removed_numbers)?;
                let fields = def
                    .fields
                    .iter()
                    .map(|f| FieldSpec {
                        number: f.number,
                        name: Arc::from(f.name.as_str()),
                        adapter: registry.resolve(&f.type_term),
                        has_mutable_getter: f.has_mutable_getter,
                    })
                    .collect();
                let adapter = Arc::new(StructAdapter::new(def.id.as_str(), fields, &def.removed_numbers));
                registry.register(def.id.clone(), adapter.clone());
                registry.structs.write().unwrap().insert(def.id.clone(), adapter);
            }
            RecordDef::Enum(def) => {
                let mut numbers: Vec<u32> = def.constants.iter().map(|c| c.number).collect();
                numbers.extend(def.value_variants.iter().map(|v| v.number));
                check_number_collisions(&def.id, &numbers, &def.removed_numbers)?;
                let constants = def
                    .constants
                    .iter()
                    .map(|c| ConstantSpec { number: c.number, name: Arc::from(c.name.as_str()) })
                    .collect();
                let value_variants = def
                    .value_variants
                    .iter()
                    .map(|v| ValueVariantSpec {
                        number: v.number,
                        name: Arc::from(v.name.as_str()),
                        adapter: registry.resolve(&v.type_term),
                    })
                    .collect();
                let adapter = Arc::new(EnumAdapter::new(def.id.as_str(), constants, value_variants));
                registry.register(def.id.clone(), adapter.clone());
                registry.enums.write().unwrap().insert(def.id.clone(), adapter);
            }
        }
    }

    // Pass 2: finalize every record so that every lazy cell created above
    // (and any created while resolving method/constant type terms) gets a
    // chance to resolve now that every record is registered.
    for handle in registry.by_id.read().unwrap().values() {
        handle.finalize(&registry);
    }

    let methods = module
        .methods
        .iter()
        .map(|m| ResolvedMethod {
            name: m.name.clone(),
            number: m.number,
            request: registry.resolve(&m.request),
            response: registry.resolve(&m.response),
        })
        .collect::<Vec<_>>();

    let mut constants = Vec::with_capacity(module.constants.len());
    for c in &module.constants {
        let adapter = registry.resolve(&c.type_term);
        let value = adapter
            .from_json(&c.json)
            .map_err(|_| SchemaError::MissingRecordReference(c.name.clone()))?;
        constants.push(ResolvedConstant { name: c.name.clone(), value });
    }

    for lazy in registry.lazy_refs.lock().unwrap().iter() {
        lazy.finalize(&registry);
        if registry.get_record(&lazy.record_id).is_none() {
            #[cfg(feature = "log")]
            log::warn!("module references unknown record id: {}", lazy.record_id);
            return Err(SchemaError::MissingRecordReference(lazy.record_id.clone()));
        }
    }

    Ok(InitializedModule { registry, methods, constants })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;

    fn tree_module() -> Module {
        Module {
            records: vec![RecordDef::Struct(StructDef {
                id: "test.Tree".to_string(),
                fields: vec![
                    FieldDef {
                        number: 1,
                        name: "value".to_string(),
                        type_term: TypeTerm::Int32,
                        has_mutable_getter: false,
                    },
                    FieldDef {
                        number: 2,
                        name: "children".to_string(),
                        type_term: TypeTerm::Array(Box::new(TypeTerm::Record("test.Tree".to_string())), None),
                        has_mutable_getter: false,
                    },
                ],
                removed_numbers: vec![],
            })],
            methods: vec![],
            constants: vec![],
        }
    }

    #[test]
    fn recursive_schema_finalizes_cleanly() {
        let initialized = init_module(&tree_module()).unwrap();
        let adapter = initialized.registry.get_struct("test.Tree").unwrap();
        let mut root = adapter.new_mutable();
        root.set("value", Value::Int32(1)).unwrap();
        let frozen = root.to_frozen();
        let mut buf = Vec::new();
        adapter.encode_binary(&frozen, &mut WireWriter::new(&mut buf));
        let mut reader = WireReader::new(&buf);
        assert_eq!(adapter.decode_binary(&mut reader).unwrap(), frozen);
    }

    #[test]
    fn duplicate_record_id_is_rejected() {
        let mut module = tree_module();
        let dup = module.records[0].clone();
        module.records.push(dup);
        assert!(matches!(init_module(&module), Err(SchemaError::DuplicateRecordId(_))));
    }

    #[test]
    fn missing_record_reference_is_rejected() {
        let module = Module {
            records: vec![RecordDef::Struct(StructDef {
                id: "test.Leaf".to_string(),
                fields: vec![FieldDef {
                    number: 1,
                    name: "other".to_string(),
                    type_term: TypeTerm::Record("test.Ghost".to_string()),
                    has_mutable_getter: false,
                }],
                removed_numbers: vec![],
            })],
            methods: vec![],
            constants: vec![],
        };
        assert!(matches!(init_module(&module), Err(SchemaError::MissingRecordReference(_))));
    }
}
