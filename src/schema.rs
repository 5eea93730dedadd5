//! The schema surface: plain data describing a module's
//! records, methods, and constants. This is deliberately inert -- building
//! one of these doesn't touch the registry or validate anything; it is only
//! when [`crate::registry::init_module`] consumes a [`Module`] that the
//! schema becomes a working set of adapters. There is no derive macro or
//! builder type here by design (see the crate's top-level docs): a schema
//! arrives at runtime, so authoring one is just assembling these plain
//! structs, the same way a reflection tree gets assembled by hand in tests
//! rather than through a fluent builder.

/// One position in a type expression: a primitive, `optional<T>`,
/// `array<T>` (with an optional dotted key path), or a reference to a record
/// declared elsewhere in the module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTerm {
    Bool,
    Int32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Timestamp,
    Optional(Box<TypeTerm>),
    /// The key path, if any, is a dotted attribute chain relative to the
    /// item type, e.g. `vec!["id".into()]` for `.id`.
    Array(Box<TypeTerm>, Option<Vec<String>>),
    /// A forward or backward reference to another record in the same
    /// module, resolved by id at [`crate::registry::init_module`] time.
    Record(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub number: u32,
    pub name: String,
    pub type_term: TypeTerm,
    /// Whether the mutable builder exposes a lazy `mutable_<name>`-style
    /// accessor for this field (struct and array types only).
    pub has_mutable_getter: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub id: String,
    pub fields: Vec<FieldDef>,
    /// Numbers once assigned to a field that no longer exists. Kept so a
    /// future field can't reuse the number and silently misinterpret old
    /// wire data.
    pub removed_numbers: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantDef {
    pub number: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueVariantDef {
    pub number: u32,
    pub name: String,
    pub type_term: TypeTerm,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDef {
    pub id: String,
    pub constants: Vec<ConstantDef>,
    pub value_variants: Vec<ValueVariantDef>,
    pub removed_numbers: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordDef {
    Struct(StructDef),
    Enum(EnumDef),
}

impl RecordDef {
    pub fn id(&self) -> &str {
        match self {
            RecordDef::Struct(s) => &s.id,
            RecordDef::Enum(e) => &e.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub number: u32,
    pub request: TypeTerm,
    pub response: TypeTerm,
}

/// A named constant value declared directly in the schema (not a field
/// default): its JSON literal is decoded once, at
/// [`crate::registry::init_module`] time, via the same `from_json` path a
/// wire message would use.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantValueDef {
    pub name: String,
    pub type_term: TypeTerm,
    pub json: serde_json::Value,
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    pub records: Vec<RecordDef>,
    pub methods: Vec<MethodDef>,
    pub constants: Vec<ConstantValueDef>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }
}

/// A plain constructor, not a derive or builder: callers write
/// `field(1, "name", TypeTerm::String)` and assemble a record by hand.
pub fn field(number: u32, name: impl Into<String>, type_term: TypeTerm) -> FieldDef {
    FieldDef { number, name: name.into(), type_term, has_mutable_getter: false }
}

/// Like [`field`], but declares a `mutable_<name>`-style lazy accessor on
/// the record's mutable builder (struct and array types only).
pub fn field_with_mutable_getter(number: u32, name: impl Into<String>, type_term: TypeTerm) -> FieldDef {
    FieldDef { number, name: name.into(), type_term, has_mutable_getter: true }
}

pub fn struct_def(id: impl Into<String>, fields: Vec<FieldDef>) -> StructDef {
    StructDef { id: id.into(), fields, removed_numbers: Vec::new() }
}

pub fn struct_def_with_removed(
    id: impl Into<String>,
    fields: Vec<FieldDef>,
    removed_numbers: Vec<u32>,
) -> StructDef {
    StructDef { id: id.into(), fields, removed_numbers }
}

pub fn constant(number: u32, name: impl Into<String>) -> ConstantDef {
    ConstantDef { number, name: name.into() }
}

pub fn value_variant(number: u32, name: impl Into<String>, type_term: TypeTerm) -> ValueVariantDef {
    ValueVariantDef { number, name: name.into(), type_term }
}

pub fn enum_def(
    id: impl Into<String>,
    constants: Vec<ConstantDef>,
    value_variants: Vec<ValueVariantDef>,
) -> EnumDef {
    EnumDef { id: id.into(), constants, value_variants, removed_numbers: Vec::new() }
}

pub fn method(name: impl Into<String>, number: u32, request: TypeTerm, response: TypeTerm) -> MethodDef {
    MethodDef { name: name.into(), number, request, response }
}

pub fn constant_value(
    name: impl Into<String>,
    type_term: TypeTerm,
    json: serde_json::Value,
) -> ConstantValueDef {
    ConstantValueDef { name: name.into(), type_term, json }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_def_reports_its_id_for_either_kind() {
        let s = RecordDef::Struct(struct_def("m.S", vec![]));
        let e = RecordDef::Enum(enum_def("m.E", vec![], vec![]));
        assert_eq!(s.id(), "m.S");
        assert_eq!(e.id(), "m.E");
    }
}
