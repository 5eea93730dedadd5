//! The type adapter: a per-schema-type strategy for defaults, normalization,
//! binary/JSON encode and decode, and finalization.
//!
//! In many serialization frameworks this capability set is realized by
//! generating code per type; here it is a narrow trait object, dispatched
//! dynamically. Composite adapters (array, optional) are identity-shared through the
//! [`crate::registry::Registry`] caches so that recursive schemas resolve to
//! a finite adapter graph.

use std::sync::Arc;

use crate::error::{JsonError, TypeError, WireError};
use crate::registry::Registry;
use crate::value::{MutableValue, Value};
use crate::wire::{WireReader, WireWriter};

/// The capability set every schema type's adapter implements.
pub trait Adapter: Send + Sync + std::fmt::Debug {
    /// The canonical default value for this type (used by struct fields and
    /// by `find_or_default`).
    fn default_value(&self) -> Value;

    /// Coerces an arbitrary user input to this type's canonical frozen
    /// representation. Called on every assignment into a frozen record.
    fn to_frozen(&self, input: Value) -> Result<Value, TypeError>;

    /// Cheap predicate used to trim trailing default fields on encode.
    fn is_not_default(&self, value: &Value) -> bool;

    fn encode_binary(&self, value: &Value, out: &mut WireWriter);

    fn decode_binary(&self, input: &mut WireReader) -> Result<Value, WireError>;

    fn to_json(&self, value: &Value, readable: bool) -> serde_json::Value;

    /// Accepts JSON in either flavor and returns the canonical frozen form;
    /// must tolerate extraneous keys or trailing positional entries.
    fn from_json(&self, json: &serde_json::Value) -> Result<Value, JsonError>;

    /// Called once post-construction to resolve child type references
    /// through the registry. Idempotent: a second call is a no-op (guarded
    /// by the three-state flag on composite adapters that own one; leaf
    /// adapters have nothing to resolve and this is simply a no-op for them).
    fn finalize(&self, registry: &Registry) {
        let _ = registry;
    }

    /// A short name used in [`TypeError`] messages (e.g. `"int32"`,
    /// `"myapp.User"`).
    fn type_name(&self) -> String;

    /// Upgrades a frozen value to its mutable form, for a struct field
    /// declared `has_mutable_getter`. Only struct and array adapters
    /// override this; every other kind keeps the default, which always
    /// fails, since there is no mutable counterpart to upgrade to.
    fn upgrade_to_mutable(&self, value: &Value) -> Result<MutableValue, TypeError> {
        Err(TypeError {
            expected: format!("{0} or mutable {0}", self.type_name()),
            found: format!("{value:?}"),
        })
    }
}

/// A shared handle to an adapter. `Arc<dyn Adapter>` rather than a boxed enum
/// so that composite adapters (array, optional) can be identity-shared: two
/// array fields with the same item adapter and key path resolve to the exact
/// same `AdapterHandle`, giving recursive schemas a finite adapter graph.
pub type AdapterHandle = Arc<dyn Adapter>;
