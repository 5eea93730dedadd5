#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod array;
pub mod error;
pub mod optional;
pub mod primitive;
pub mod record;
pub mod registry;
pub mod schema;
pub mod serializer;
pub mod value;
pub mod wire;

pub use adapter::{Adapter, AdapterHandle};
pub use error::{Error, Result};
pub use registry::{init_module, InitializedModule, Registry};
pub use schema::{Module, TypeTerm};
pub use serializer::{Constant, Method, Serializer};
pub use value::{KeyValue, MutableValue, Value};
