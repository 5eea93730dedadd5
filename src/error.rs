use core::fmt::{self, Display, Formatter};

/// Error raised while building the adapter graph for a [`crate::schema::Module`].
///
/// These errors can only occur during [`crate::registry::init_module`]; once a
/// module has finished initializing, none of its serializers can produce a
/// `SchemaError`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SchemaError {
    /// Two records in the same module share the same record id.
    DuplicateRecordId(String),
    /// A field, constant, or method referenced a record id that no record in
    /// the module defines.
    MissingRecordReference(String),
    /// Two fields (or constants/value variants) of the same record reused a
    /// field number.
    FieldNumberCollision {
        /// The record whose numbering is inconsistent.
        record_id: String,
        /// The reused number.
        number: u32,
    },
    /// A live field number collided with one of the record's `removed_numbers`.
    RemovedNumberCollision {
        /// The record whose numbering is inconsistent.
        record_id: String,
        /// The offending number.
        number: u32,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::DuplicateRecordId(id) => {
                write!(f, "duplicate record id: {id}")
            }
            SchemaError::MissingRecordReference(id) => {
                write!(f, "no record registered for id: {id}")
            }
            SchemaError::FieldNumberCollision { record_id, number } => {
                write!(f, "field number {number} used twice in record {record_id}")
            }
            SchemaError::RemovedNumberCollision { record_id, number } => {
                write!(
                    f,
                    "number {number} is both live and removed in record {record_id}"
                )
            }
        }
    }
}

/// Error raised when a value handed to a struct constructor (or to
/// [`crate::adapter::Adapter::to_frozen`]) is not an instance of the declared
/// record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeError {
    /// The qualified name of the record (or primitive kind) that was expected.
    pub expected: String,
    /// A short description of what was actually found.
    pub found: String,
}

impl Display for TypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "expected: {}; found: {}", self.expected, self.found)
    }
}

/// Error raised by any attempt to set or delete an attribute on a frozen
/// record or on a published [`crate::serializer::Serializer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrozenMutation;

impl Display for FrozenMutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("cannot mutate a frozen value")
    }
}

/// Error raised while decoding the binary wire format.
///
/// These are fatal for the current decode call: partial decode state is not
/// exposed, and the caller must discard the buffer position it was decoding
/// from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum WireError {
    /// The tag byte did not match any entry in the wire tag table.
    UnsupportedTag(u8),
    /// The input ended before a token could be fully read.
    Eof,
    /// A length prefix described a length that does not fit the target's
    /// representable range.
    LengthOverflow,
}

impl Display for WireError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WireError::UnsupportedTag(tag) => write!(f, "unsupported wire tag: {tag}"),
            WireError::Eof => f.write_str("hit the end of buffer, expected more data"),
            WireError::LengthOverflow => f.write_str("length prefix overflowed"),
        }
    }
}

/// Error raised while decoding JSON (either flavor) into a frozen value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JsonError(pub String);

impl Display for JsonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid JSON for this type: {}", self.0)
    }
}

/// The error type used throughout this crate.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// See [`SchemaError`].
    Schema(SchemaError),
    /// See [`TypeError`].
    Type(TypeError),
    /// See [`FrozenMutation`].
    FrozenMutation,
    /// See [`WireError`].
    Wire(WireError),
    /// See [`JsonError`].
    Json(JsonError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => Display::fmt(e, f),
            Error::Type(e) => Display::fmt(e, f),
            Error::FrozenMutation => Display::fmt(&FrozenMutation, f),
            Error::Wire(e) => Display::fmt(e, f),
            Error::Json(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Error {}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Error::Schema(e)
    }
}

impl From<TypeError> for Error {
    fn from(e: TypeError) -> Self {
        Error::Type(e)
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Error::Wire(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Error::Json(e)
    }
}

/// The `Result` type used throughout this crate.
pub type Result<T> = ::core::result::Result<T, Error>;
