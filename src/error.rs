//! Error types for schema flattening and record conversion.
//!
//! The split is deliberate: structural problems with a schema abort
//! flattening ([`SchemaError`]), and only a handful of per-record problems
//! abort a conversion ([`ConvertError`]). Everything else is recovered
//! locally. A field whose Avro type has no engine mapping is dropped from
//! the projection, and a single value that fails to coerce becomes a null
//! column plus a [`ConversionWarning`](crate::row::ConversionWarning) on the
//! produced row, so one bad column never discards a whole record.

use thiserror::Error;

/// Result alias for schema flattening and output-schema generation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result alias for per-record read/write conversion.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Structural schema problems. Fatal for the whole flattening call.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A named type is reachable from its own definition. Flattening such a
    /// schema would never terminate.
    #[error("recursive schema: type `{0}` is reachable from itself")]
    RecursiveType(String),

    /// A type reference points at a name that was never defined.
    #[error("unresolved reference to named type `{0}`")]
    UnresolvedRef(String),

    /// A union appeared directly inside another union.
    #[error("unions may not directly contain other unions")]
    NestedUnion,

    /// The generated output schema was rejected by the Avro parser,
    /// usually because a field name is not a valid Avro identifier.
    #[error("cannot build output schema: {0}")]
    OutputSchema(String),
}

/// Per-record conversion failures that cannot be recovered by substituting
/// null.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A date's epoch day count fell outside the representable calendar
    /// range. Unlike parse failures, silent wrapping here would corrupt
    /// data, so the whole record is rejected.
    #[error("field `{field}`: day count {days} is outside the representable date range")]
    DateOverflow {
        /// Engine name of the offending field.
        field: String,
        /// The day count that could not be represented.
        days: i64,
    },

    /// A configured textual default could not be parsed as the field's
    /// target type.
    #[error("field `{field}`: default value `{raw}` is not a valid {target}")]
    InvalidDefault {
        /// Engine name of the offending field.
        field: String,
        /// The raw default text.
        raw: String,
        /// The engine type the default was parsed against.
        target: crate::row::EngineType,
    },

    /// The reader was handed something other than an Avro record.
    #[error("expected an Avro record value, found {found}")]
    NotARecord {
        /// Short description of what was found instead.
        found: &'static str,
    },
}
