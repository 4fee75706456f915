//! Type mapping between the Avro format and the engine row model.
//!
//! [`FormatType`] is the closed set of leaf shapes this crate understands
//! on the Avro side. Classification ([`FormatType::of`]) is partial: a
//! schema node outside the set has no mapping and the walker drops that
//! field from the projection. The forward table
//! ([`FormatType::engine_type`]) is total, and logical types win over
//! their carrier primitives because they are distinct [`FormatType`]
//! variants to begin with. The inverse table ([`default_format_type`]) is
//! used when a projection is generated from engine types, i.e. when the
//! writer builds its output schema.

use apache_avro::schema::Schema;
use serde::{Deserialize, Serialize};

use crate::row::EngineType;

/// The Avro-side shape of a flattened leaf field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Strings and enum symbols read identically, so they share a variant.
    StringOrEnum,
    Bytes,
    Fixed,
    /// `int` carrying the `date` logical type: days since the Unix epoch.
    Date,
    /// `bytes`/`fixed` carrying the `decimal` logical type.
    Decimal { precision: u32, scale: u32 },
    /// `long` carrying the `timestamp-millis` logical type.
    TimestampMillis,
}

impl FormatType {
    /// Classify an Avro schema node.
    ///
    /// Returns `None` for nodes with no engine mapping (for example
    /// `uuid`, `time-millis` or `duration`). Callers treat `None` as
    /// "unsupported, drop the field", not as an error.
    pub fn of(schema: &Schema) -> Option<FormatType> {
        match schema {
            Schema::Boolean => Some(FormatType::Boolean),
            Schema::Int => Some(FormatType::Int32),
            Schema::Long => Some(FormatType::Int64),
            Schema::Float => Some(FormatType::Float32),
            Schema::Double => Some(FormatType::Float64),
            Schema::String | Schema::Enum(_) => Some(FormatType::StringOrEnum),
            Schema::Bytes => Some(FormatType::Bytes),
            Schema::Fixed(_) => Some(FormatType::Fixed),
            Schema::Date => Some(FormatType::Date),
            Schema::Decimal(decimal) => Some(FormatType::Decimal {
                precision: decimal.precision as u32,
                scale: decimal.scale as u32,
            }),
            Schema::TimestampMillis => Some(FormatType::TimestampMillis),
            _ => None,
        }
    }

    /// The engine type this format type projects to. Total over all
    /// variants.
    pub fn engine_type(self) -> EngineType {
        match self {
            FormatType::Boolean => EngineType::Boolean,
            FormatType::Int32 | FormatType::Int64 => EngineType::Integer,
            FormatType::Float32 | FormatType::Float64 => EngineType::Number,
            FormatType::StringOrEnum => EngineType::String,
            FormatType::Bytes | FormatType::Fixed => EngineType::Binary,
            FormatType::Date => EngineType::Date,
            FormatType::Decimal { .. } => EngineType::BigNumber,
            FormatType::TimestampMillis => EngineType::Timestamp,
        }
    }
}

/// The default Avro-side type used when a projection is generated from an
/// engine type.
///
/// BigNumber intentionally maps to `Float64`: big numbers are narrowed to
/// a 64-bit float on the wire. Inet addresses travel as their string
/// form.
pub fn default_format_type(engine: EngineType) -> FormatType {
    match engine {
        EngineType::String | EngineType::InetAddress => FormatType::StringOrEnum,
        EngineType::Integer => FormatType::Int64,
        EngineType::Number | EngineType::BigNumber => FormatType::Float64,
        EngineType::Boolean => FormatType::Boolean,
        EngineType::Binary => FormatType::Bytes,
        EngineType::Date => FormatType::Date,
        EngineType::Timestamp => FormatType::TimestampMillis,
    }
}
