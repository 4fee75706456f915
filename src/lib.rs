//! # avroflat
//!
//! A **schema flattening and row conversion library** bridging Apache
//! Avro's nested, self-describing format and the flat, strongly-typed
//! tabular row model of a batch-processing engine.
//!
//! Two symmetric problems are solved:
//! - **Projection**: walk an arbitrary nested Avro schema and produce an
//!   ordered list of named, typed leaf fields with deterministic,
//!   collision-free names and reversible paths (a [`SchemaDescription`]).
//! - **Conversion**: turn individual Avro records into flat typed rows
//!   and back, using that projection, with default-value fallback and
//!   tolerant handling of per-value conversion failure.
//!
//! ## Quick Start
//!
//! ```
//! use apache_avro::Schema;
//! use apache_avro::types::Value;
//! use avroflat::{EngineValue, RecordReader, SchemaWalker};
//!
//! let schema = Schema::parse_str(
//!     r#"{
//!         "type": "record",
//!         "name": "sensor",
//!         "fields": [
//!             {"name": "id", "type": "string"},
//!             {"name": "reading", "type": ["null", "double"]}
//!         ]
//!     }"#,
//! )?;
//!
//! // Derive the flat projection from the nested schema.
//! let description = SchemaWalker::new().flatten(&schema)?;
//! assert_eq!(description.fields()[0].engine_field_name, "id");
//!
//! // Convert records against it.
//! let reader = RecordReader::new(description);
//! let record = Value::Record(vec![
//!     ("id".into(), Value::String("s-1".into())),
//!     ("reading".into(), Value::Union(1, Box::new(Value::Double(20.5)))),
//! ]);
//! let row = reader.read(&record)?;
//! assert_eq!(row.get("reading"), Some(&EngineValue::Number(20.5)));
//! # anyhow::Result::<()>::Ok(())
//! ```
//!
//! ## Core Concepts
//!
//! ### SchemaDescription
//!
//! A [`SchemaDescription`] is an ordered list of [`FieldDescriptor`]s,
//! one per flattened leaf. It is built once per schema version, either
//! derived automatically by the [`SchemaWalker`] or authored by the
//! caller (descriptions round-trip through JSON for that), and is
//! immutable afterwards. Readers and writers share it freely: reading or
//! writing a record is a single synchronous call with no internal state.
//!
//! ### Flattening
//!
//! The walker descends through records, arrays, maps and unions.
//! Containers collapse into path markers (`tags[0]`, `attrs[*key*]`),
//! union nullability becomes `allow_null`, and a union offering several
//! leaf alternatives collapses to a string column. Logical types (`date`,
//! `decimal`, `timestamp-millis`) override their carrier primitives.
//! Leaf types with no engine mapping are dropped, not errors.
//!
//! ### Conversion
//!
//! Conversion is a function of *two* types: the Avro type observed on the
//! value at read time, and the engine type the descriptor asks for. A
//! `long` can become an integer, a number, a string, a big number, a
//! boolean, a timestamp or a date. Values that fail to coerce become null
//! columns, and the cause is kept as a structured warning on the
//! [`Row`] rather than discarded. Only date-epoch overflow aborts a
//! record.
//!
//! ## Module Overview
//!
//! - [`mapper`] - the format/engine type tables
//! - [`walker`] - nested schema to flat field list
//! - [`schema`] - field descriptors and the legacy name codec
//! - [`row`] - the engine row model ([`Row`], [`Column`], [`EngineValue`])
//! - [`reader`] - Avro record to row
//! - [`writer`] - row to Avro record
//! - [`error`] - the error taxonomy

pub mod error;
pub mod mapper;
pub mod reader;
pub mod row;
pub mod schema;
pub mod walker;
pub mod writer;

// General re-exports
pub use error::{ConvertError, ConvertResult, SchemaError, SchemaResult};
pub use mapper::{FormatType, default_format_type};
pub use reader::RecordReader;
pub use row::{Column, ConversionWarning, EngineType, EngineValue, Row};
pub use schema::{
    FieldDescriptor, LEGACY_DELIMITER, SchemaDescription, legacy_field_name,
    split_legacy_field_name,
};
pub use walker::{NameStrategy, SchemaWalker, WalkerOptions};
pub use writer::RecordWriter;
