//! Conversion of flat engine rows into Avro records.
//!
//! A [`RecordWriter`] is built once from a
//! [`SchemaDescription`](crate::schema::SchemaDescription). At
//! construction it generates the flat Avro output schema implied by the
//! description: one field per descriptor, typed by the inverse mapping in
//! [`default_format_type`], wrapped in `["null", T]` when the descriptor
//! allows null. [`write`](RecordWriter::write) then produces one record
//! per row.
//!
//! The write branch for each column is chosen by the engine type of the
//! row's own value, not the descriptor: the writer trusts the row's
//! typing, mirroring the declared column types of the tabular source
//! upstream. Absent values fall back to the descriptor's textual default
//! (parsed per target type), then to null for nullable fields, then to
//! the target type's zero value. Big numbers are narrowed to a 64-bit
//! float on the wire, and dates are encoded as a day count since the Unix
//! epoch; a day count outside the representable range is a fatal error,
//! never wrapped.

use apache_avro::schema::Schema;
use apache_avro::types::Value;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

use crate::error::{ConvertError, ConvertResult, SchemaError, SchemaResult};
use crate::mapper::{FormatType, default_format_type};
use crate::row::{EngineType, EngineValue, Row, epoch_days_from_date, parse_bool};
use crate::schema::{FieldDescriptor, SchemaDescription};

/// Converts [`Row`]s into Avro records against a fixed description.
///
/// Writers hold no per-record state; one instance may be shared across
/// threads.
#[derive(Clone, Debug)]
pub struct RecordWriter {
    description: SchemaDescription,
    schema: Schema,
}

impl RecordWriter {
    /// Build a writer over `description`, generating its output schema.
    ///
    /// # Errors
    /// [`SchemaError::OutputSchema`] when the description cannot form a
    /// valid Avro record schema, e.g. a field name that is not a valid
    /// Avro identifier or two descriptors sharing a format field name.
    pub fn new(description: SchemaDescription) -> SchemaResult<Self> {
        let schema = build_output_schema(&description)?;
        Ok(Self {
            description,
            schema,
        })
    }

    /// The generated flat Avro schema records are written against. Hand
    /// this to the container-file writer.
    pub fn output_schema(&self) -> &Schema {
        &self.schema
    }

    /// The description this writer works from.
    pub fn description(&self) -> &SchemaDescription {
        &self.description
    }

    /// Convert one row into a record.
    ///
    /// # Errors
    /// [`ConvertError::DateOverflow`] when a date cannot be encoded as a
    /// day count, and [`ConvertError::InvalidDefault`] when a configured
    /// default does not parse as its target type.
    pub fn write(&self, row: &Row) -> ConvertResult<Value> {
        let mut fields = Vec::with_capacity(self.description.len());
        for descriptor in self.description.fields() {
            let value = match row.get(&descriptor.engine_field_name) {
                Some(value) => encode_value(descriptor, value)?,
                None => fallback_value(descriptor)?,
            };
            fields.push((descriptor.format_field_name.clone(), wrap(descriptor, value)));
        }
        Ok(Value::Record(fields))
    }
}

/// Encode a present row value, branching on the value's own engine type.
fn encode_value(descriptor: &FieldDescriptor, value: &EngineValue) -> ConvertResult<Value> {
    Ok(match value {
        EngineValue::String(s) => Value::String(s.clone()),
        EngineValue::InetAddress(ip) => Value::String(ip.to_string()),
        EngineValue::Integer(n) => Value::Long(*n),
        EngineValue::Number(x) => Value::Double(*x),
        EngineValue::BigNumber(d) => Value::Double(d.to_f64().unwrap_or_default()),
        EngineValue::Boolean(b) => Value::Boolean(*b),
        EngineValue::Binary(bytes) => Value::Bytes(bytes.clone()),
        EngineValue::Date(date) => Value::Date(day_count(descriptor, *date)?),
        EngineValue::Timestamp(ts) => Value::TimestampMillis(ts.timestamp_millis()),
    })
}

/// The value written when the row has no value for a descriptor.
fn fallback_value(descriptor: &FieldDescriptor) -> ConvertResult<Value> {
    match &descriptor.default_value {
        Some(raw) => parse_default(descriptor, raw),
        None if descriptor.allow_null => Ok(Value::Null),
        None => Ok(zero_value(descriptor)),
    }
}

fn parse_default(descriptor: &FieldDescriptor, raw: &str) -> ConvertResult<Value> {
    let invalid = || ConvertError::InvalidDefault {
        field: descriptor.engine_field_name.clone(),
        raw: raw.to_string(),
        target: descriptor.engine_type,
    };
    match descriptor.engine_type {
        EngineType::String | EngineType::InetAddress => Ok(Value::String(raw.to_string())),
        EngineType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|_| invalid()),
        EngineType::Number => raw
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| invalid()),
        EngineType::BigNumber => raw
            .trim()
            .parse::<Decimal>()
            .map(|d| Value::Double(d.to_f64().unwrap_or_default()))
            .map_err(|_| invalid()),
        EngineType::Boolean => parse_bool(raw).map(Value::Boolean).ok_or_else(invalid),
        EngineType::Date => {
            let date = NaiveDate::parse_from_str(raw.trim(), descriptor.date_mask())
                .map_err(|_| invalid())?;
            Ok(Value::Date(day_count(descriptor, date)?))
        }
        EngineType::Timestamp => {
            chrono::NaiveDateTime::parse_from_str(raw.trim(), descriptor.timestamp_mask())
                .map(|naive| Value::TimestampMillis(naive.and_utc().timestamp_millis()))
                .map_err(|_| invalid())
        }
        EngineType::Binary => Ok(Value::Bytes(raw.as_bytes().to_vec())),
    }
}

/// The zero value written for a non-nullable field with no default.
fn zero_value(descriptor: &FieldDescriptor) -> Value {
    match descriptor.engine_type {
        EngineType::String | EngineType::InetAddress => Value::String(String::new()),
        EngineType::Integer => Value::Long(0),
        EngineType::Number | EngineType::BigNumber => Value::Double(0.0),
        EngineType::Boolean => Value::Boolean(false),
        EngineType::Binary => Value::Bytes(Vec::new()),
        EngineType::Date => Value::Date(0),
        EngineType::Timestamp => Value::TimestampMillis(0),
    }
}

/// Nullable fields are written as `["null", T]` unions.
fn wrap(descriptor: &FieldDescriptor, value: Value) -> Value {
    if !descriptor.allow_null {
        return value;
    }
    match value {
        Value::Null => Value::Union(0, Box::new(Value::Null)),
        other => Value::Union(1, Box::new(other)),
    }
}

fn day_count(descriptor: &FieldDescriptor, date: NaiveDate) -> ConvertResult<i32> {
    let days = epoch_days_from_date(date);
    i32::try_from(days).map_err(|_| ConvertError::DateOverflow {
        field: descriptor.engine_field_name.clone(),
        days,
    })
}

fn build_output_schema(description: &SchemaDescription) -> SchemaResult<Schema> {
    let fields: Vec<serde_json::Value> = description.fields().iter().map(field_json).collect();
    let record = json!({
        "type": "record",
        "name": "engine_row",
        "fields": fields,
    });
    Schema::parse_str(&record.to_string()).map_err(|e| SchemaError::OutputSchema(e.to_string()))
}

fn field_json(descriptor: &FieldDescriptor) -> serde_json::Value {
    let ty = type_json(default_format_type(descriptor.engine_type));
    let ty = if descriptor.allow_null {
        json!(["null", ty])
    } else {
        ty
    };
    json!({ "name": descriptor.format_field_name, "type": ty })
}

fn type_json(format: FormatType) -> serde_json::Value {
    match format {
        FormatType::Boolean => json!("boolean"),
        FormatType::Int32 => json!("int"),
        FormatType::Int64 => json!("long"),
        FormatType::Float32 => json!("float"),
        FormatType::Float64 => json!("double"),
        FormatType::StringOrEnum => json!("string"),
        FormatType::Bytes | FormatType::Fixed => json!("bytes"),
        FormatType::Date => json!({ "type": "int", "logicalType": "date" }),
        FormatType::TimestampMillis => {
            json!({ "type": "long", "logicalType": "timestamp-millis" })
        }
        FormatType::Decimal { precision, scale } => json!({
            "type": "bytes",
            "logicalType": "decimal",
            "precision": precision,
            "scale": scale,
        }),
    }
}
