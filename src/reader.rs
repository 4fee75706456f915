//! Conversion of nested Avro records into flat engine rows.
//!
//! A [`RecordReader`] is built once from a
//! [`SchemaDescription`](crate::schema::SchemaDescription) and then applied
//! to records one at a time by the surrounding streaming loop. For every
//! descriptor, in order, it:
//!
//! 1. resolves the addressed value, walking dotted path segments and
//!    `[index]` / `[key]` steps for leaves that came from nested schemas
//!    (missing values become null columns);
//! 2. determines the *observed* Avro type from the value itself, so
//!    unions and logical annotations are resolved per record rather than
//!    trusted from the descriptor;
//! 3. coerces observed type to the descriptor's requested engine type.
//!    The coercion is a function of both types: a `long` can become an
//!    integer, a number, a string, a big number, a boolean, a timestamp
//!    or a date depending on what the descriptor asks for.
//!
//! Failed coercions substitute null and record a
//! [`ConversionWarning`](crate::row::ConversionWarning) on the row; only
//! date-epoch overflow aborts the record. Schemas whose first field name
//! carries the legacy delimiter are decoded through the legacy name
//! codec, retrying with the opposite nullability before treating a field
//! as absent.

use apache_avro::Decimal as AvroDecimal;
use apache_avro::types::Value;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::error::{ConvertError, ConvertResult};
use crate::mapper::FormatType;
use crate::row::{
    Column, ConversionWarning, EngineType, EngineValue, Row, date_from_epoch_days, parse_bool,
};
use crate::schema::{FieldDescriptor, LEGACY_DELIMITER, SchemaDescription, legacy_field_name};

/// Converts Avro records into [`Row`]s against a fixed description.
///
/// Readers hold no per-record state; one instance may be shared across
/// threads, or cheaply cloned per thread.
#[derive(Clone, Debug)]
pub struct RecordReader {
    description: SchemaDescription,
}

impl RecordReader {
    /// Build a reader over `description`.
    pub fn new(description: SchemaDescription) -> Self {
        Self { description }
    }

    /// The description this reader projects onto.
    pub fn description(&self) -> &SchemaDescription {
        &self.description
    }

    /// Convert one record into a row.
    ///
    /// # Errors
    /// [`ConvertError::NotARecord`] if `record` is not an Avro record
    /// value, and [`ConvertError::DateOverflow`] if a date's day count
    /// cannot be represented. All other per-value failures are recovered
    /// as null columns with warnings on the returned row.
    pub fn read(&self, record: &Value) -> ConvertResult<Row> {
        let record = unwrap_union(record);
        let Value::Record(record_fields) = record else {
            return Err(ConvertError::NotARecord {
                found: value_kind(record),
            });
        };

        let legacy = record_fields
            .first()
            .is_some_and(|(name, _)| name.contains(LEGACY_DELIMITER));
        if legacy {
            debug!("legacy-encoded field names detected");
        }

        let mut row = Row::with_capacity(self.description.len());
        for descriptor in self.description.fields() {
            let resolved = if legacy {
                lookup_legacy(record_fields, descriptor)
            } else {
                lookup_path(record, &descriptor.format_field_name)
            };
            let Some(value) = resolved.map(unwrap_union) else {
                row.push(Column::null(&descriptor.engine_field_name, descriptor.engine_type));
                continue;
            };
            if matches!(value, Value::Null) {
                row.push(Column::null(&descriptor.engine_field_name, descriptor.engine_type));
                continue;
            }
            match coerce(descriptor, value) {
                Ok(converted) => row.push(Column::new(
                    &descriptor.engine_field_name,
                    descriptor.engine_type,
                    Some(converted),
                )),
                Err(Failure::Fatal(err)) => return Err(err),
                Err(Failure::Soft(reason)) => {
                    let raw = raw_text(value);
                    warn!(
                        field = %descriptor.engine_field_name,
                        target = %descriptor.engine_type,
                        raw = %raw,
                        %reason,
                        "conversion failed; substituting null"
                    );
                    row.push_warning(ConversionWarning {
                        field: descriptor.engine_field_name.clone(),
                        target: descriptor.engine_type,
                        raw,
                        reason,
                    });
                    row.push(Column::null(&descriptor.engine_field_name, descriptor.engine_type));
                }
            }
        }
        Ok(row)
    }
}

/// How a single coercion failed.
enum Failure {
    /// Abort the record.
    Fatal(ConvertError),
    /// Substitute null and warn.
    Soft(String),
}

fn soft(reason: impl Into<String>) -> Failure {
    Failure::Soft(reason.into())
}

/// Unions carry their resolved branch; conversion always looks at that.
fn unwrap_union(value: &Value) -> &Value {
    match value {
        Value::Union(_, inner) => inner,
        other => other,
    }
}

/// Resolve a dotted/bracketed field name against a record value.
///
/// Each dot-separated segment names a record field (or map entry),
/// optionally followed by `[N]` array steps or `[key]` map steps. Any
/// step that does not resolve makes the whole field absent.
fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (name, steps) = split_segment(segment);
        if !name.is_empty() {
            current = child_by_name(unwrap_union(current), name)?;
        }
        for step in steps {
            current = child_by_step(unwrap_union(current), step)?;
        }
    }
    Some(current)
}

/// Split `"b[0][k]"` into `("b", ["0", "k"])`.
fn split_segment(segment: &str) -> (&str, Vec<&str>) {
    let Some(open) = segment.find('[') else {
        return (segment, Vec::new());
    };
    let (name, rest) = segment.split_at(open);
    let steps = rest
        .split('[')
        .skip(1)
        .filter_map(|part| part.strip_suffix(']'))
        .collect();
    (name, steps)
}

fn child_by_name<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
        Value::Map(entries) => entries.get(name),
        _ => None,
    }
}

fn child_by_step<'a>(value: &'a Value, step: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items.get(step.parse::<usize>().ok()?),
        Value::Map(entries) => entries.get(step),
        _ => None,
    }
}

/// Legacy lookup: reconstruct the encoded name from the descriptor, then
/// retry with the opposite nullability before giving up.
fn lookup_legacy<'a>(
    fields: &'a [(String, Value)],
    descriptor: &FieldDescriptor,
) -> Option<&'a Value> {
    let find = |encoded: String| {
        fields
            .iter()
            .find(|(name, _)| *name == encoded)
            .map(|(_, value)| value)
    };
    find(legacy_field_name(
        &descriptor.format_field_name,
        descriptor.engine_type,
        descriptor.allow_null,
    ))
    .or_else(|| {
        find(legacy_field_name(
            &descriptor.format_field_name,
            descriptor.engine_type,
            !descriptor.allow_null,
        ))
    })
}

/// The two-type conversion matrix: observed Avro value on one axis,
/// requested engine type on the other.
fn coerce(descriptor: &FieldDescriptor, value: &Value) -> Result<EngineValue, Failure> {
    match value {
        Value::Boolean(b) => from_boolean(descriptor, *b),
        Value::Int(n) => from_integer(descriptor, i64::from(*n)),
        Value::Long(n) => from_integer(descriptor, *n),
        Value::Float(x) => from_float(descriptor, f64::from(*x)),
        Value::Double(x) => from_float(descriptor, *x),
        Value::String(s) => from_text(descriptor, s),
        Value::Enum(_, symbol) => from_text(descriptor, symbol),
        Value::Bytes(bytes) => from_bytes(descriptor, bytes),
        Value::Fixed(_, bytes) => from_bytes(descriptor, bytes),
        Value::Date(days) => from_date(descriptor, *days),
        Value::TimestampMillis(millis) => from_timestamp(descriptor, *millis),
        Value::Decimal(decimal) => from_decimal(descriptor, decimal),
        other => Err(soft(format!("no conversion from {}", value_kind(other)))),
    }
}

fn from_boolean(descriptor: &FieldDescriptor, b: bool) -> Result<EngineValue, Failure> {
    match descriptor.engine_type {
        EngineType::Boolean => Ok(EngineValue::Boolean(b)),
        EngineType::String => Ok(EngineValue::String(b.to_string())),
        EngineType::Integer => Ok(EngineValue::Integer(i64::from(b))),
        EngineType::Number => Ok(EngineValue::Number(if b { 1.0 } else { 0.0 })),
        other => Err(soft(format!("no conversion from boolean to {other}"))),
    }
}

fn from_integer(descriptor: &FieldDescriptor, n: i64) -> Result<EngineValue, Failure> {
    match descriptor.engine_type {
        EngineType::Integer => Ok(EngineValue::Integer(n)),
        EngineType::Number => Ok(EngineValue::Number(n as f64)),
        EngineType::BigNumber => Ok(EngineValue::BigNumber(Decimal::from(n))),
        EngineType::String => Ok(EngineValue::String(n.to_string())),
        EngineType::Boolean => Ok(EngineValue::Boolean(n != 0)),
        EngineType::Timestamp => DateTime::from_timestamp_millis(n)
            .map(EngineValue::Timestamp)
            .ok_or_else(|| soft("millisecond count out of range")),
        EngineType::Date => date_from_days(n, descriptor).map(EngineValue::Date),
        other => Err(soft(format!("no conversion from integer to {other}"))),
    }
}

fn from_float(descriptor: &FieldDescriptor, x: f64) -> Result<EngineValue, Failure> {
    match descriptor.engine_type {
        EngineType::Number => Ok(EngineValue::Number(x)),
        EngineType::Integer => Ok(EngineValue::Integer(x.round() as i64)),
        EngineType::BigNumber => Decimal::from_f64(x)
            .map(EngineValue::BigNumber)
            .ok_or_else(|| soft("not a finite number")),
        EngineType::String => Ok(EngineValue::String(x.to_string())),
        EngineType::Boolean => Ok(EngineValue::Boolean(x != 0.0)),
        other => Err(soft(format!("no conversion from number to {other}"))),
    }
}

fn from_text(descriptor: &FieldDescriptor, text: &str) -> Result<EngineValue, Failure> {
    match descriptor.engine_type {
        EngineType::String => Ok(EngineValue::String(text.to_string())),
        EngineType::Integer => text
            .trim()
            .parse::<i64>()
            .map(EngineValue::Integer)
            .map_err(|e| soft(e.to_string())),
        EngineType::Number => text
            .trim()
            .parse::<f64>()
            .map(EngineValue::Number)
            .map_err(|e| soft(e.to_string())),
        EngineType::BigNumber => text
            .trim()
            .parse::<Decimal>()
            .map(EngineValue::BigNumber)
            .map_err(|e| soft(e.to_string())),
        EngineType::Boolean => parse_bool(text)
            .map(EngineValue::Boolean)
            .ok_or_else(|| soft("not a boolean literal")),
        EngineType::Date => NaiveDate::parse_from_str(text.trim(), descriptor.date_mask())
            .map(EngineValue::Date)
            .map_err(|e| soft(e.to_string())),
        EngineType::Timestamp => parse_timestamp_text(text, descriptor),
        EngineType::Binary => Ok(EngineValue::Binary(text.as_bytes().to_vec())),
        EngineType::InetAddress => text
            .trim()
            .parse::<IpAddr>()
            .map(EngineValue::InetAddress)
            .map_err(|e| soft(e.to_string())),
    }
}

fn parse_timestamp_text(text: &str, descriptor: &FieldDescriptor) -> Result<EngineValue, Failure> {
    let text = text.trim();
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, descriptor.timestamp_mask()) {
        return Ok(EngineValue::Timestamp(naive.and_utc()));
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| EngineValue::Timestamp(dt.with_timezone(&Utc)))
        .map_err(|e| soft(e.to_string()))
}

fn from_bytes(descriptor: &FieldDescriptor, bytes: &[u8]) -> Result<EngineValue, Failure> {
    match descriptor.engine_type {
        EngineType::Binary => Ok(EngineValue::Binary(bytes.to_vec())),
        EngineType::String => String::from_utf8(bytes.to_vec())
            .map(EngineValue::String)
            .map_err(|_| soft("bytes are not valid UTF-8")),
        EngineType::BigNumber => match descriptor.format_type {
            FormatType::Decimal { scale, .. } => {
                decimal_from_bytes(bytes, scale).map(EngineValue::BigNumber)
            }
            _ => Err(soft("bytes field is not declared as a decimal")),
        },
        other => Err(soft(format!("no conversion from bytes to {other}"))),
    }
}

fn from_date(descriptor: &FieldDescriptor, days: i32) -> Result<EngineValue, Failure> {
    match descriptor.engine_type {
        EngineType::Date => date_from_days(i64::from(days), descriptor).map(EngineValue::Date),
        EngineType::String => date_from_days(i64::from(days), descriptor)
            .map(|date| EngineValue::String(date.format(descriptor.date_mask()).to_string())),
        EngineType::Integer => Ok(EngineValue::Integer(i64::from(days))),
        EngineType::Number => Ok(EngineValue::Number(f64::from(days))),
        EngineType::Timestamp => date_from_days(i64::from(days), descriptor)
            .map(|date| EngineValue::Timestamp(date.and_time(NaiveTime::MIN).and_utc())),
        other => Err(soft(format!("no conversion from date to {other}"))),
    }
}

fn from_timestamp(descriptor: &FieldDescriptor, millis: i64) -> Result<EngineValue, Failure> {
    let instant = || {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| soft("millisecond count out of range"))
    };
    match descriptor.engine_type {
        EngineType::Timestamp => instant().map(EngineValue::Timestamp),
        EngineType::Date => instant().map(|dt| EngineValue::Date(dt.date_naive())),
        EngineType::Integer => Ok(EngineValue::Integer(millis)),
        EngineType::Number => Ok(EngineValue::Number(millis as f64)),
        EngineType::String => instant().map(|dt| {
            EngineValue::String(dt.naive_utc().format(descriptor.timestamp_mask()).to_string())
        }),
        other => Err(soft(format!("no conversion from timestamp to {other}"))),
    }
}

fn from_decimal(descriptor: &FieldDescriptor, decimal: &AvroDecimal) -> Result<EngineValue, Failure> {
    let scale = match descriptor.format_type {
        FormatType::Decimal { scale, .. } => scale,
        _ => 0,
    };
    let bytes = <Vec<u8>>::try_from(decimal).map_err(|e| soft(e.to_string()))?;
    let converted = decimal_from_bytes(&bytes, scale)?;
    match descriptor.engine_type {
        EngineType::BigNumber => Ok(EngineValue::BigNumber(converted)),
        EngineType::Number => converted
            .to_f64()
            .map(EngineValue::Number)
            .ok_or_else(|| soft("decimal does not fit a 64-bit float")),
        EngineType::String => Ok(EngineValue::String(converted.to_string())),
        other => Err(soft(format!("no conversion from decimal to {other}"))),
    }
}

/// Decode a big-endian two's-complement unscaled integer plus scale.
fn decimal_from_bytes(bytes: &[u8], scale: u32) -> Result<Decimal, Failure> {
    let unscaled = i128_from_be(bytes).ok_or_else(|| soft("decimal payload wider than 128 bits"))?;
    Decimal::try_from_i128_with_scale(unscaled, scale).map_err(|e| soft(e.to_string()))
}

fn i128_from_be(bytes: &[u8]) -> Option<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(buf))
}

fn date_from_days(days: i64, descriptor: &FieldDescriptor) -> Result<NaiveDate, Failure> {
    date_from_epoch_days(days).ok_or_else(|| {
        Failure::Fatal(ConvertError::DateOverflow {
            field: descriptor.engine_field_name.clone(),
            days,
        })
    })
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::Boolean(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Long(n) => n.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Double(x) => x.to_string(),
        Value::String(s) | Value::Enum(_, s) => s.clone(),
        Value::Bytes(b) | Value::Fixed(_, b) => format!("{} bytes", b.len()),
        Value::Date(days) => days.to_string(),
        Value::TimestampMillis(ms) => ms.to_string(),
        other => value_kind(other).to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "string",
        Value::Fixed(..) => "fixed",
        Value::Enum(..) => "enum",
        Value::Union(..) => "union",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Record(_) => "record",
        Value::Date(_) => "date",
        Value::Decimal(_) => "decimal",
        Value::TimestampMillis(_) => "timestamp-millis",
        _ => "other",
    }
}
