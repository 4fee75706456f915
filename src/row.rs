//! The flat, typed row model presented to the engine.
//!
//! A [`Row`] is an ordered sequence of named [`Column`]s. Each column is
//! tagged with an [`EngineType`] and holds an optional [`EngineValue`];
//! `None` is the engine's null. `EngineValue` is a closed sum type with
//! exactly one variant per engine type, so conversion code matches on it
//! exhaustively and an unsupported combination is a compile error rather
//! than a runtime surprise.
//!
//! Rows also carry [`ConversionWarning`]s: when a value cannot be coerced
//! to its target type the reader substitutes null, but the cause travels
//! with the row instead of being discarded.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Column type tags of the engine's row model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    /// Variable-length text.
    String,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Number,
    /// Arbitrary-precision decimal.
    BigNumber,
    /// True/false.
    Boolean,
    /// Raw bytes.
    Binary,
    /// Calendar date without a time component.
    Date,
    /// Instant with millisecond precision, UTC.
    Timestamp,
    /// IPv4 or IPv6 address.
    InetAddress,
}

impl EngineType {
    /// Stable numeric code for this type.
    ///
    /// These codes are embedded in legacy-encoded field names (see
    /// [`legacy_field_name`](crate::schema::legacy_field_name)) and must
    /// never be renumbered. Code 7 is unassigned.
    pub fn ordinal(self) -> u8 {
        match self {
            EngineType::Number => 1,
            EngineType::String => 2,
            EngineType::Date => 3,
            EngineType::Boolean => 4,
            EngineType::Integer => 5,
            EngineType::BigNumber => 6,
            EngineType::Binary => 8,
            EngineType::Timestamp => 9,
            EngineType::InetAddress => 10,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal). Returns `None` for codes
    /// that name no engine type.
    pub fn from_ordinal(code: u8) -> Option<Self> {
        match code {
            1 => Some(EngineType::Number),
            2 => Some(EngineType::String),
            3 => Some(EngineType::Date),
            4 => Some(EngineType::Boolean),
            5 => Some(EngineType::Integer),
            6 => Some(EngineType::BigNumber),
            8 => Some(EngineType::Binary),
            9 => Some(EngineType::Timestamp),
            10 => Some(EngineType::InetAddress),
            _ => None,
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineType::String => "string",
            EngineType::Integer => "integer",
            EngineType::Number => "number",
            EngineType::BigNumber => "bignumber",
            EngineType::Boolean => "boolean",
            EngineType::Binary => "binary",
            EngineType::Date => "date",
            EngineType::Timestamp => "timestamp",
            EngineType::InetAddress => "inetaddress",
        };
        f.write_str(name)
    }
}

/// One engine value. Exactly one variant per [`EngineType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineValue {
    String(String),
    Integer(i64),
    Number(f64),
    BigNumber(Decimal),
    Boolean(bool),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    InetAddress(IpAddr),
}

impl EngineValue {
    /// The type tag matching this value's variant.
    pub fn engine_type(&self) -> EngineType {
        match self {
            EngineValue::String(_) => EngineType::String,
            EngineValue::Integer(_) => EngineType::Integer,
            EngineValue::Number(_) => EngineType::Number,
            EngineValue::BigNumber(_) => EngineType::BigNumber,
            EngineValue::Boolean(_) => EngineType::Boolean,
            EngineValue::Binary(_) => EngineType::Binary,
            EngineValue::Date(_) => EngineType::Date,
            EngineValue::Timestamp(_) => EngineType::Timestamp,
            EngineValue::InetAddress(_) => EngineType::InetAddress,
        }
    }

    /// Borrow the string payload, if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EngineValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Integer` value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            EngineValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The float payload, if this is a `Number` value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EngineValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean payload, if this is a `Boolean` value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            EngineValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// A single named, typed slot in a row. `value: None` is the engine null.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Engine-side column name.
    pub name: String,
    /// Declared column type. Nulls stay typed.
    pub engine_type: EngineType,
    /// The value, or `None` for null.
    pub value: Option<EngineValue>,
}

impl Column {
    /// Create a column with a value (or an explicit null).
    pub fn new(name: impl Into<String>, engine_type: EngineType, value: Option<EngineValue>) -> Self {
        Self {
            name: name.into(),
            engine_type,
            value,
        }
    }

    /// Create a typed null column.
    pub fn null(name: impl Into<String>, engine_type: EngineType) -> Self {
        Self::new(name, engine_type, None)
    }
}

/// An ordered sequence of named, typed values, plus any conversion
/// diagnostics collected while producing it.
///
/// Column order is meaningful: it is the order of the
/// [`SchemaDescription`](crate::schema::SchemaDescription) the row was
/// built against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<Column>,
    warnings: Vec<ConversionWarning>,
}

impl Row {
    /// Construct a row from columns, in order.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            columns: Vec::with_capacity(n),
            warnings: Vec::new(),
        }
    }

    /// All columns, in schema order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a value by column name. `None` when the column is missing
    /// or null.
    pub fn get(&self, name: &str) -> Option<&EngineValue> {
        self.column(name).and_then(|c| c.value.as_ref())
    }

    /// Look up a value by column name, falling back to `default` when the
    /// column is missing or null.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a EngineValue) -> &'a EngineValue {
        self.get(name).unwrap_or(default)
    }

    /// Append a column.
    pub fn push(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Conversion failures that were recovered by substituting null while
    /// producing this row.
    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.warnings
    }

    pub(crate) fn push_warning(&mut self, warning: ConversionWarning) {
        self.warnings.push(warning);
    }
}

/// A recoverable conversion failure: the offending field, what it was
/// being converted to, the raw value, and why it failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversionWarning {
    /// Engine name of the field that failed.
    pub field: String,
    /// The engine type the value was being converted to.
    pub target: EngineType,
    /// Textual rendering of the source value.
    pub raw: String,
    /// Human-readable cause.
    pub reason: String,
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] cannot convert `{}` to {}: {}",
            self.field, self.raw, self.target, self.reason
        )
    }
}

/// The engine's date epoch: day 0 of every day-count conversion.
pub(crate) fn epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

/// Epoch day count to calendar date. `None` when the count falls outside
/// the representable range.
pub(crate) fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    chrono::Duration::try_days(days).and_then(|delta| epoch_date().checked_add_signed(delta))
}

/// Calendar date to epoch day count.
pub(crate) fn epoch_days_from_date(date: NaiveDate) -> i64 {
    date.signed_duration_since(epoch_date()).num_days()
}

/// Lenient boolean literal parsing shared by the read and write paths.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trip() {
        for ty in [
            EngineType::String,
            EngineType::Integer,
            EngineType::Number,
            EngineType::BigNumber,
            EngineType::Boolean,
            EngineType::Binary,
            EngineType::Date,
            EngineType::Timestamp,
            EngineType::InetAddress,
        ] {
            assert_eq!(EngineType::from_ordinal(ty.ordinal()), Some(ty));
        }
        assert_eq!(EngineType::from_ordinal(7), None);
        assert_eq!(EngineType::from_ordinal(42), None);
    }

    #[test]
    fn get_or_falls_back_for_missing_and_null() {
        let row = Row::new(vec![
            Column::new("a", EngineType::Integer, Some(EngineValue::Integer(7))),
            Column::null("b", EngineType::String),
        ]);
        let fallback = EngineValue::Integer(0);
        assert_eq!(row.get_or("a", &fallback), &EngineValue::Integer(7));
        assert_eq!(row.get_or("b", &fallback), &fallback);
        assert_eq!(row.get_or("missing", &fallback), &fallback);
    }
}
