//! Flattened schema descriptors and the legacy field-name codec.
//!
//! A [`SchemaDescription`] is the bridge between the two worlds: an
//! ordered list of [`FieldDescriptor`]s, each naming one leaf of the
//! nested Avro schema and the engine column it becomes. Descriptions are
//! built once per schema version, either by the
//! [`SchemaWalker`](crate::walker::SchemaWalker) or by hand (they
//! round-trip through JSON for that purpose), and are immutable
//! afterwards; readers and writers share them freely across records.
//!
//! The legacy codec handles schemas written by older producers that
//! embedded the engine type and nullability inside the Avro field name
//! itself, separated by [`LEGACY_DELIMITER`].

use serde::{Deserialize, Serialize};

use crate::mapper::FormatType;
use crate::row::EngineType;

/// Token separating the parts of a legacy-encoded field name.
pub const LEGACY_DELIMITER: &str = "_delimiter_";

/// Default mask for parsing and formatting textual dates.
pub const DEFAULT_DATE_MASK: &str = "%Y-%m-%d";

/// Default mask for parsing and formatting textual timestamps.
pub const DEFAULT_TIMESTAMP_MASK: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One flattened leaf field: where it lives in the nested format, what it
/// is called on the engine side, and how values convert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Dotted/bracketed diagnostic path into the nested schema, e.g.
    /// `customer.orders[0].total`. `[0]` marks an array element and
    /// `[*key*]` a map value.
    pub format_path: String,
    /// The name used to address the value in a record at read/write
    /// time. For leaves derived from nested schemas this is the full
    /// dotted path; for flat schemas it is the plain field name.
    pub format_field_name: String,
    /// Engine-side column name. Unique within a description produced by
    /// the walker; uniqueness of hand-authored descriptions is the
    /// author's responsibility.
    pub engine_field_name: String,
    /// Avro-side leaf shape.
    pub format_type: FormatType,
    /// Engine-side column type.
    pub engine_type: EngineType,
    /// Whether the field may be null on the Avro side.
    pub allow_null: bool,
    /// Textual default, parsed lazily against the target type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// chrono format mask for textual dates/timestamps. Falls back to
    /// [`DEFAULT_DATE_MASK`] / [`DEFAULT_TIMESTAMP_MASK`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

impl FieldDescriptor {
    /// Create a descriptor for a flat field: all three names are `name`,
    /// the engine type follows the format type's default mapping, nulls
    /// are not allowed and there is no default.
    pub fn new(name: impl Into<String>, format_type: FormatType) -> Self {
        let name = name.into();
        Self {
            format_path: name.clone(),
            format_field_name: name.clone(),
            engine_field_name: name,
            format_type,
            engine_type: format_type.engine_type(),
            allow_null: false,
            default_value: None,
            date_format: None,
        }
    }

    /// Mark the field nullable.
    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Attach a textual default.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Override the requested engine type, e.g. to read a `long` column
    /// as a string.
    pub fn with_engine_type(mut self, engine_type: EngineType) -> Self {
        self.engine_type = engine_type;
        self
    }

    /// Attach a chrono format mask for textual dates/timestamps.
    pub fn with_date_format(mut self, mask: impl Into<String>) -> Self {
        self.date_format = Some(mask.into());
        self
    }

    /// The mask used for textual dates.
    pub fn date_mask(&self) -> &str {
        self.date_format.as_deref().unwrap_or(DEFAULT_DATE_MASK)
    }

    /// The mask used for textual timestamps.
    pub fn timestamp_mask(&self) -> &str {
        self.date_format.as_deref().unwrap_or(DEFAULT_TIMESTAMP_MASK)
    }
}

/// An ordered list of [`FieldDescriptor`]s. Insertion order is the column
/// order presented to the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescription {
    /// Construct from descriptors, preserving order.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// All descriptors, in column order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a descriptor by engine field name.
    pub fn field(&self, engine_field_name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.engine_field_name == engine_field_name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the description has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize to pretty JSON, for hand-editing and storage.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a description from JSON.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Compose a legacy field name embedding the engine type ordinal and
/// nullability: `name_delimiter_ordinal_delimiter_allownull`.
pub fn legacy_field_name(name: &str, engine_type: EngineType, allow_null: bool) -> String {
    format!(
        "{name}{LEGACY_DELIMITER}{}{LEGACY_DELIMITER}{allow_null}",
        engine_type.ordinal()
    )
}

/// Split a legacy field name back into `(name, engine_type, allow_null)`.
///
/// Returns `None` unless the name carries exactly the expected shape: two
/// delimiters, a known type ordinal and a boolean literal.
pub fn split_legacy_field_name(encoded: &str) -> Option<(String, EngineType, bool)> {
    let mut parts = encoded.split(LEGACY_DELIMITER);
    let name = parts.next()?;
    let engine_type = EngineType::from_ordinal(parts.next()?.parse().ok()?)?;
    let allow_null = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((name.to_string(), engine_type, allow_null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_name_round_trip() {
        let encoded = legacy_field_name("amount", EngineType::BigNumber, true);
        assert_eq!(encoded, "amount_delimiter_6_delimiter_true");
        assert_eq!(
            split_legacy_field_name(&encoded),
            Some(("amount".to_string(), EngineType::BigNumber, true))
        );
    }

    #[test]
    fn split_rejects_malformed_names() {
        assert_eq!(split_legacy_field_name("plain_name"), None);
        assert_eq!(split_legacy_field_name("a_delimiter_99_delimiter_true"), None);
        assert_eq!(split_legacy_field_name("a_delimiter_2_delimiter_maybe"), None);
        assert_eq!(
            split_legacy_field_name("a_delimiter_2_delimiter_true_delimiter_extra"),
            None
        );
    }

    #[test]
    fn description_json_round_trip() {
        let description = SchemaDescription::new(vec![
            FieldDescriptor::new("id", FormatType::Int64),
            FieldDescriptor::new("note", FormatType::StringOrEnum)
                .nullable()
                .with_default("n/a"),
        ]);
        let json = description.to_json().unwrap();
        assert_eq!(SchemaDescription::from_json(&json).unwrap(), description);
    }
}
