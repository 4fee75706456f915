use anyhow::Result;
use apache_avro::Schema;
use avroflat::{
    EngineType, FormatType, NameStrategy, SchemaDescription, SchemaError, SchemaWalker,
    WalkerOptions,
};

const ORDER_SCHEMA: &str = r#"{
    "type": "record",
    "name": "order",
    "fields": [
        {"name": "id", "type": "string"},
        {"name": "qty", "type": "int"},
        {"name": "price", "type": {"type": "bytes", "logicalType": "decimal", "precision": 10, "scale": 2}},
        {"name": "day", "type": {"type": "int", "logicalType": "date"}},
        {"name": "when", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "tags", "type": {"type": "array", "items": "string"}},
        {"name": "attrs", "type": {"type": "map", "values": "long"}},
        {"name": "note", "type": ["null", "string"], "default": null},
        {"name": "customer", "type": {
            "type": "record",
            "name": "customer_rec",
            "fields": [
                {"name": "name", "type": "string"},
                {"name": "vip", "type": "boolean"}
            ]
        }}
    ]
}"#;

fn flatten(json: &str) -> Result<SchemaDescription> {
    let schema = Schema::parse_str(json)?;
    Ok(SchemaWalker::new().flatten(&schema)?)
}

#[test]
fn flattens_scalars_logicals_and_containers() -> Result<()> {
    let description = flatten(ORDER_SCHEMA)?;
    let fields = description.fields();
    assert_eq!(fields.len(), 10);

    assert_eq!(fields[0].engine_field_name, "id");
    assert_eq!(fields[0].format_path, "id");
    assert_eq!(fields[0].engine_type, EngineType::String);
    assert!(!fields[0].allow_null);

    assert_eq!(fields[1].engine_type, EngineType::Integer);
    assert_eq!(fields[1].format_type, FormatType::Int32);

    assert_eq!(
        fields[2].format_type,
        FormatType::Decimal { precision: 10, scale: 2 }
    );
    assert_eq!(fields[2].engine_type, EngineType::BigNumber);

    assert_eq!(fields[3].engine_type, EngineType::Date);
    assert_eq!(fields[4].engine_type, EngineType::Timestamp);

    // Containers collapse into one marker each; the marker is stripped
    // from the engine name.
    assert_eq!(fields[5].format_path, "tags[0]");
    assert_eq!(fields[5].engine_field_name, "tags");
    assert_eq!(fields[5].engine_type, EngineType::String);
    assert_eq!(fields[6].format_path, "attrs[*key*]");
    assert_eq!(fields[6].engine_field_name, "attrs");
    assert_eq!(fields[6].engine_type, EngineType::Integer);

    assert_eq!(fields[7].engine_field_name, "note");
    assert!(fields[7].allow_null);
    assert_eq!(fields[7].default_value, None);

    assert_eq!(fields[8].format_path, "customer.name");
    assert_eq!(fields[8].format_field_name, "customer.name");
    assert_eq!(fields[8].engine_field_name, "name");
    assert_eq!(fields[9].engine_field_name, "vip");
    Ok(())
}

#[test]
fn flatten_is_idempotent() -> Result<()> {
    let schema = Schema::parse_str(ORDER_SCHEMA)?;
    let walker = SchemaWalker::new();
    assert_eq!(walker.flatten(&schema)?, walker.flatten(&schema)?);
    Ok(())
}

#[test]
fn single_leaf_union_adopts_the_leaf_type() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "t",
            "fields": [{"name": "v", "type": ["null", "long"]}]
        }"#,
    )?;
    let field = &description.fields()[0];
    assert_eq!(field.engine_type, EngineType::Integer);
    assert_eq!(field.format_type, FormatType::Int64);
    assert!(field.allow_null);
    Ok(())
}

#[test]
fn ambiguous_union_collapses_to_string() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "t",
            "fields": [
                {"name": "both", "type": ["null", "long", "string"]},
                {"name": "no_null", "type": ["long", "string"]}
            ]
        }"#,
    )?;
    let fields = description.fields();
    assert_eq!(fields[0].engine_type, EngineType::String);
    assert_eq!(fields[0].format_type, FormatType::StringOrEnum);
    assert!(fields[0].allow_null);
    assert_eq!(fields[1].engine_type, EngineType::String);
    assert!(!fields[1].allow_null);
    Ok(())
}

#[test]
fn union_container_members_share_the_union_path() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "t",
            "fields": [{"name": "u", "type": [
                "null",
                "string",
                {"type": "record", "name": "inner", "fields": [{"name": "x", "type": "long"}]}
            ]}]
        }"#,
    )?;
    let fields = description.fields();
    assert_eq!(fields.len(), 2);
    // The union's own leaf comes first, then the record member's leaves
    // at the same prefix.
    assert_eq!(fields[0].format_path, "u");
    assert_eq!(fields[0].engine_type, EngineType::String);
    assert_eq!(fields[1].format_path, "u.x");
    assert!(fields[1].allow_null, "members of a nullable union stay nullable");
    Ok(())
}

#[test]
fn union_with_only_container_members_produces_no_own_field() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "t",
            "fields": [{"name": "u", "type": [
                "null",
                {"type": "array", "items": "long"}
            ]}]
        }"#,
    )?;
    let fields = description.fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].format_path, "u[0]");
    assert_eq!(fields[0].engine_field_name, "u");
    Ok(())
}

#[test]
fn scalar_root_uses_the_placeholder_name() -> Result<()> {
    let description = flatten(r#""long""#)?;
    assert_eq!(description.len(), 1);
    let field = &description.fields()[0];
    assert_eq!(field.engine_field_name, "data");
    assert_eq!(field.format_path, "");
    assert_eq!(field.engine_type, EngineType::Integer);
    Ok(())
}

#[test]
fn container_root_uses_the_placeholder_name() -> Result<()> {
    let description = flatten(r#"{"type": "array", "items": "double"}"#)?;
    let field = &description.fields()[0];
    assert_eq!(field.format_path, "[0]");
    assert_eq!(field.engine_field_name, "data");
    assert_eq!(field.engine_type, EngineType::Number);

    let nested = flatten(r#"{"type": "map", "values": {"type": "array", "items": "long"}}"#)?;
    assert_eq!(nested.fields()[0].format_path, "[*key*][0]");
    assert_eq!(nested.fields()[0].engine_field_name, "data");
    Ok(())
}

#[test]
fn placeholder_name_is_configurable() -> Result<()> {
    let walker = SchemaWalker::with_options(WalkerOptions {
        placeholder: "value".to_string(),
        ..WalkerOptions::default()
    });
    let schema = Schema::parse_str(r#""boolean""#)?;
    assert_eq!(walker.flatten(&schema)?.fields()[0].engine_field_name, "value");
    Ok(())
}

#[test]
fn unsupported_leaf_types_are_dropped() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "t",
            "fields": [
                {"name": "a", "type": "long"},
                {"name": "u", "type": {"type": "string", "logicalType": "uuid"}},
                {"name": "b", "type": "string"}
            ]
        }"#,
    )?;
    let names: Vec<_> = description
        .fields()
        .iter()
        .map(|f| f.engine_field_name.as_str())
        .collect();
    assert_eq!(names, ["a", "b"]);
    Ok(())
}

#[test]
fn record_defaults_are_captured_as_text() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "t",
            "fields": [
                {"name": "n", "type": "long", "default": 7},
                {"name": "s", "type": "string", "default": "hi"},
                {"name": "b", "type": "boolean", "default": true}
            ]
        }"#,
    )?;
    let fields = description.fields();
    assert_eq!(fields[0].default_value.as_deref(), Some("7"));
    assert_eq!(fields[1].default_value.as_deref(), Some("hi"));
    assert_eq!(fields[2].default_value.as_deref(), Some("true"));
    Ok(())
}

const COLLIDING_SCHEMA: &str = r#"{
    "type": "record",
    "name": "c",
    "fields": [
        {"name": "p", "type": {"type": "record", "name": "p_rec", "fields": [{"name": "x", "type": "long"}]}},
        {"name": "q", "type": {"type": "record", "name": "q_rec", "fields": [{"name": "x", "type": "long"}]}},
        {"name": "r", "type": {"type": "record", "name": "r_rec", "fields": [{"name": "x", "type": "string"}]}}
    ]
}"#;

#[test]
fn stable_strategy_yields_globally_unique_names() -> Result<()> {
    let description = flatten(COLLIDING_SCHEMA)?;
    let names: Vec<_> = description
        .fields()
        .iter()
        .map(|f| f.engine_field_name.clone())
        .collect();
    assert_eq!(names, ["x-1-1", "x-1", "x"]);
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
    Ok(())
}

#[test]
fn single_pass_strategy_keeps_the_order_dependent_quirk() -> Result<()> {
    let walker = SchemaWalker::with_options(WalkerOptions {
        name_strategy: NameStrategy::SinglePass,
        ..WalkerOptions::default()
    });
    let schema = Schema::parse_str(COLLIDING_SCHEMA)?;
    let names: Vec<_> = walker
        .flatten(&schema)?
        .fields()
        .iter()
        .map(|f| f.engine_field_name.clone())
        .collect();
    // Two collision chains landed on the same suffix: the single pass
    // resolves each field only against the fields after it, so the
    // duplicate survives. This is the documented legacy behavior, not a
    // uniqueness guarantee.
    assert_eq!(names, ["x-1", "x-1", "x"]);
    Ok(())
}

#[test]
fn reused_named_types_expand_at_each_site() -> Result<()> {
    let description = flatten(
        r#"{
            "type": "record",
            "name": "outer",
            "fields": [
                {"name": "first", "type": {"type": "record", "name": "pt", "fields": [
                    {"name": "x", "type": "long"},
                    {"name": "y", "type": "long"}
                ]}},
                {"name": "second", "type": "pt"}
            ]
        }"#,
    )?;
    let paths: Vec<_> = description
        .fields()
        .iter()
        .map(|f| f.format_path.as_str())
        .collect();
    assert_eq!(paths, ["first.x", "first.y", "second.x", "second.y"]);
    let names: Vec<_> = description
        .fields()
        .iter()
        .map(|f| f.engine_field_name.as_str())
        .collect();
    assert_eq!(names, ["x-1", "y-1", "x", "y"]);
    Ok(())
}

#[test]
fn recursive_schemas_are_rejected() -> Result<()> {
    let schema = Schema::parse_str(
        r#"{
            "type": "record",
            "name": "node",
            "fields": [{"name": "next", "type": ["null", "node"]}]
        }"#,
    )?;
    let err = SchemaWalker::new().flatten(&schema);
    assert!(matches!(err, Err(SchemaError::RecursiveType(name)) if name == "node"));
    Ok(())
}
