//! Recursive projection of a nested Avro schema into a flat field list.
//!
//! [`SchemaWalker::flatten`] walks a schema depth-first and emits one
//! [`FieldDescriptor`] per reachable leaf. Containers collapse into path
//! markers (`[0]` for arrays, `[*key*]` for maps), records contribute
//! dotted path segments, and unions are reduced before the type tables
//! are consulted: a union with exactly one non-null leaf member is
//! treated as that leaf, one with several leaf members collapses to a
//! string (an accepted loss of fidelity), and container members are
//! walked at the union's own path.
//!
//! The traversal uses an explicit work stack rather than call recursion,
//! so schema nesting depth is bounded by heap, not by the call stack.
//! Named-type references are resolved against the definitions seen so
//! far; a reference back to a type currently being expanded is a fatal
//! [`SchemaError::RecursiveType`].

use std::collections::HashMap;

use apache_avro::schema::{Name, Schema};
use tracing::warn;

use crate::error::{SchemaError, SchemaResult};
use crate::mapper::FormatType;
use crate::schema::{FieldDescriptor, SchemaDescription};

/// Marker appended to the path when descending into an array element.
const ARRAY_MARKER: &str = "[0]";

/// Marker appended to the path when descending into a map value.
const MAP_MARKER: &str = "[*key*]";

/// How engine-name collisions are resolved after flattening.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NameStrategy {
    /// Repeat the left-to-right suffixing pass until a full pass finds no
    /// collision. Names are globally unique.
    #[default]
    Stable,
    /// A single left-to-right pass. Order-dependent: duplicates renamed
    /// into separate collision chains can survive the pass. Only useful
    /// when names must match those generated by older releases.
    SinglePass,
}

/// Construction-time options for [`SchemaWalker`].
#[derive(Clone, Debug)]
pub struct WalkerOptions {
    /// Collision resolution strategy.
    pub name_strategy: NameStrategy,
    /// Engine name used when a leaf's path has no usable segment, e.g.
    /// for a schema whose top level is a bare scalar or container.
    pub placeholder: String,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self {
            name_strategy: NameStrategy::default(),
            placeholder: "data".to_string(),
        }
    }
}

/// Projects nested Avro schemas into [`SchemaDescription`]s.
///
/// Walkers hold no per-call state: [`flatten`](Self::flatten) is a pure
/// function of its input and may be called repeatedly, from any thread.
#[derive(Clone, Debug, Default)]
pub struct SchemaWalker {
    options: WalkerOptions,
}

/// One pending node of the depth-first walk.
struct Visit<'s> {
    node: &'s Schema,
    /// Accumulated diagnostic path down to this node.
    path: String,
    /// Fullnames of the named types currently being expanded on this
    /// branch, for cycle detection.
    ancestors: Vec<String>,
    /// Textual default captured from the enclosing record field.
    default: Option<String>,
    /// Whether a union on the way down contained null.
    nullable: bool,
}

impl SchemaWalker {
    /// A walker with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A walker with explicit options.
    pub fn with_options(options: WalkerOptions) -> Self {
        Self { options }
    }

    /// Flatten `root` into an ordered field list.
    ///
    /// # Errors
    /// Returns [`SchemaError`] for structurally broken schemas: recursive
    /// named types, references to undefined names, or directly nested
    /// unions. Unsupported leaf types are not errors; those fields are
    /// dropped (with a `tracing` warning).
    pub fn flatten(&self, root: &Schema) -> SchemaResult<SchemaDescription> {
        let mut fields: Vec<FieldDescriptor> = Vec::new();
        let mut names: HashMap<String, &Schema> = HashMap::new();
        let mut stack: Vec<Visit<'_>> = vec![Visit {
            node: root,
            path: String::new(),
            ancestors: Vec::new(),
            default: None,
            nullable: false,
        }];

        while let Some(visit) = stack.pop() {
            register_named(&mut names, visit.node);
            match visit.node {
                Schema::Array(array) => {
                    stack.push(Visit {
                        node: &array.items,
                        path: format!("{}{ARRAY_MARKER}", visit.path),
                        ..visit
                    });
                }
                Schema::Map(map) => {
                    stack.push(Visit {
                        node: &map.types,
                        path: format!("{}{MAP_MARKER}", visit.path),
                        ..visit
                    });
                }
                Schema::Record(record) => {
                    let mut ancestors = visit.ancestors;
                    ancestors.push(fullname(&record.name));
                    for field in record.fields.iter().rev() {
                        let path = if visit.path.is_empty() {
                            field.name.clone()
                        } else {
                            format!("{}.{}", visit.path, field.name)
                        };
                        stack.push(Visit {
                            node: &field.schema,
                            path,
                            ancestors: ancestors.clone(),
                            default: default_text(field.default.as_ref()),
                            nullable: visit.nullable,
                        });
                    }
                }
                Schema::Union(union) => {
                    let mut nullable = visit.nullable;
                    let mut leaves: Vec<&Schema> = Vec::new();
                    let mut containers: Vec<&Schema> = Vec::new();
                    for member in union.variants() {
                        match resolve(member, &names)? {
                            Schema::Null => nullable = true,
                            Schema::Union(_) => return Err(SchemaError::NestedUnion),
                            // Push the unresolved member so reference
                            // cycles are still caught when it is popped.
                            Schema::Record(_) | Schema::Array(_) | Schema::Map(_) => {
                                containers.push(member)
                            }
                            resolved => leaves.push(resolved),
                        }
                    }
                    match leaves.as_slice() {
                        [] => {}
                        [single] => {
                            self.push_leaf(&mut fields, &visit.path, single, nullable, visit.default.clone())
                        }
                        // Several distinct leaf alternatives cannot be
                        // represented in one typed column; fall back to
                        // their string forms.
                        _ => self.push_string_leaf(&mut fields, &visit.path, nullable, visit.default.clone()),
                    }
                    for member in containers.into_iter().rev() {
                        stack.push(Visit {
                            node: member,
                            path: visit.path.clone(),
                            ancestors: visit.ancestors.clone(),
                            default: None,
                            nullable,
                        });
                    }
                }
                Schema::Ref { name } => {
                    let full = fullname(name);
                    if visit.ancestors.iter().any(|a| a == &full) {
                        return Err(SchemaError::RecursiveType(full));
                    }
                    let resolved = *names
                        .get(&full)
                        .ok_or(SchemaError::UnresolvedRef(full))?;
                    stack.push(Visit {
                        node: resolved,
                        ..visit
                    });
                }
                leaf => self.push_leaf(&mut fields, &visit.path, leaf, visit.nullable, visit.default),
            }
        }

        resolve_collisions(&mut fields, self.options.name_strategy);
        Ok(SchemaDescription::new(fields))
    }

    fn push_leaf(
        &self,
        fields: &mut Vec<FieldDescriptor>,
        path: &str,
        node: &Schema,
        allow_null: bool,
        default: Option<String>,
    ) {
        let Some(format_type) = FormatType::of(node) else {
            warn!(path, "Avro type has no engine mapping; dropping field");
            return;
        };
        fields.push(self.descriptor(path, format_type, allow_null, default));
    }

    fn push_string_leaf(
        &self,
        fields: &mut Vec<FieldDescriptor>,
        path: &str,
        allow_null: bool,
        default: Option<String>,
    ) {
        fields.push(self.descriptor(path, FormatType::StringOrEnum, allow_null, default));
    }

    fn descriptor(
        &self,
        path: &str,
        format_type: FormatType,
        allow_null: bool,
        default: Option<String>,
    ) -> FieldDescriptor {
        FieldDescriptor {
            format_path: path.to_string(),
            format_field_name: path.to_string(),
            engine_field_name: self.engine_name(path),
            format_type,
            engine_type: format_type.engine_type(),
            allow_null,
            default_value: default,
            date_format: None,
        }
    }

    /// The last path segment with container markers stripped, or the
    /// placeholder when nothing usable remains.
    fn engine_name(&self, path: &str) -> String {
        let mut segment = path.rsplit('.').next().unwrap_or(path);
        loop {
            if let Some(stripped) = segment.strip_suffix(ARRAY_MARKER) {
                segment = stripped;
            } else if let Some(stripped) = segment.strip_suffix(MAP_MARKER) {
                segment = stripped;
            } else {
                break;
            }
        }
        if segment.is_empty() {
            self.options.placeholder.clone()
        } else {
            segment.to_string()
        }
    }
}

/// Record named types as they are first seen, so later references can be
/// resolved. Avro requires a name to be defined before it is referenced.
fn register_named<'s>(names: &mut HashMap<String, &'s Schema>, node: &'s Schema) {
    let name = match node {
        Schema::Record(record) => &record.name,
        Schema::Enum(inner) => &inner.name,
        Schema::Fixed(inner) => &inner.name,
        _ => return,
    };
    names.entry(fullname(name)).or_insert(node);
}

fn resolve<'s>(
    member: &'s Schema,
    names: &HashMap<String, &'s Schema>,
) -> SchemaResult<&'s Schema> {
    match member {
        Schema::Ref { name } => {
            let full = fullname(name);
            names
                .get(&full)
                .copied()
                .ok_or(SchemaError::UnresolvedRef(full))
        }
        other => Ok(other),
    }
}

fn fullname(name: &Name) -> String {
    match &name.namespace {
        Some(namespace) => format!("{namespace}.{}", name.name),
        None => name.name.clone(),
    }
}

fn default_text(default: Option<&serde_json::Value>) -> Option<String> {
    match default? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rename earlier fields that collide with later ones by appending `-N`.
///
/// One pass implements the documented order-dependent behavior: each
/// field is only checked against the fields after it, so two fields
/// renamed into the same suffix in different chains can survive a single
/// pass. [`NameStrategy::Stable`] repeats the pass until nothing changes.
fn resolve_collisions(fields: &mut [FieldDescriptor], strategy: NameStrategy) {
    loop {
        let mut changed = false;
        for i in 0..fields.len() {
            let (head, tail) = fields.split_at_mut(i + 1);
            let current = &mut head[i];
            if !tail
                .iter()
                .any(|f| f.engine_field_name == current.engine_field_name)
            {
                continue;
            }
            let base = current.engine_field_name.clone();
            let mut n = 1;
            let mut candidate = format!("{base}-{n}");
            while tail.iter().any(|f| f.engine_field_name == candidate) {
                n += 1;
                candidate = format!("{base}-{n}");
            }
            current.engine_field_name = candidate;
            changed = true;
        }
        if strategy == NameStrategy::SinglePass || !changed {
            break;
        }
    }
}
