use crate::error::{Error, Result};
use crate::type_parser::{parse_type, TypeNode};
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use serde_json::Value;

/// Type names emitted as `{type: <name>}` instead of a `$ref`
const JSON_SCHEMA_TYPES: [&str; 7] = [
    "null", "boolean", "object", "array", "number", "string", "integer",
];

const BOOLEAN_LITERALS: [&str; 2] = ["true", "false"];

/// Prefix of local schema references
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed literal values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Properties for object types, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Extra OpenAPI keywords such as `format` or `example`
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// The `items` keyword of an array schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Items {
    /// Every element has the same schema
    Single(Box<Schema>),
    /// One schema per position
    Tuple(Vec<Schema>),
}

impl Schema {
    /// `{type: <name>}`
    pub fn of_type(name: &str) -> Self {
        Schema {
            schema_type: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// `{$ref: "#/components/schemas/<name>"}`
    pub fn reference_to(name: &str) -> Self {
        Schema {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
            ..Default::default()
        }
    }

    /// `{type: "array", items: <items>}`
    pub fn array_of(items: Schema) -> Self {
        Schema {
            items: Some(Items::Single(Box::new(items))),
            ..Schema::of_type("array")
        }
    }

    pub fn is_array(&self) -> bool {
        self.schema_type.as_deref() == Some("array")
    }
}

/// Parses `text` as a type expression and converts it.
pub fn convert_type(text: &str) -> Result<Schema> {
    let node = parse_type(text)?;
    convert(&node)
}

/// Converts a parsed type expression into a schema fragment.
///
/// Plain names become either a builtin `type` or a `$ref` to
/// `#/components/schemas/<name>`. Unions of string or number literals become
/// enums, other unions `oneOf`, intersections `allOf`. `Array<T>` and `T[]`
/// become array schemas.
///
/// # Errors
///
/// [`Error::UnsupportedType`] for node kinds with no schema equivalent
/// (`?`, `?T`, `!T`, `T=`, `...T`) and [`Error::UnsupportedGeneric`] for
/// generics other than `Array`.
pub fn convert(node: &TypeNode) -> Result<Schema> {
    match node {
        TypeNode::Name(name) => Ok(name_to_schema(name)),
        TypeNode::Number(value) => {
            let kind = if is_integral(*value) { "integer" } else { "number" };
            Ok(Schema {
                enum_values: Some(vec![number_value(*value)]),
                ..Schema::of_type(kind)
            })
        }
        TypeNode::Str(value) => Ok(Schema {
            enum_values: Some(vec![Value::String(value.clone())]),
            ..Schema::of_type("string")
        }),
        TypeNode::Union(..) => convert_union(node),
        TypeNode::Intersection(..) => {
            let arms = chain_arms(node);
            let all_of = arms.into_iter().map(convert).collect::<Result<Vec<_>>>()?;
            Ok(Schema {
                all_of: Some(all_of),
                ..Schema::of_type("object")
            })
        }
        TypeNode::Parenthesis(inner) => convert(inner),
        // Non-standard marker kept for compatibility with existing documents
        TypeNode::Any => Ok(Schema::of_type("{}")),
        TypeNode::Record(entries) => {
            let mut properties = IndexMap::new();
            for (key, value) in entries {
                properties.insert(key.clone(), convert(value)?);
            }
            Ok(Schema {
                properties: Some(properties),
                ..Schema::of_type("object")
            })
        }
        TypeNode::Generic { subject, objects } => {
            if !subject.eq_ignore_ascii_case("array") {
                return Err(Error::UnsupportedGeneric(subject.clone()));
            }
            match objects.first() {
                Some(element) => Ok(Schema::array_of(convert(element)?)),
                None => Err(Error::UnsupportedGeneric(subject.clone())),
            }
        }
        other => Err(Error::UnsupportedType(other.kind().to_string())),
    }
}

fn name_to_schema(name: &str) -> Schema {
    let lower = name.to_lowercase();
    if BOOLEAN_LITERALS.contains(&lower.as_str()) {
        Schema::of_type("boolean")
    } else if JSON_SCHEMA_TYPES.contains(&lower.as_str()) {
        Schema::of_type(&lower)
    } else {
        Schema::reference_to(name)
    }
}

fn convert_union(node: &TypeNode) -> Result<Schema> {
    let arms = chain_arms(node);

    let strings: Option<Vec<Value>> = arms
        .iter()
        .map(|arm| match arm {
            TypeNode::Str(s) => Some(Value::String(s.clone())),
            _ => None,
        })
        .collect();
    if let Some(values) = strings {
        return Ok(Schema {
            enum_values: Some(values),
            ..Schema::of_type("string")
        });
    }

    let numbers: Option<Vec<f64>> = arms
        .iter()
        .map(|arm| match arm {
            TypeNode::Number(n) => Some(*n),
            _ => None,
        })
        .collect();
    if let Some(values) = numbers {
        let kind = if values.iter().all(|v| is_integral(*v)) {
            "integer"
        } else {
            "number"
        };
        return Ok(Schema {
            enum_values: Some(values.into_iter().map(number_value).collect()),
            ..Schema::of_type(kind)
        });
    }

    debug!("Union of {} mixed arms, using oneOf", arms.len());
    let one_of = arms.into_iter().map(convert).collect::<Result<Vec<_>>>()?;
    Ok(Schema {
        one_of: Some(one_of),
        ..Default::default()
    })
}

/// Flattens a right-nested chain of the same binary operator into its arms.
fn chain_arms(node: &TypeNode) -> Vec<&TypeNode> {
    let mut arms = Vec::new();
    let mut current = node;
    loop {
        match (node, current) {
            (TypeNode::Union(..), TypeNode::Union(left, right))
            | (TypeNode::Intersection(..), TypeNode::Intersection(left, right)) => {
                arms.push(left.as_ref());
                current = right.as_ref();
            }
            _ => {
                arms.push(current);
                return arms;
            }
        }
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

/// Integral values are emitted as JSON integers so `1` stays `1`, not `1.0`
fn number_value(value: f64) -> Value {
    if is_integral(value) && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
