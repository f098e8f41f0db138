//! Translation of `@typedef` comment blocks into schemas.
//!
//! A block such as
//!
//! ```text
//! /**
//!  * A user
//!  * @typedef {Object} User
//!  * @property {string} name Display name
//!  * @property {Object} [address] Postal address
//!  * @property {string} address.city City
//!  * @propertyOpenapi {name} example Ann
//!  */
//! ```
//!
//! becomes one object schema titled `User`. Dotted property names attach to a
//! property declared earlier in the same block, and `@propertyOpenapi {prop} key value`
//! sets an extra OpenAPI keyword on a declared property.

use crate::error::{Error, Result};
use crate::parser::{CommentBlock, Tag};
use crate::schema_generator::{convert_type, Items, Schema};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;

/// Tag that declares a named type
pub const TYPEDEF_TAG: &str = "typedef";
/// Tag that declares a property of the type
pub const PROPERTY_TAG: &str = "property";
/// Tag that injects an OpenAPI keyword into a declared property
pub const EXTENSION_TAG: &str = "propertyOpenapi";

/// The schema built from one typedef block.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// The declared type name
    pub name: String,
    pub schema: Schema,
    /// Properties that were skipped, with the reason
    pub problems: Vec<Error>,
    /// The root type could not be converted and `{type: "object"}` was used
    pub root_type_error: Option<Error>,
}

/// One step from a schema to a nested schema
#[derive(Debug, Clone)]
enum Step {
    Property(String),
    Item(usize),
}

fn node_at<'a>(root: &'a mut Schema, path: &[Step]) -> Option<&'a mut Schema> {
    let mut node = root;
    for step in path {
        node = match step {
            Step::Property(name) => node.properties.as_mut()?.get_mut(name)?,
            Step::Item(index) => match node.items.as_mut()? {
                Items::Tuple(items) => items.get_mut(*index)?,
                Items::Single(_) => return None,
            },
        };
    }
    Some(node)
}

/// Translates a comment block into a schema.
///
/// Returns `Ok(None)` when the block has no `@typedef` tag.
///
/// Declarations are processed in source order. A property `a.b` requires `a`
/// to be declared earlier in the block; otherwise it is skipped and reported in
/// [`Translation::problems`], as are properties whose type cannot be converted.
/// Properties of an array-typed parent become positional `items`, tracked by
/// `minItems` (non-optional count) and `maxItems` (total count).
///
/// # Errors
///
/// [`Error::MissingTypedefName`] when the `@typedef` tag has no name.
pub fn translate(block: &CommentBlock) -> Result<Option<Translation>> {
    let typedef = match block.find_tag(TYPEDEF_TAG) {
        Some(tag) => tag,
        None => return Ok(None),
    };
    if typedef.name.is_empty() {
        return Err(Error::MissingTypedefName);
    }
    debug!("Translating typedef {}", typedef.name);

    let mut root_type_error = None;
    let mut root = if typedef.type_expr.is_empty() {
        Schema::of_type("object")
    } else {
        match convert_type(&typedef.type_expr) {
            Ok(schema) => schema,
            Err(e) => {
                warn!("Typedef {} root type ignored: {}", typedef.name, e);
                root_type_error = Some(e);
                Schema::of_type("object")
            }
        }
    };
    root.title = Some(typedef.name.clone());
    if !block.description.is_empty() {
        root.description = Some(block.description.clone());
    }

    let mut declared: HashMap<String, Vec<Step>> = HashMap::new();
    let mut problems = Vec::new();

    for tag in &block.tags {
        let outcome = match tag.tag.as_str() {
            PROPERTY_TAG => add_property(&mut root, &mut declared, tag),
            EXTENSION_TAG => add_extension(&mut root, &declared, tag),
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            debug!("Typedef {}: {}", typedef.name, e);
            problems.push(e);
        }
    }

    Ok(Some(Translation {
        name: typedef.name.clone(),
        schema: root,
        problems,
        root_type_error,
    }))
}

fn property_schema(tag: &Tag) -> Result<Schema> {
    let mut schema = if tag.type_expr.is_empty() {
        Schema::default()
    } else {
        convert_type(&tag.type_expr)?
    };
    if !tag.description.is_empty() {
        schema.description = Some(tag.description.clone());
    }
    if let Some(default) = &tag.default {
        let value = serde_json::from_str(default).unwrap_or_else(|_| Value::String(default.clone()));
        schema.default = Some(value);
    }
    if tag.optional {
        schema.nullable = Some(true);
    }
    Ok(schema)
}

fn add_property(
    root: &mut Schema,
    declared: &mut HashMap<String, Vec<Step>>,
    tag: &Tag,
) -> Result<()> {
    let (parent_name, leaf) = match tag.name.rsplit_once('.') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", tag.name.as_str()),
    };
    let mut path = if parent_name.is_empty() {
        Vec::new()
    } else {
        declared
            .get(parent_name)
            .cloned()
            .ok_or_else(|| Error::UndeclaredParent {
                property: tag.name.clone(),
                parent: parent_name.to_string(),
            })?
    };

    let property = property_schema(tag)?;
    let parent = node_at(root, &path).ok_or_else(|| Error::UndeclaredParent {
        property: tag.name.clone(),
        parent: parent_name.to_string(),
    })?;

    let step = if parent.is_array() {
        let items = match parent.items.get_or_insert_with(|| Items::Tuple(Vec::new())) {
            Items::Tuple(items) => items,
            Items::Single(_) => {
                return Err(Error::HomogeneousArrayParent {
                    property: tag.name.clone(),
                    parent: parent_name.to_string(),
                })
            }
        };
        items.push(property);
        let count = items.len();
        if !tag.optional {
            parent.min_items = Some(parent.min_items.unwrap_or(0) + 1);
        }
        parent.max_items = Some(count);
        Step::Item(count - 1)
    } else {
        parent
            .properties
            .get_or_insert_with(IndexMap::new)
            .insert(leaf.to_string(), property);
        if !tag.optional {
            let required = parent.required.get_or_insert_with(Vec::new);
            if !required.iter().any(|r| r == leaf) {
                required.push(leaf.to_string());
            }
        }
        Step::Property(leaf.to_string())
    };

    path.push(step);
    declared.insert(tag.name.clone(), path);
    Ok(())
}

fn add_extension(root: &mut Schema, declared: &HashMap<String, Vec<Step>>, tag: &Tag) -> Result<()> {
    let unknown = || Error::UnknownExtensionTarget {
        property: tag.type_expr.clone(),
        keyword: tag.name.clone(),
    };
    if tag.name.is_empty() {
        return Ok(());
    }
    let path = declared.get(&tag.type_expr).ok_or_else(unknown)?;
    let node = node_at(root, path).ok_or_else(unknown)?;
    node.extensions
        .insert(tag.name.clone(), Value::String(tag.description.clone()));
    Ok(())
}
