use crate::merge::merge;
use crate::parser::{CommentBlock, CommentParser};
use crate::typedef::{translate, TYPEDEF_TAG};
use crate::walk::schema_refs;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Top-level sections a fragment may contribute
pub const MAIN_SECTIONS: [&str; 5] = ["servers", "paths", "components", "security", "tags"];

/// Sub-sections of `components` a fragment may contribute
pub const COMPONENT_SECTIONS: [&str; 9] = [
    "schemas",
    "responses",
    "parameters",
    "examples",
    "requestBodies",
    "headers",
    "securitySchemes",
    "links",
    "callbacks",
];

/// Doc-comment tag whose body is a YAML fragment
pub const OPENAPI_TAG: &str = "openapi";

pub const OPENAPI_VERSION: &str = "3.0.0";

/// Category of a build error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildErrorKind {
    /// A YAML fragment could not be parsed
    YamlParse,
    /// A doc-comment block has syntax problems
    JsdocParse,
    /// The YAML inside an `@openapi` tag is invalid or not a mapping
    JsdocEmbeddedYaml,
    /// A typedef or one of its properties could not be translated
    JsdocTypedef,
    /// A `$ref` names a schema nobody defines
    MissingReference,
}

/// A problem recorded during a build. Builds never fail as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildError {
    pub kind: BuildErrorKind,
    /// The text being processed when the error occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "error")]
    pub message: String,
}

/// Everything a build consumes.
#[derive(Debug, Clone, Default)]
pub struct BuildInput {
    /// Raw YAML documents, each rooted at the OpenAPI document root
    pub yaml: Vec<String>,
    /// Texts containing `/** ... */` documentation blocks
    pub jsdoc: Vec<String>,
    /// Ready-made schemas of runtime data models, by name
    pub models: IndexMap<String, Value>,
}

/// Result of a build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    /// The assembled OpenAPI document
    pub document: Value,
    pub errors: Vec<BuildError>,
    /// Low-severity diagnostics, e.g. a typedef root type replaced by `object`
    pub warnings: Vec<BuildError>,
}

/// OpenAPI document builder
///
/// Collects fragments, typedef schemas and model schemas, then merges the
/// fragments and pulls every referenced schema into `components.schemas`.
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Value,
    /// Normalized fragments in collection order
    fragments: Vec<Map<String, Value>>,
    /// Schemas translated from `@typedef` blocks
    typedefs: IndexMap<String, Value>,
    /// Schemas supplied by runtime models
    models: IndexMap<String, Value>,
    errors: Vec<BuildError>,
    warnings: Vec<BuildError>,
}

/// Parses YAML text into a JSON value, expanding `<<` merge keys.
pub fn parse_yaml(text: &str) -> Result<Value, serde_yaml::Error> {
    let mut value: serde_yaml::Value = serde_yaml::from_str(text)?;
    value.apply_merge()?;
    Ok(yaml_to_json(value))
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Mapping keys such as `200:` are not strings in YAML
fn yaml_key(key: serde_yaml::Value) -> String {
    match yaml_to_json(key) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Drops every key that is not an OpenAPI section the build merges.
pub fn normalize(fragment: &mut Map<String, Value>) {
    fragment.retain(|key, _| MAIN_SECTIONS.contains(&key.as_str()));
    if let Some(Value::Object(components)) = fragment.get_mut("components") {
        components.retain(|key, _| COMPONENT_SECTIONS.contains(&key.as_str()));
    }
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: json!({
                "title": env!("CARGO_PKG_NAME"),
                "version": "1.0.0",
            }),
            fragments: Vec::new(),
            typedefs: IndexMap::new(),
            models: IndexMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String) -> Self {
        self.info = json!({ "title": title, "version": version });
        self
    }

    fn record(&mut self, kind: BuildErrorKind, source: Option<&str>, message: String) {
        warn!("{:?}: {}", kind, message);
        self.errors.push(BuildError {
            kind,
            source: source.map(str::to_string),
            message,
        });
    }

    /// Add an already parsed fragment. Keys outside the mergeable sections are dropped.
    pub fn add_fragment(&mut self, fragment: Map<String, Value>) {
        let mut fragment = fragment;
        normalize(&mut fragment);
        self.fragments.push(fragment);
    }

    /// Add a YAML fragment rooted at the document root.
    ///
    /// A parse failure, or a document that is neither empty nor a mapping, is
    /// recorded as a `yaml-parse` error and the fragment is skipped.
    pub fn add_yaml(&mut self, text: &str) {
        match parse_yaml(text) {
            Ok(Value::Object(map)) => self.add_fragment(map),
            Ok(Value::Null) => debug!("Skipping empty YAML fragment"),
            Ok(other) => self.record(
                BuildErrorKind::YamlParse,
                Some(text),
                format!("fragment must be a mapping, got {}", type_name(&other)),
            ),
            Err(e) => self.record(BuildErrorKind::YamlParse, Some(text), e.to_string()),
        }
    }

    /// Add a text containing documentation blocks.
    ///
    /// Every `@openapi` tag contributes its YAML body as a fragment and every
    /// `@typedef` block contributes a schema to the typedef pool. Blocks with
    /// syntax problems are skipped entirely.
    pub fn add_jsdoc(&mut self, text: &str) {
        for block in CommentParser::parse(text) {
            if !block.problems.is_empty() {
                let message = block
                    .problems
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                self.record(BuildErrorKind::JsdocParse, Some(text), message);
                continue;
            }

            for tag in block.tags.iter().filter(|t| t.tag == OPENAPI_TAG) {
                match parse_yaml(&tag.description) {
                    Ok(Value::Object(map)) => {
                        if !map.is_empty() {
                            self.add_fragment(map);
                        }
                    }
                    Ok(other) => self.record(
                        BuildErrorKind::JsdocEmbeddedYaml,
                        Some(text),
                        format!("parsed result must be a mapping, got {}", type_name(&other)),
                    ),
                    Err(e) => {
                        self.record(BuildErrorKind::JsdocEmbeddedYaml, Some(text), e.to_string())
                    }
                }
            }

            if block.find_tag(TYPEDEF_TAG).is_some() {
                self.add_typedef_block(&block, text);
            }
        }
    }

    fn add_typedef_block(&mut self, block: &CommentBlock, text: &str) {
        let translation = match translate(block) {
            Ok(Some(translation)) => translation,
            Ok(None) => return,
            Err(e) => {
                self.record(BuildErrorKind::JsdocTypedef, Some(text), e.to_string());
                return;
            }
        };
        for problem in &translation.problems {
            self.record(
                BuildErrorKind::JsdocTypedef,
                Some(text),
                format!("typedef {}: {}", translation.name, problem),
            );
        }
        if let Some(e) = &translation.root_type_error {
            self.warnings.push(BuildError {
                kind: BuildErrorKind::JsdocTypedef,
                source: Some(text.to_string()),
                message: format!("typedef {}: root type replaced by object: {}", translation.name, e),
            });
        }
        match serde_json::to_value(&translation.schema) {
            Ok(schema) => {
                debug!("Registered typedef {}", translation.name);
                self.typedefs.insert(translation.name, schema);
            }
            Err(e) => self.record(BuildErrorKind::JsdocTypedef, Some(text), e.to_string()),
        }
    }

    /// Add the schema of a runtime data model.
    pub fn add_model(&mut self, name: String, schema: Value) {
        self.models.insert(name, schema);
    }

    /// Build the final OpenAPI document
    ///
    /// Fragments are merged in the order they were added. Afterwards every
    /// `$ref` to `#/components/schemas/<Name>` without a definition is filled
    /// from the typedef pool, then from the models, repeating until no new
    /// names appear. Names found in neither are reported once as
    /// `type <Name> not-found` and their `$ref`s are left as they are.
    pub fn build(mut self) -> BuildOutput {
        debug!("Merging {} fragments", self.fragments.len());
        let mut document = Map::new();
        document.insert("openapi".to_string(), Value::String(OPENAPI_VERSION.to_string()));
        document.insert("info".to_string(), self.info.clone());
        for fragment in std::mem::take(&mut self.fragments) {
            merge(&mut document, fragment);
        }
        let mut document = Value::Object(document);

        let mut unresolved: Vec<String> = Vec::new();
        loop {
            let needed: Vec<String> = schema_refs(&document)
                .into_iter()
                .filter(|name| !has_schema(&document, name) && !unresolved.contains(name))
                .collect();
            if needed.is_empty() {
                break;
            }
            debug!("Resolving schemas: {:?}", needed);

            for name in needed {
                let schema = self
                    .typedefs
                    .get(&name)
                    .or_else(|| self.models.get(&name))
                    .cloned();
                let installed = match (schema, schemas_mut(&mut document)) {
                    (Some(schema), Some(schemas)) => {
                        schemas.insert(name.clone(), schema);
                        true
                    }
                    _ => false,
                };
                if !installed {
                    self.record(
                        BuildErrorKind::MissingReference,
                        None,
                        format!("type {} not-found", name),
                    );
                    unresolved.push(name);
                }
            }
        }

        BuildOutput {
            document,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn has_schema(document: &Value, name: &str) -> bool {
    document
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .is_some_and(|schemas| schemas.contains_key(name))
}

/// `components.schemas`, created when missing. `None` when a fragment put a
/// non-mapping value at either level.
fn schemas_mut(document: &mut Value) -> Option<&mut Map<String, Value>> {
    document
        .as_object_mut()?
        .entry("components")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()?
        .entry("schemas")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

/// Builds a document from raw inputs in one call.
pub fn build(input: BuildInput) -> BuildOutput {
    let mut builder = OpenApiBuilder::new();
    for text in &input.yaml {
        builder.add_yaml(text);
    }
    for text in &input.jsdoc {
        builder.add_jsdoc(text);
    }
    for (name, schema) in input.models {
        builder.add_model(name, schema);
    }
    builder.build()
}

impl BuildOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(yaml: &[&str], jsdoc: &[&str]) -> BuildInput {
        BuildInput {
            yaml: yaml.iter().map(|s| s.to_string()).collect(),
            jsdoc: jsdoc.iter().map(|s| s.to_string()).collect(),
            models: IndexMap::new(),
        }
    }

    #[test]
    fn test_empty_build() {
        let output = build(BuildInput::default());
        assert_eq!(
            output.document,
            json!({
                "openapi": "3.0.0",
                "info": {"title": "openapi-from-fragments", "version": "1.0.0"}
            })
        );
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_with_info() {
        let output = OpenApiBuilder::new()
            .with_info("My API".to_string(), "2.0.0".to_string())
            .build();
        assert_eq!(output.document["info"], json!({"title": "My API", "version": "2.0.0"}));
    }

    #[test]
    fn test_normalization_drops_unknown_keys() {
        let yaml = r#"
openapi: 3.1.0
info:
  title: ignored
x-custom: 1
paths:
  /a:
    get:
      summary: a
components:
  schemas:
    A:
      type: string
  bogus:
    B: {}
"#;
        let output = build(input(&[yaml], &[]));
        assert_eq!(
            output.document,
            json!({
                "openapi": "3.0.0",
                "info": {"title": "openapi-from-fragments", "version": "1.0.0"},
                "paths": {"/a": {"get": {"summary": "a"}}},
                "components": {"schemas": {"A": {"type": "string"}}}
            })
        );
    }

    #[test]
    fn test_first_fragment_wins_and_collections_merge() {
        let first = "paths:\n  /a:\n    get:\n      summary: first\ntags:\n  - name: x\n";
        let second = "paths:\n  /a:\n    get:\n      summary: second\n  /b:\n    get: {}\ntags:\n  - name: x\n  - name: y\n";
        let output = build(input(&[first, second], &[]));
        assert_eq!(output.document["paths"]["/a"]["get"]["summary"], json!("first"));
        assert_eq!(output.document["paths"]["/b"], json!({"get": {}}));
        assert_eq!(output.document["tags"], json!([{"name": "x"}, {"name": "y"}]));
    }

    #[test]
    fn test_numeric_yaml_keys_become_strings() {
        let yaml = "paths:\n  /a:\n    get:\n      responses:\n        200:\n          description: ok\n";
        let output = build(input(&[yaml], &[]));
        assert_eq!(
            output.document["paths"]["/a"]["get"]["responses"]["200"],
            json!({"description": "ok"})
        );
    }

    #[test]
    fn test_bad_yaml_is_recorded_and_skipped() {
        let output = build(input(&["paths: [unclosed", "- a\n- b\n", "paths:\n  /ok: {}\n"], &[]));
        assert_eq!(output.errors.len(), 2);
        assert!(output.errors.iter().all(|e| e.kind == BuildErrorKind::YamlParse));
        assert_eq!(output.errors[1].message, "fragment must be a mapping, got sequence");
        assert_eq!(output.document["paths"], json!({"/ok": {}}));
    }

    #[test]
    fn test_embedded_openapi_fragment() {
        let jsdoc = "/**\n * @openapi\n * paths:\n *   /r1:\n *     get:\n *       summary: r1\n */";
        let output = build(input(&[], &[jsdoc]));
        assert!(output.errors.is_empty());
        assert_eq!(output.document["paths"]["/r1"], json!({"get": {"summary": "r1"}}));
    }

    #[test]
    fn test_embedded_yaml_errors() {
        let scalar = "/**\n * @openapi\n * just text\n */";
        let broken = "/**\n * @openapi\n * paths: [\n */";
        let output = build(input(&[], &[scalar, broken]));
        assert_eq!(output.errors.len(), 2);
        assert_eq!(output.errors[0].kind, BuildErrorKind::JsdocEmbeddedYaml);
        assert_eq!(output.errors[0].message, "parsed result must be a mapping, got string");
        assert_eq!(output.errors[0].source.as_deref(), Some(scalar));
        assert_eq!(output.errors[1].kind, BuildErrorKind::JsdocEmbeddedYaml);
    }

    #[test]
    fn test_block_with_problems_is_skipped() {
        let jsdoc = "/**\n * @typedef {Object Broken\n * @property {string} a A\n */";
        let output = build(input(&["paths:\n  /a:\n    $ref: '#/components/schemas/Broken'\n"], &[jsdoc]));
        assert_eq!(output.errors[0].kind, BuildErrorKind::JsdocParse);
        assert_eq!(output.errors[1].kind, BuildErrorKind::MissingReference);
        assert_eq!(output.errors[1].message, "type Broken not-found");
    }

    #[test]
    fn test_typedef_reference_is_installed() {
        let yaml = "paths:\n  /u:\n    get:\n      responses:\n        default:\n          content:\n            application/json:\n              schema:\n                $ref: '#/components/schemas/User'\n";
        let jsdoc = "/**\n * User\n * @typedef {Object} User\n * @property {string} name Name\n */";
        let output = build(input(&[yaml], &[jsdoc]));
        assert!(output.errors.is_empty());
        assert_eq!(
            output.document["components"]["schemas"]["User"],
            json!({
                "type": "object",
                "title": "User",
                "description": "User",
                "properties": {"name": {"type": "string", "description": "Name"}},
                "required": ["name"]
            })
        );
    }

    #[test]
    fn test_transitive_resolution_prefers_typedef_over_model() {
        let yaml = "paths:\n  /o:\n    $ref: '#/components/schemas/Order'\n";
        let jsdoc = "/**\n * @typedef {Object} Order\n * @property {Line[]} lines Lines\n * @property {Customer} customer Who\n */\n/**\n * @typedef {Object} Line\n * @property {number} qty Qty\n */";
        let mut data = input(&[yaml], &[jsdoc]);
        data.models.insert("Customer".to_string(), json!({"type": "object", "x-model": true}));
        data.models.insert("Line".to_string(), json!({"type": "string"}));
        data.models.insert("Unused".to_string(), json!({"type": "string"}));

        let output = build(data);
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        let schemas = output.document["components"]["schemas"].as_object().unwrap();
        let names: Vec<&String> = schemas.keys().collect();
        assert_eq!(names, vec!["Order", "Line", "Customer"]);
        assert_eq!(schemas["Line"]["title"], json!("Line"));
        assert_eq!(schemas["Customer"], json!({"type": "object", "x-model": true}));
    }

    #[test]
    fn test_existing_schema_is_not_replaced() {
        let yaml = "paths:\n  /a:\n    $ref: '#/components/schemas/A'\ncomponents:\n  schemas:\n    A:\n      type: integer\n";
        let jsdoc = "/** @typedef {Object} A */";
        let output = build(input(&[yaml], &[jsdoc]));
        assert_eq!(output.document["components"]["schemas"]["A"], json!({"type": "integer"}));
    }

    #[test]
    fn test_missing_reference_reported_once() {
        let yaml = "paths:\n  /a:\n    get:\n      $ref: '#/components/schemas/Ghost'\n    post:\n      $ref: '#/components/schemas/Ghost'\n";
        let output = build(input(&[yaml], &[]));
        assert_eq!(
            output.errors,
            vec![BuildError {
                kind: BuildErrorKind::MissingReference,
                source: None,
                message: "type Ghost not-found".to_string(),
            }]
        );
        assert_eq!(
            output.document["paths"]["/a"]["get"],
            json!({"$ref": "#/components/schemas/Ghost"})
        );
    }

    #[test]
    fn test_missing_reference_inside_installed_schema() {
        let yaml = "paths:\n  /a:\n    $ref: '#/components/schemas/A'\n";
        let jsdoc = "/**\n * @typedef {Object} A\n * @property {B} b B\n */";
        let output = build(input(&[yaml], &[jsdoc]));
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].message, "type B not-found");
        assert!(output.document["components"]["schemas"].get("A").is_some());
    }

    #[test]
    fn test_typedef_problems_become_errors() {
        let jsdoc = "/**\n * @typedef {Object} A\n * @property {string} x.y Y\n */";
        let output = build(input(&[], &[jsdoc]));
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].kind, BuildErrorKind::JsdocTypedef);
        assert_eq!(
            output.errors[0].message,
            "typedef A: property x.y is declared before its parent x"
        );
    }

    #[test]
    fn test_yaml_merge_keys_are_expanded() {
        let yaml = "components:\n  schemas:\n    Base: &base\n      type: object\n      nullable: true\n    Child:\n      <<: *base\n      title: c\n";
        let output = build(input(&[yaml], &[]));
        assert!(output.errors.is_empty());
        assert_eq!(
            output.document["components"]["schemas"]["Child"],
            json!({"type": "object", "nullable": true, "title": "c"})
        );
        assert!(output.document["components"]["schemas"]["Child"].get("<<").is_none());
    }

    #[test]
    fn test_typedef_with_multiline_record_resolves() {
        let yaml = "paths:\n  /t:\n    $ref: '#/components/schemas/T'\n";
        let jsdoc = "/**\n * @typedef {Object} T\n * @property {{\n *   id: integer\n * }} key\n */";
        let output = build(input(&[yaml], &[jsdoc]));
        assert!(output.errors.is_empty(), "errors: {:?}", output.errors);
        assert_eq!(
            output.document["components"]["schemas"]["T"]["properties"]["key"],
            json!({"type": "object", "properties": {"id": {"type": "integer"}}})
        );
    }

    #[test]
    fn test_route_outside_paths_is_dropped() {
        let jsdoc = "/**\n * @openapi\n * /r4:\n *   post:\n *     summary: r4\n */";
        let output = build(input(&[], &[jsdoc]));
        assert!(output.errors.is_empty());
        assert!(output.document.get("/r4").is_none());
        assert!(output.document.get("paths").is_none());
    }

    #[test]
    fn test_root_type_failure_is_a_warning() {
        let yaml = "paths:\n  /a:\n    $ref: '#/components/schemas/A'\n";
        let jsdoc = "/** @typedef {Map<string, number>} A */";
        let output = build(input(&[yaml], &[jsdoc]));
        assert!(output.errors.is_empty());
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].kind, BuildErrorKind::JsdocTypedef);
        assert_eq!(
            output.document["components"]["schemas"]["A"],
            json!({"type": "object", "title": "A"})
        );
    }

    #[test]
    fn test_non_mapping_components_does_not_loop() {
        let yaml = "components: 5\npaths:\n  /a:\n    $ref: '#/components/schemas/A'\n";
        let jsdoc = "/** @typedef {Object} A */";
        let output = build(input(&[yaml], &[jsdoc]));
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].kind, BuildErrorKind::MissingReference);
    }

    #[test]
    fn test_rebuilding_output_is_idempotent() {
        let yaml = "paths:\n  /a:\n    $ref: '#/components/schemas/A'\ntags:\n  - name: t\n";
        let jsdoc = "/**\n * @typedef {Object} A\n * @property {string} s S\n */";
        let first = build(input(&[yaml], &[jsdoc]));

        let mut builder = OpenApiBuilder::new();
        builder.add_fragment(first.document.as_object().unwrap().clone());
        let second = builder.build();
        assert_eq!(second.document, first.document);
        assert!(second.errors.is_empty());
    }

    #[test]
    fn test_error_serialization() {
        let error = BuildError {
            kind: BuildErrorKind::MissingReference,
            source: None,
            message: "type X not-found".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"kind": "missing-reference", "error": "type X not-found"})
        );
    }
}
