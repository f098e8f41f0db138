//! OpenAPI from Fragments - Assemble OpenAPI documents from scattered fragments.
//!
//! API descriptions often live next to the code they describe: YAML files in route
//! directories, `@openapi` blocks in JSDoc comments, and `@typedef` declarations for the
//! data shapes. This library collects those pieces, merges them into a single OpenAPI 3.0
//! document and resolves every `#/components/schemas/<Name>` reference from typedefs or
//! runtime model schemas.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively scans project directories for YAML and source files
//! 2. [`parser`] - Splits JSDoc blocks into descriptions and tags
//! 3. [`type_parser`] - Parses JSDoc type expressions into a syntax tree
//! 4. [`schema_generator`] - Converts type expressions to OpenAPI schemas
//! 5. [`typedef`] - Translates a `@typedef` block into a named object schema
//! 6. [`merge`] - Deep-merges fragments into the document
//! 7. [`walk`] - Finds `$ref`s in a document
//! 8. [`openapi_builder`] - Constructs the complete OpenAPI document
//! 9. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```
//! use openapi_from_fragments::openapi_builder::{build, BuildInput};
//!
//! let output = build(BuildInput {
//!     yaml: vec!["paths:\n  /users:\n    get:\n      responses:\n        200:\n          description: ok\n          content:\n            application/json:\n              schema:\n                $ref: '#/components/schemas/User'\n".to_string()],
//!     jsdoc: vec!["/**\n * @typedef {Object} User\n * @property {string} name\n */".to_string()],
//!     ..Default::default()
//! });
//!
//! assert!(output.errors.is_empty());
//! assert_eq!(output.document["components"]["schemas"]["User"]["type"], "object");
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod cli;
pub mod error;
pub mod merge;
pub mod openapi_builder;
pub mod parser;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_parser;
pub mod typedef;
pub mod walk;
