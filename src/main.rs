//! OpenAPI from Fragments - Command-line tool for assembling OpenAPI documents.
//!
//! This binary scans a project for YAML fragment files and JSDoc comments, merges every
//! `@openapi` fragment into one OpenAPI 3.0 document and fills `components.schemas` with
//! the schemas of `@typedef` declarations and model files referenced from it.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-fragments [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! openapi-from-fragments ./my-api-project -o openapi.yaml
//! ```
//!
//! Generate JSON with TypeScript sources and a models file:
//! ```bash
//! openapi-from-fragments ./my-api-project -f json -e ts -m models.json -o openapi.json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-from-fragments ./my-api-project -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_fragments::cli;

fn main() -> Result<()> {
    // Parse first so the verbose flag can configure the logger
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from Fragments starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("OpenAPI document assembly completed successfully");

    Ok(())
}
