use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// OpenAPI from Fragments - Assemble an OpenAPI document from YAML fragments and JSDoc comments
#[derive(Parser, Debug)]
#[command(name = "openapi-from-fragments")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Extension of source files whose doc comments are read (repeatable)
    #[arg(short = 'e', long = "source-ext", value_name = "EXT", default_value = "js")]
    pub source_extensions: Vec<String>,

    /// JSON or YAML file mapping model names to ready-made schemas
    #[arg(short = 'm', long = "models", value_name = "FILE")]
    pub models_path: Option<PathBuf>,

    /// Write the build errors as JSON to this file
    #[arg(long = "errors", value_name = "FILE")]
    pub errors_path: Option<PathBuf>,

    /// Exit with an error if the build recorded any errors
    #[arg(long = "strict")]
    pub strict: bool,

    /// API title for the info section
    #[arg(long = "title")]
    pub title: Option<String>,

    /// API version for the info section
    #[arg(long = "api-version", value_name = "VERSION")]
    pub api_version: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    if let Some(ref models) = args.models_path {
        if !models.is_file() {
            anyhow::bail!("Models file does not exist: {}", models.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    info!("Source extensions: {:?}", args.source_extensions);

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::openapi_builder::OpenApiBuilder;
    use crate::scanner::{load_models, FileScanner};
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};

    info!("Starting OpenAPI document assembly...");

    // Step 1: Scan directory for fragment files
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone())
        .with_source_extensions(args.source_extensions.clone());
    let scan_result = scanner.scan()?;
    info!(
        "Found {} YAML files and {} source files",
        scan_result.yaml_files.len(),
        scan_result.source_files.len()
    );

    // Step 2: Read fragments and doc comments
    let (input, read_warnings) = scan_result.gather();
    info!(
        "Collected {} YAML fragments and {} doc comments",
        input.yaml.len(),
        input.jsdoc.len()
    );

    // Step 3: Feed the builder
    let mut builder = OpenApiBuilder::new();
    if args.title.is_some() || args.api_version.is_some() {
        builder = builder.with_info(
            args.title
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            args.api_version.clone().unwrap_or_else(|| "1.0.0".to_string()),
        );
    }
    for text in &input.yaml {
        builder.add_yaml(text);
    }
    for text in &input.jsdoc {
        builder.add_jsdoc(text);
    }
    let mut model_count = 0;
    if let Some(ref models_path) = args.models_path {
        for (name, schema) in load_models(models_path)? {
            builder.add_model(name, schema);
            model_count += 1;
        }
        info!("Loaded {} model schemas", model_count);
    }

    // Step 4: Build
    info!("Building OpenAPI document...");
    let output = builder.build();

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&output.document)?,
        OutputFormat::Json => serialize_json(&output.document)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    if let Some(errors_path) = &args.errors_path {
        write_to_file(&serialize_json(&output.errors)?, errors_path)?;
        info!("Wrote build errors to {}", errors_path.display());
    }

    // Step 6: Display summary
    info!("Assembly complete!");
    info!("Summary:");
    info!("  - YAML files: {}", scan_result.yaml_files.len());
    info!("  - Source files: {}", scan_result.source_files.len());
    info!("  - Doc comments: {}", input.jsdoc.len());
    info!("  - Models: {}", model_count);
    info!("  - Errors: {}", output.errors.len());
    info!(
        "  - Warnings: {}",
        scan_result.warnings.len() + read_warnings.len() + output.warnings.len()
    );

    if args.strict && output.has_errors() {
        anyhow::bail!("Build recorded {} errors", output.errors.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["openapi-from-fragments"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = args(&["."]);
        assert!(matches!(args.output_format, OutputFormat::Yaml));
        assert_eq!(args.source_extensions, vec!["js".to_string()]);
        assert!(args.output_path.is_none());
        assert!(!args.strict);
    }

    #[test]
    fn test_repeated_source_extensions() {
        let args = args(&[".", "-e", "js", "-e", "ts", "-f", "json"]);
        assert_eq!(args.source_extensions, vec!["js".to_string(), "ts".to_string()]);
        assert!(matches!(args.output_format, OutputFormat::Json));
    }

    #[test]
    fn test_validation_rejects_missing_paths() {
        assert!(parse_args_from_parsed(args(&["/nonexistent/project"])).is_err());

        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "").unwrap();
        assert!(parse_args_from_parsed(args(&[file.to_str().unwrap()])).is_err());

        let root = temp_dir.path().to_str().unwrap();
        assert!(parse_args_from_parsed(args(&[root, "-m", "/nonexistent/models.json"])).is_err());
        assert!(parse_args_from_parsed(args(&[root])).is_ok());
    }

    #[test]
    fn test_run_strict_fails_on_missing_reference() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(
            root.join("api.yaml"),
            "paths:\n  /u:\n    get:\n      responses:\n        200:\n          content:\n            application/json:\n              schema:\n                $ref: '#/components/schemas/User'\n",
        )
        .unwrap();
        let out = root.join("out/openapi.json");
        let errors = root.join("out/errors.json");

        let lenient = args(&[
            root.to_str().unwrap(),
            "-f",
            "json",
            "-o",
            out.to_str().unwrap(),
            "--errors",
            errors.to_str().unwrap(),
        ]);
        run(lenient).unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&errors).unwrap()).unwrap();
        assert_eq!(report[0]["error"], "type User not-found");
        assert!(out.exists());

        let strict = args(&[root.to_str().unwrap(), "-o", out.to_str().unwrap(), "--strict"]);
        assert!(run(strict).is_err());
    }

    #[test]
    fn test_run_strict_ignores_root_type_warnings() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("api.yaml"), "paths:\n  /a:\n    $ref: '#/components/schemas/A'\n").unwrap();
        fs::write(root.join("types.js"), "/** @typedef {Map<string, number>} A */\n").unwrap();
        let out = root.join("openapi.yaml");

        let strict = args(&[root.to_str().unwrap(), "-o", out.to_str().unwrap(), "--strict"]);
        run(strict).unwrap();

        let doc: serde_json::Value =
            serde_yaml::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(doc["components"]["schemas"]["A"]["type"], "object");
    }
}
