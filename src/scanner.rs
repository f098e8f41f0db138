use crate::openapi_builder::{parse_yaml, BuildInput};
use crate::parser::CommentParser;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into
const SKIPPED_DIRS: [&str; 2] = ["target", "node_modules"];

/// File scanner for collecting OpenAPI fragments from a project.
///
/// The `FileScanner` recursively walks through a project directory and collects two kinds of
/// files: YAML files (`.yaml`, `.yml`) holding document fragments, and source files whose
/// documentation comments may carry `@openapi` fragments or `@typedef` declarations. Hidden
/// directories, `target` and `node_modules` are skipped.
///
/// # Example
///
/// ```no_run
/// use openapi_from_fragments::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} YAML files", result.yaml_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    source_extensions: Vec<String>,
}

/// Result of directory scanning operation.
///
/// Contains the discovered files and any warnings encountered during scanning.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// YAML files with document fragments
    pub yaml_files: Vec<PathBuf>,
    /// Source files whose doc comments are inspected
    pub source_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    ///
    /// Source files default to the `js` extension.
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            source_extensions: vec!["js".to_string()],
        }
    }

    /// Replaces the extensions of source files scanned for doc comments.
    pub fn with_source_extensions(mut self, extensions: Vec<String>) -> Self {
        self.source_extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// Scans the directory tree and classifies files.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut result = ScanResult::default();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_skipped =
                    e.file_type().is_dir() && SKIPPED_DIRS.iter().any(|d| *d == file_name);
                !is_hidden && !is_skipped
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if !path.is_file() {
                        continue;
                    }
                    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
                    if extension == "yaml" || extension == "yml" {
                        result.yaml_files.push(path.to_path_buf());
                    } else if self.source_extensions.iter().any(|e| e == extension) {
                        result.source_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    result.warnings.push(warning);
                }
            }
        }

        debug!(
            "Scan found {} YAML files and {} source files",
            result.yaml_files.len(),
            result.source_files.len()
        );
        Ok(result)
    }
}

impl ScanResult {
    /// Reads the scanned files into build input.
    ///
    /// Every YAML file becomes one fragment text and every `/** ... */` block of a source file
    /// becomes one doc-comment text. Unreadable files are skipped and reported in the returned
    /// warnings.
    pub fn gather(&self) -> (BuildInput, Vec<String>) {
        let mut input = BuildInput::default();
        let mut warnings = Vec::new();

        for path in &self.yaml_files {
            match fs::read_to_string(path) {
                Ok(text) => input.yaml.push(text),
                Err(e) => {
                    let warning = format!("Failed to read {}: {}", path.display(), e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        for path in &self.source_files {
            match fs::read_to_string(path) {
                Ok(text) => {
                    let blocks = CommentParser::blocks(&text);
                    debug!("{}: {} doc comments", path.display(), blocks.len());
                    input.jsdoc.extend(blocks.into_iter().map(str::to_string));
                }
                Err(e) => {
                    let warning = format!("Failed to read {}: {}", path.display(), e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        (input, warnings)
    }
}

/// Loads runtime model schemas from a JSON or YAML file mapping names to schemas.
pub fn load_models(path: &Path) -> Result<IndexMap<String, Value>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read models file: {}", path.display()))?;
    let value = parse_yaml(&text)
        .with_context(|| format!("Failed to parse models file: {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => anyhow::bail!(
            "Models file must map schema names to schemas: {}",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_classifies_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("api.yaml"), "paths: {}").unwrap();
        fs::write(root.join("more.yml"), "tags: []").unwrap();
        fs::write(root.join("handlers.js"), "/** @typedef {Object} A */").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(names(&result.yaml_files), vec!["api.yaml", "more.yml"]);
        assert_eq!(names(&result.source_files), vec!["handlers.js"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();

        assert!(result.yaml_files.is_empty());
        assert!(result.source_files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_skips_hidden_and_dependency_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::create_dir(root.join("target")).unwrap();
        fs::create_dir_all(root.join("src/routes")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        fs::write(root.join(".git/config.yaml"), "").unwrap();
        fs::write(root.join("target/out.js"), "").unwrap();
        fs::write(root.join("src/routes/users.js"), "").unwrap();
        fs::write(root.join("src/routes/users.yaml"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(names(&result.source_files), vec!["users.js"]);
        assert_eq!(names(&result.yaml_files), vec!["users.yaml"]);
    }

    #[test]
    fn test_custom_source_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.js"), "").unwrap();
        fs::write(root.join("b.ts"), "").unwrap();
        fs::write(root.join("c.mjs"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf())
            .with_source_extensions(vec![".ts".to_string(), "mjs".to_string()])
            .scan()
            .unwrap();

        assert_eq!(names(&result.source_files), vec!["b.ts", "c.mjs"]);
    }

    #[test]
    fn test_gather_extracts_comment_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("api.yaml"), "paths: {}\n").unwrap();
        fs::write(
            root.join("models.js"),
            "/** @typedef {Object} A */\nconst a = 1;\n/* not a doc */\n/**\n * @typedef {Object} B\n */\n",
        )
        .unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();
        let (input, warnings) = result.gather();

        assert!(warnings.is_empty());
        assert_eq!(input.yaml, vec!["paths: {}\n".to_string()]);
        assert_eq!(
            input.jsdoc,
            vec![
                "/** @typedef {Object} A */".to_string(),
                "/**\n * @typedef {Object} B\n */".to_string()
            ]
        );
    }

    #[test]
    fn test_gather_reports_unreadable_files() {
        let result = ScanResult {
            yaml_files: vec![PathBuf::from("/nonexistent/api.yaml")],
            ..Default::default()
        };
        let (input, warnings) = result.gather();
        assert!(input.yaml.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_load_models() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models.json");
        fs::write(&path, r#"{"User": {"type": "object"}, "Id": {"type": "integer"}}"#).unwrap();

        let models = load_models(&path).unwrap();
        let keys: Vec<&String> = models.keys().collect();
        assert_eq!(keys, vec!["User", "Id"]);
        assert_eq!(models["Id"], json!({"type": "integer"}));

        fs::write(&path, "- not\n- a map\n").unwrap();
        assert!(load_models(&path).is_err());
    }

    #[test]
    fn test_load_models_expands_merge_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models.yaml");
        fs::write(
            &path,
            "Audited: &audited\n  type: object\n  description: audited\nUser:\n  <<: *audited\n  title: User\n",
        )
        .unwrap();

        let models = load_models(&path).unwrap();
        assert_eq!(
            models["User"],
            json!({"type": "object", "description": "audited", "title": "User"})
        );
    }
}
