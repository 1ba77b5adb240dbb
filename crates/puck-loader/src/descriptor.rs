//! Endpoint descriptors
//!
//! An [`EndpointDescriptor`] describes one data source end to end: where it is
//! fetched from, where its files land on disk, how they are rediscovered, and
//! which relation they are loaded into.

use crate::error::{LoadError, LoadResult};
use glob::Pattern;
use puck_common::template::{self, Params};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Schema used when a descriptor does not name one
pub const DEFAULT_SCHEMA: &str = "raw";

/// Pattern used when a descriptor does not name one
pub const DEFAULT_FILE_PATTERN: &str = "*";

/// Lower-case, unquoted PostgreSQL identifier (NAMEDATALEN - 1 bytes max)
const IDENTIFIER_PATTERN: &str = r"^[a-z_][a-z0-9_]{0,62}$";

/// Load semantics of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Only files absent from the ledger are loaded
    #[default]
    Append,
    /// The table and its ledger entries are cleared before every load
    Overwrite,
}

impl LoadMode {
    pub fn is_overwrite(self) -> bool {
        matches!(self, LoadMode::Overwrite)
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Append => f.pad("append"),
            LoadMode::Overwrite => f.pad("overwrite"),
        }
    }
}

impl FromStr for LoadMode {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" => Ok(LoadMode::Append),
            "overwrite" => Ok(LoadMode::Overwrite),
            _ => Err(LoadError::config(format!("Invalid load mode: {}", s))),
        }
    }
}

/// Immutable description of one data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    url_template: String,
    file_name_template: String,
    output_directory: PathBuf,
    schema_name: String,
    table_name: String,
    load_mode: LoadMode,
    array_unwrap_key: Option<String>,
    file_pattern: Pattern,
    recursive: bool,
}

impl EndpointDescriptor {
    /// Start a descriptor for `schema.table_name` (schema defaults to `raw`)
    pub fn builder(table_name: impl Into<String>) -> EndpointDescriptorBuilder {
        EndpointDescriptorBuilder::new(table_name)
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn file_name_template(&self) -> &str {
        &self.file_name_template
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    pub fn array_unwrap_key(&self) -> Option<&str> {
        self.array_unwrap_key.as_deref()
    }

    pub fn file_pattern(&self) -> &Pattern {
        &self.file_pattern
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// `schema.table`, for messages and ledger keys
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    /// Quoted relation name safe to splice into SQL
    pub fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema_name, self.table_name)
    }

    /// Quoted schema name safe to splice into SQL
    pub fn quoted_schema(&self) -> String {
        format!("\"{}\"", self.schema_name)
    }

    pub fn build_url(&self, params: &Params) -> LoadResult<String> {
        Ok(template::render(&self.url_template, params)?)
    }

    /// Resolve the file name, appending `.json` when the template lacks it
    pub fn build_file_name(&self, params: &Params) -> LoadResult<String> {
        let name = template::render(&self.file_name_template, params)?;
        Ok(ensure_json_extension(name))
    }

    /// `output_directory / build_file_name(params)`
    pub fn build_file_path(&self, params: &Params) -> LoadResult<PathBuf> {
        Ok(self.output_directory.join(self.build_file_name(params)?))
    }

    /// Placeholders the URL and file-name templates expect
    pub fn required_params(&self) -> Vec<String> {
        let mut names = template::placeholders(&self.url_template);
        for name in template::placeholders(&self.file_name_template) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Append `.json` unless the name already ends with it
pub fn ensure_json_extension(name: String) -> String {
    if name.ends_with(".json") {
        name
    } else {
        format!("{}.json", name)
    }
}

/// Builder for [`EndpointDescriptor`]; `build` validates identifiers and the glob
#[derive(Debug, Clone)]
pub struct EndpointDescriptorBuilder {
    url_template: String,
    file_name_template: Option<String>,
    output_directory: PathBuf,
    schema_name: String,
    table_name: String,
    load_mode: LoadMode,
    array_unwrap_key: Option<String>,
    file_pattern: Option<String>,
    recursive: bool,
}

impl EndpointDescriptorBuilder {
    fn new(table_name: impl Into<String>) -> Self {
        Self {
            url_template: String::new(),
            file_name_template: None,
            output_directory: PathBuf::from("."),
            schema_name: DEFAULT_SCHEMA.to_string(),
            table_name: table_name.into(),
            load_mode: LoadMode::Append,
            array_unwrap_key: None,
            file_pattern: None,
            recursive: false,
        }
    }

    pub fn url(mut self, url_template: impl Into<String>) -> Self {
        self.url_template = url_template.into();
        self
    }

    pub fn file_name(mut self, file_name_template: impl Into<String>) -> Self {
        self.file_name_template = Some(file_name_template.into());
        self
    }

    pub fn output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = dir.into();
        self
    }

    pub fn schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = schema_name.into();
        self
    }

    pub fn load_mode(mut self, load_mode: LoadMode) -> Self {
        self.load_mode = load_mode;
        self
    }

    pub fn overwrite(self) -> Self {
        self.load_mode(LoadMode::Overwrite)
    }

    pub fn array_unwrap_key(mut self, key: impl Into<String>) -> Self {
        self.array_unwrap_key = Some(key.into());
        self
    }

    pub fn file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = Some(pattern.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn build(self) -> LoadResult<EndpointDescriptor> {
        validate_identifier("schema", &self.schema_name)?;
        validate_identifier("table", &self.table_name)?;

        let file_name_template = self
            .file_name_template
            .unwrap_or_else(|| format!("{}.json", self.table_name));
        if file_name_template.is_empty() {
            return Err(LoadError::config(format!(
                "{}.{}: file name template cannot be empty",
                self.schema_name, self.table_name
            )));
        }

        if matches!(self.array_unwrap_key.as_deref(), Some("")) {
            return Err(LoadError::config(format!(
                "{}.{}: array unwrap key cannot be empty",
                self.schema_name, self.table_name
            )));
        }

        let raw_pattern = self
            .file_pattern
            .unwrap_or_else(|| DEFAULT_FILE_PATTERN.to_string());
        let file_pattern = Pattern::new(&raw_pattern).map_err(|e| {
            LoadError::config(format!(
                "{}.{}: invalid file pattern '{}': {}",
                self.schema_name, self.table_name, raw_pattern, e
            ))
        })?;

        Ok(EndpointDescriptor {
            url_template: self.url_template,
            file_name_template,
            output_directory: self.output_directory,
            schema_name: self.schema_name,
            table_name: self.table_name,
            load_mode: self.load_mode,
            array_unwrap_key: self.array_unwrap_key,
            file_pattern,
            recursive: self.recursive,
        })
    }
}

/// Check that `value` is a lower-case SQL identifier safe to quote and splice
pub fn validate_identifier(kind: &str, value: &str) -> LoadResult<()> {
    let identifier = Regex::new(IDENTIFIER_PATTERN).map_err(|e| LoadError::config(e.to_string()))?;
    if identifier.is_match(value) {
        Ok(())
    } else {
        Err(LoadError::config(format!(
            "Invalid {} name '{}': expected lower-case letters, digits and underscores",
            kind, value
        )))
    }
}
