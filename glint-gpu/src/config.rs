//! Typed program configuration, the string parameter bridge and JSON manifests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::program::{ProgramDesc, ProgramSource};
use crate::registry::DEFAULT_GROUP;
use crate::types::{ShaderLanguage, ShaderStage};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown program parameter '{0}'")]
    UnknownParameter(String),
    #[error("Invalid boolean value '{0}'")]
    InvalidBool(String),
    #[error("Invalid definition for program '{name}': {message}")]
    InvalidDefinition { name: String, message: String },
    #[error("Manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed form of the three configurable program options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Child programs to attach, in link order.
    pub attach: Vec<String>,
    pub preprocessor_defines: String,
    pub column_major_matrices: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            attach: Vec::new(),
            preprocessor_defines: String::new(),
            column_major_matrices: true,
        }
    }
}

impl ProgramConfig {
    pub fn with_attach<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attach.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_defines(mut self, defines: impl Into<String>) -> Self {
        self.preprocessor_defines = defines.into();
        self
    }

    pub fn with_column_major_matrices(mut self, column_major: bool) -> Self {
        self.column_major_matrices = column_major;
        self
    }
}

/// Names of the string-configurable program options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramParameter {
    /// Space-separated child names. Setting attaches each one.
    Attach,
    PreprocessorDefines,
    ColumnMajorMatrices,
}

impl ProgramParameter {
    pub const ALL: [ProgramParameter; 3] = [
        ProgramParameter::Attach,
        ProgramParameter::PreprocessorDefines,
        ProgramParameter::ColumnMajorMatrices,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProgramParameter::Attach => "attach",
            ProgramParameter::PreprocessorDefines => "preprocessor_defines",
            ProgramParameter::ColumnMajorMatrices => "column_major_matrices",
        }
    }
}

impl fmt::Display for ProgramParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgramParameter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|param| param.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownParameter(s.to_string()))
    }
}

/// Canonical text for a boolean parameter.
pub fn format_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Parse boolean parameter text: `true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`.
pub fn parse_bool(text: &str) -> Result<bool, ConfigError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool(text.to_string())),
    }
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

/// One program entry of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDefinition {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub language: ShaderLanguage,
    #[serde(default)]
    pub stage: ShaderStage,
    /// Source file, resolved through the manifest's search paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Inline source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub config: ProgramConfig,
    /// Extra options in string form, applied through the parameter bridge.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ProgramDefinition {
    pub fn desc(&self) -> Result<ProgramDesc, ConfigError> {
        let source = match (&self.file, &self.source) {
            (Some(file), None) => ProgramSource::File(file.clone()),
            (None, Some(text)) => ProgramSource::Inline(text.clone()),
            (Some(_), Some(_)) => {
                return Err(self.invalid("both 'file' and 'source' are set"));
            }
            (None, None) => return Err(self.invalid("one of 'file' or 'source' is required")),
        };

        Ok(ProgramDesc {
            language: self.language,
            stage: self.stage,
            source,
        })
    }

    fn invalid(&self, message: &str) -> ConfigError {
        ConfigError::InvalidDefinition {
            name: self.name.clone(),
            message: message.to_string(),
        }
    }
}

/// A set of programs to register together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramManifest {
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    #[serde(default)]
    pub programs: Vec<ProgramDefinition>,
}

impl ProgramManifest {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a manifest file. Relative search paths are resolved against the
    /// manifest's directory, which is also appended as a final search path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut manifest = Self::from_json(&fs::read_to_string(path)?)?;

        let base = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        for search_path in &mut manifest.search_paths {
            if search_path.is_relative() {
                *search_path = base.join(&*search_path);
            }
        }
        manifest.search_paths.push(base);

        debug!(
            "Loaded manifest {} ({} programs)",
            path.display(),
            manifest.programs.len()
        );
        Ok(manifest)
    }

    pub fn program(&self, name: &str) -> Option<&ProgramDefinition> {
        self.programs.iter().find(|p| p.name == name)
    }

    pub fn program_mut(&mut self, name: &str) -> Option<&mut ProgramDefinition> {
        self.programs.iter_mut().find(|p| p.name == name)
    }
}
