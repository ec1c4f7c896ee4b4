use glint_preprocess::{IncludeError, PreprocessError};

use crate::compiler::CompileError;
use crate::config::ConfigError;
use crate::registry::RegistryError;

/// Errors surfaced by program load, attach and link operations.
///
/// `name` fields hold the program's display name, already quoted.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("Failed to preprocess shader {name}")]
    PreprocessFailed {
        name: String,
        #[source]
        source: Option<PreprocessError>,
    },
    #[error("Failed to resolve includes of shader {name}")]
    IncludeFailed {
        name: String,
        #[source]
        source: IncludeError,
    },
    #[error("Shader source file '{path}' not found")]
    SourceNotFound { path: String },
    #[error("Failed to compile shader {name}")]
    CompileFailed {
        name: String,
        #[source]
        source: CompileError,
    },
    #[error("Shader {name} is not loaded")]
    NotLoaded { name: String },
    #[error("Shader {program} cannot link: attached shader '{child}' is gone or not compiled")]
    MissingAttachment { program: String, child: String },
    #[error("Unknown shader program {0}")]
    UnknownProgram(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
