//! Glint GPU Crate
//!
//! Shader program resources on top of `glint-preprocess`: the program state
//! machine (preprocess, compile, attach, link, unload), a handle-based registry
//! with group-aware name lookup, the driver seam and a string parameter bridge
//! for generic configuration front ends.

pub mod compiler;
pub mod config;
pub mod error;
pub mod handle;
pub mod manager;
#[cfg(feature = "naga")]
pub mod naga_backend;
pub mod program;
pub mod registry;
pub mod types;

pub use compiler::{CompileError, CompileRequest, NativeShader, NullCompiler, ShaderCompiler};
pub use config::{
    ConfigError, ProgramConfig, ProgramDefinition, ProgramManifest, ProgramParameter,
    format_bool, parse_bool,
};
pub use error::ProgramError;
pub use handle::{Handle, IdAllocator};
pub use manager::ShaderManager;
#[cfg(feature = "naga")]
pub use naga_backend::{NagaCompiler, NagaModule};
pub use program::{AttachedShader, LoadContext, ProgramDesc, ProgramSource, ShaderProgram};
pub use registry::{DEFAULT_GROUP, GroupQuery, ProgramRegistry, RegistryError};
pub use types::{ProgramState, ShaderLanguage, ShaderStage};
