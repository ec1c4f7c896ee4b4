//! Glint Preprocess Crate
//!
//! Text-level preprocessing for shader sources. This crate is GPU-agnostic and
//! turns raw shader text plus a caller-supplied define list into a single
//! translation unit ready for a driver compiler.
//!
//! The pipeline runs in three steps:
//! - [`parse_defines`] splits a flat `NAME=VALUE,NAME` list into ordered pairs
//! - [`resolve_includes`] inlines `#include` directives through a [`SourceProvider`]
//! - a [`PreprocessorEngine`] expands macros and evaluates conditionals

pub mod defines;
pub mod engine;
pub mod include;

pub use defines::{MacroDefine, parse_defines};
pub use engine::{PreprocessError, PreprocessResult, Preprocessor, PreprocessorEngine};
pub use include::{FileSystemSources, IncludeError, MemorySources, SourceProvider, resolve_includes};
