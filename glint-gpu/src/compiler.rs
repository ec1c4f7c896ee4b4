//! Driver seam: turning preprocessed text into native shader objects.

use std::any::Any;
use std::fmt;
use tracing::debug;

use crate::types::{ShaderLanguage, ShaderStage};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Shading language '{language}' is not supported by this compiler")]
    UnsupportedLanguage { language: ShaderLanguage },
    #[error("Compiler rejected '{name}':\n{message}")]
    Rejected { name: String, message: String },
    #[error("Link of '{name}' failed: {message}")]
    LinkFailed { name: String, message: String },
}

/// Everything a compiler needs to build one shader object.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub name: &'a str,
    pub language: ShaderLanguage,
    pub stage: ShaderStage,
    pub source: &'a str,
    /// Report diagnostics at `error` level when compilation fails.
    pub check_errors: bool,
}

/// Owned, type-erased compiled shader. Dropping it releases the driver object.
pub struct NativeShader {
    label: String,
    inner: Box<dyn Any>,
}

impl NativeShader {
    pub fn new<T: Any>(label: impl Into<String>, inner: T) -> Self {
        Self {
            label: label.into(),
            inner: Box::new(inner),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for NativeShader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeShader")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Drop for NativeShader {
    fn drop(&mut self) {
        debug!("Releasing native shader '{}'", self.label);
    }
}

/// Compiles and links shader objects for a graphics driver.
pub trait ShaderCompiler {
    fn supports(&self, language: ShaderLanguage) -> bool;

    fn compile(&self, request: &CompileRequest<'_>) -> Result<NativeShader, CompileError>;

    /// Link `shader` with `attached` children, in attachment order.
    fn link(
        &self,
        _program: &str,
        _shader: &NativeShader,
        _attached: &[&NativeShader],
    ) -> Result<(), CompileError> {
        Ok(())
    }
}

/// Accepts every dialect and every source. The native object is the source length.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCompiler;

impl ShaderCompiler for NullCompiler {
    fn supports(&self, _language: ShaderLanguage) -> bool {
        true
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<NativeShader, CompileError> {
        Ok(NativeShader::new(request.name, request.source.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_compiler_accepts_anything() {
        let request = CompileRequest {
            name: "anything",
            language: ShaderLanguage::GlslEs,
            stage: ShaderStage::Fragment,
            source: "not even glsl",
            check_errors: true,
        };
        let native = NullCompiler.compile(&request).unwrap();
        assert_eq!(native.label(), "anything");
        assert_eq!(native.downcast_ref::<usize>(), Some(&13));
        assert!(native.downcast_ref::<String>().is_none());
        assert!(NullCompiler.link("anything", &native, &[]).is_ok());
    }
}
