//! [`ShaderCompiler`] backed by naga's GLSL front end and validator.

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use tracing::debug;

use crate::compiler::{CompileError, CompileRequest, NativeShader, ShaderCompiler};
use crate::types::{ShaderLanguage, ShaderStage};

/// A parsed and validated naga module.
#[derive(Debug)]
pub struct NagaModule {
    pub module: naga::Module,
    pub info: ModuleInfo,
    pub stage: ShaderStage,
}

/// Compiles desktop GLSL into naga IR. GLSL ES is not accepted by the front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct NagaCompiler;

impl NagaCompiler {
    pub fn new() -> Self {
        Self
    }
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Compute => naga::ShaderStage::Compute,
    }
}

impl ShaderCompiler for NagaCompiler {
    fn supports(&self, language: ShaderLanguage) -> bool {
        language == ShaderLanguage::Glsl
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<NativeShader, CompileError> {
        if !self.supports(request.language) {
            return Err(CompileError::UnsupportedLanguage {
                language: request.language,
            });
        }

        let options = naga::front::glsl::Options::from(naga_stage(request.stage));
        let module = naga::front::glsl::Frontend::default()
            .parse(&options, request.source)
            .map_err(|e| CompileError::Rejected {
                name: request.name.to_string(),
                message: e.emit_to_string(request.source),
            })?;

        let info = Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|e| CompileError::Rejected {
                name: request.name.to_string(),
                message: e.emit_to_string(request.source),
            })?;

        debug!(
            "naga: '{}' compiled ({} entry points, {} functions)",
            request.name,
            module.entry_points.len(),
            module.functions.len()
        );

        Ok(NativeShader::new(
            request.name,
            NagaModule {
                module,
                info,
                stage: request.stage,
            },
        ))
    }

    fn link(
        &self,
        program: &str,
        shader: &NativeShader,
        attached: &[&NativeShader],
    ) -> Result<(), CompileError> {
        for native in std::iter::once(shader).chain(attached.iter().copied()) {
            if native.downcast_ref::<NagaModule>().is_none() {
                return Err(CompileError::LinkFailed {
                    name: program.to_string(),
                    message: format!("'{}' was not compiled by naga", native.label()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "#version 450\nvoid main() {\n    gl_Position = vec4(0.0, 0.0, 0.0, 1.0);\n}\n";

    fn request<'a>(source: &'a str, language: ShaderLanguage) -> CompileRequest<'a> {
        CompileRequest {
            name: "test",
            language,
            stage: ShaderStage::Vertex,
            source,
            check_errors: true,
        }
    }

    #[test]
    fn test_compiles_vertex_shader() {
        let native = NagaCompiler.compile(&request(VERTEX, ShaderLanguage::Glsl)).unwrap();
        let module = native.downcast_ref::<NagaModule>().unwrap();
        assert_eq!(module.stage, ShaderStage::Vertex);
        assert_eq!(module.module.entry_points.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_source() {
        let err = NagaCompiler
            .compile(&request("#version 450\nvoid main() { nope }\n", ShaderLanguage::Glsl))
            .unwrap_err();
        assert!(matches!(err, CompileError::Rejected { .. }));
    }

    #[test]
    fn test_rejects_embedded_dialect() {
        assert!(!NagaCompiler.supports(ShaderLanguage::GlslEs));
        let err = NagaCompiler
            .compile(&request(VERTEX, ShaderLanguage::GlslEs))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_link_requires_naga_modules() {
        let vertex = NagaCompiler.compile(&request(VERTEX, ShaderLanguage::Glsl)).unwrap();
        let foreign = NativeShader::new("foreign", 0usize);
        assert!(NagaCompiler.link("test", &vertex, &[]).is_ok());
        assert!(matches!(
            NagaCompiler.link("test", &vertex, &[&foreign]),
            Err(CompileError::LinkFailed { .. })
        ));
    }
}
