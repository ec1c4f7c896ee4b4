//! The shader program resource and its load / unload state machine.

use glint_preprocess::{
    MacroDefine, PreprocessorEngine, SourceProvider, parse_defines, resolve_includes,
};
use tracing::{debug, error, info};

use crate::compiler::{CompileRequest, NativeShader, ShaderCompiler};
use crate::error::ProgramError;
use crate::handle::Handle;
use crate::types::{ProgramState, ShaderLanguage, ShaderStage};

/// Where a program's source text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramSource {
    /// Source text held in memory.
    Inline(String),
    /// File name looked up through the [`SourceProvider`] on every load.
    File(String),
}

impl Default for ProgramSource {
    fn default() -> Self {
        ProgramSource::Inline(String::new())
    }
}

/// Creation parameters for a [`ShaderProgram`].
#[derive(Debug, Clone, Default)]
pub struct ProgramDesc {
    pub language: ShaderLanguage,
    pub stage: ShaderStage,
    pub source: ProgramSource,
}

impl ProgramDesc {
    pub fn inline(source: impl Into<String>) -> Self {
        Self {
            source: ProgramSource::Inline(source.into()),
            ..Default::default()
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            source: ProgramSource::File(path.into()),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: ShaderLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn with_stage(mut self, stage: ShaderStage) -> Self {
        self.stage = stage;
        self
    }
}

/// A child shader folded into a program's link step.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedShader {
    pub handle: Handle<ShaderProgram>,
    pub name: String,
}

/// Collaborators used while loading a program.
#[derive(Clone, Copy)]
pub struct LoadContext<'a> {
    pub engine: &'a dyn PreprocessorEngine,
    pub sources: &'a dyn SourceProvider,
    pub compiler: &'a dyn ShaderCompiler,
}

/// A GLSL shader program that is preprocessed, compiled and linked before use.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: Handle<ShaderProgram>,
    name: String,
    group: String,
    language: ShaderLanguage,
    stage: ShaderStage,
    source_filename: String,
    resolved_path: Option<String>,
    from_file: bool,
    source: String,
    preprocessor_defines: String,
    column_major_matrices: bool,
    attached: Vec<AttachedShader>,
    attached_names: String,
    linked: bool,
    state: ProgramState,
    compile_error: bool,
    native: Option<NativeShader>,
}

impl ShaderProgram {
    pub(crate) fn new(
        handle: Handle<ShaderProgram>,
        name: impl Into<String>,
        group: impl Into<String>,
        desc: ProgramDesc,
    ) -> Self {
        let (source_filename, from_file, source) = match desc.source {
            ProgramSource::Inline(text) => (String::new(), false, text),
            ProgramSource::File(path) => (path, true, String::new()),
        };

        Self {
            handle,
            name: name.into(),
            group: group.into(),
            language: desc.language,
            stage: desc.stage,
            source_filename,
            resolved_path: None,
            from_file,
            source,
            preprocessor_defines: String::new(),
            column_major_matrices: true,
            attached: Vec::new(),
            attached_names: String::new(),
            linked: false,
            state: ProgramState::Unloaded,
            compile_error: false,
            native: None,
        }
    }

    pub fn handle(&self) -> Handle<ShaderProgram> {
        self.handle
    }

    /// Unique id assigned at creation.
    pub fn shader_id(&self) -> u64 {
        self.handle.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn language(&self) -> ShaderLanguage {
        self.language
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Current source text. Fully expanded after a successful load.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    /// Path the source file was last read from, as reported by the [`SourceProvider`].
    pub fn resolved_path(&self) -> Option<&str> {
        self.resolved_path.as_deref()
    }

    pub fn is_loaded_from_file(&self) -> bool {
        self.from_file
    }

    /// Quoted file name for file-backed programs, quoted program name otherwise.
    pub fn display_name(&self) -> String {
        if self.from_file {
            format!("'{}'", self.source_filename)
        } else {
            format!("'{}'", self.name)
        }
    }

    pub fn preprocessor_defines(&self) -> &str {
        &self.preprocessor_defines
    }

    /// Stored verbatim, parsed on the next load.
    pub fn set_preprocessor_defines(&mut self, defines: impl Into<String>) {
        self.preprocessor_defines = defines.into();
    }

    pub fn column_major_matrices(&self) -> bool {
        self.column_major_matrices
    }

    pub fn set_column_major_matrices(&mut self, column_major: bool) {
        self.column_major_matrices = column_major;
    }

    /// Attached children in link order.
    pub fn attached(&self) -> &[AttachedShader] {
        &self.attached
    }

    /// Attached child names, each followed by a space.
    pub fn attached_names(&self) -> &str {
        &self.attached_names
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ProgramState::Loaded
    }

    /// Set by a failed compile, cleared by the next successful one.
    pub fn has_compile_error(&self) -> bool {
        self.compile_error
    }

    pub fn native(&self) -> Option<&NativeShader> {
        self.native.as_ref()
    }

    /// Macros handed to the preprocessor: `GL_ES=1` first for GLSL ES, then the
    /// parsed `preprocessor_defines` in order.
    pub fn macro_definitions(&self) -> Vec<MacroDefine> {
        let mut defines = Vec::new();
        if self.language.is_embedded() {
            defines.push(MacroDefine::new("GL_ES", "1"));
        }
        defines.extend(parse_defines(&self.preprocessor_defines));
        defines
    }

    /// Preprocess and compile. Does nothing if already loaded.
    #[tracing::instrument(level = "debug", skip_all, fields(program = %self.name))]
    pub fn load_high_level(&mut self, ctx: &LoadContext<'_>) -> Result<(), ProgramError> {
        if self.is_loaded() {
            debug!("{} already loaded", self.display_name());
            return Ok(());
        }

        let raw = if self.from_file {
            let (path, text) = ctx
                .sources
                .read(&self.source_filename, "")
                .ok_or_else(|| ProgramError::SourceNotFound {
                    path: self.source_filename.clone(),
                })?;
            debug!("Read {} from '{}'", self.display_name(), path);
            self.resolved_path = Some(path);
            text
        } else {
            self.source.clone()
        };

        self.load_from_source(&raw, ctx)
    }

    /// Run the preprocessing pipeline over `raw` and compile the result.
    /// `source` is replaced only once expansion has succeeded.
    pub fn load_from_source(&mut self, raw: &str, ctx: &LoadContext<'_>) -> Result<(), ProgramError> {
        let expanded = self.preprocess(raw, ctx)?;
        self.source = expanded;
        self.compile(ctx.compiler, true)
    }

    fn preprocess(&self, raw: &str, ctx: &LoadContext<'_>) -> Result<String, ProgramError> {
        let defines = self.macro_definitions();
        // Includes are looked up next to the file that was actually read.
        let include_root = match &self.resolved_path {
            Some(path) if self.from_file => path,
            _ if self.from_file => &self.source_filename,
            _ => &self.name,
        };

        let resolved = resolve_includes(raw, include_root, ctx.sources).map_err(|source| {
            ProgramError::IncludeFailed {
                name: self.display_name(),
                source,
            }
        })?;

        match ctx.engine.preprocess(&resolved, &defines) {
            Ok(expanded) if !expanded.is_empty() => {
                debug!(
                    "Preprocessed {} with {} defines: {} -> {} bytes",
                    self.display_name(),
                    defines.len(),
                    raw.len(),
                    expanded.len()
                );
                Ok(expanded)
            }
            Ok(_) => Err(ProgramError::PreprocessFailed {
                name: self.display_name(),
                source: None,
            }),
            Err(e) => Err(ProgramError::PreprocessFailed {
                name: self.display_name(),
                source: Some(e),
            }),
        }
    }

    /// Compile the current source. Any previous native shader is released first.
    pub fn compile(
        &mut self,
        compiler: &dyn ShaderCompiler,
        check_errors: bool,
    ) -> Result<(), ProgramError> {
        self.native = None;
        self.linked = false;
        self.state = ProgramState::Unloaded;

        let request = CompileRequest {
            name: &self.name,
            language: self.language,
            stage: self.stage,
            source: &self.source,
            check_errors,
        };

        match compiler.compile(&request) {
            Ok(native) => {
                self.native = Some(native);
                self.compile_error = false;
                self.state = ProgramState::Loaded;
                info!("Compiled shader {} (id {})", self.display_name(), self.shader_id());
                Ok(())
            }
            Err(e) => {
                self.compile_error = true;
                if check_errors {
                    error!("Shader {} failed to compile: {}", self.display_name(), e);
                }
                Err(ProgramError::CompileFailed {
                    name: self.display_name(),
                    source: e,
                })
            }
        }
    }

    pub(crate) fn push_attachment(&mut self, handle: Handle<ShaderProgram>, name: &str) {
        self.attached.push(AttachedShader {
            handle,
            name: name.to_string(),
        });
        self.attached_names.push_str(name);
        self.attached_names.push(' ');
    }

    pub(crate) fn mark_linked(&mut self) {
        self.linked = true;
    }

    /// Release the native shader and forget attachments. Identity fields and
    /// configuration survive for a later reload.
    pub fn unload(&mut self) {
        if self.state == ProgramState::Unloaded && self.native.is_none() && self.attached.is_empty()
        {
            return;
        }

        self.native = None;
        self.attached.clear();
        self.attached_names.clear();
        self.linked = false;
        self.state = ProgramState::Unloaded;
        debug!("Unloaded shader {}", self.display_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileError, NullCompiler};
    use glint_preprocess::{MemorySources, Preprocessor};

    struct RejectingCompiler;

    impl ShaderCompiler for RejectingCompiler {
        fn supports(&self, _language: ShaderLanguage) -> bool {
            true
        }

        fn compile(&self, request: &CompileRequest<'_>) -> Result<NativeShader, CompileError> {
            Err(CompileError::Rejected {
                name: request.name.to_string(),
                message: "syntax error".to_string(),
            })
        }
    }

    fn program(desc: ProgramDesc) -> ShaderProgram {
        ShaderProgram::new(Handle::new(1), "main", "General", desc)
    }

    #[test]
    fn test_defaults() {
        let p = program(ProgramDesc::inline("void main(){}"));
        assert!(p.column_major_matrices());
        assert_eq!(p.state(), ProgramState::Unloaded);
        assert_eq!(p.attached_names(), "");
        assert_eq!(p.shader_id(), 1);
        assert!(!p.is_loaded_from_file());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(program(ProgramDesc::inline("")).display_name(), "'main'");
        assert_eq!(
            program(ProgramDesc::file("shaders/main.vert")).display_name(),
            "'shaders/main.vert'"
        );
    }

    #[test]
    fn test_gl_es_define_comes_first() {
        let mut p = program(ProgramDesc::inline("").with_language(ShaderLanguage::GlslEs));
        p.set_preprocessor_defines("GL_ES=0,A=1");
        let defines = p.macro_definitions();
        assert_eq!(defines[0], MacroDefine::new("GL_ES", "1"));
        assert_eq!(defines[1], MacroDefine::new("GL_ES", "0"));
        assert_eq!(defines[2], MacroDefine::new("A", "1"));

        let desktop = program(ProgramDesc::inline(""));
        assert!(desktop.macro_definitions().is_empty());
    }

    #[test]
    fn test_compile_failure_is_sticky_until_success() {
        let sources = MemorySources::new();
        let engine = Preprocessor::new();
        let mut p = program(ProgramDesc::inline("void main(){}"));

        let failing = LoadContext {
            engine: &engine,
            sources: &sources,
            compiler: &RejectingCompiler,
        };
        assert!(matches!(
            p.load_high_level(&failing),
            Err(ProgramError::CompileFailed { .. })
        ));
        assert!(p.has_compile_error());
        assert!(!p.is_loaded());

        let working = LoadContext {
            compiler: &NullCompiler,
            ..failing
        };
        p.load_high_level(&working).unwrap();
        assert!(!p.has_compile_error());
        assert!(p.is_loaded());
    }

    #[test]
    fn test_unload_keeps_identity_and_config() {
        let sources = MemorySources::new();
        let engine = Preprocessor::new();
        let ctx = LoadContext {
            engine: &engine,
            sources: &sources,
            compiler: &NullCompiler,
        };
        let mut p = program(ProgramDesc::inline("void main(){}"));
        p.set_preprocessor_defines("A=1");
        p.set_column_major_matrices(false);
        p.load_high_level(&ctx).unwrap();
        p.push_attachment(Handle::new(9), "child");
        p.mark_linked();

        p.unload();
        assert_eq!(p.state(), ProgramState::Unloaded);
        assert!(p.native().is_none());
        assert!(p.attached().is_empty());
        assert_eq!(p.attached_names(), "");
        assert!(!p.is_linked());
        assert_eq!(p.name(), "main");
        assert_eq!(p.shader_id(), 1);
        assert_eq!(p.preprocessor_defines(), "A=1");
        assert!(!p.column_major_matrices());

        // Second unload is a no-op.
        p.unload();
        assert_eq!(p.state(), ProgramState::Unloaded);
    }

    #[test]
    fn test_missing_source_file() {
        let sources = MemorySources::new();
        let engine = Preprocessor::new();
        let ctx = LoadContext {
            engine: &engine,
            sources: &sources,
            compiler: &NullCompiler,
        };
        let mut p = program(ProgramDesc::file("missing.frag"));
        assert!(matches!(
            p.load_high_level(&ctx),
            Err(ProgramError::SourceNotFound { path }) if path == "missing.frag"
        ));
    }
}
