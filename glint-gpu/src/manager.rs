use glint_preprocess::{FileSystemSources, Preprocessor, PreprocessorEngine, SourceProvider};
use tracing::{debug, info, warn};

use crate::compiler::{NullCompiler, ShaderCompiler};
use crate::config::{ProgramConfig, ProgramManifest, ProgramParameter, format_bool, parse_bool};
use crate::error::ProgramError;
use crate::handle::Handle;
use crate::program::{LoadContext, ProgramDesc, ShaderProgram};
use crate::registry::{GroupQuery, ProgramRegistry};

/// Shader manager for creating, loading, attaching and linking shader programs
pub struct ShaderManager {
    registry: ProgramRegistry,
    engine: Box<dyn PreprocessorEngine>,
    sources: Box<dyn SourceProvider>,
    compiler: Box<dyn ShaderCompiler>,
}

fn unknown(handle: Handle<ShaderProgram>) -> ProgramError {
    ProgramError::UnknownProgram(handle.to_string())
}

impl ShaderManager {
    /// Manager using the built-in [`Preprocessor`] and on-disk sources.
    pub fn new(compiler: impl ShaderCompiler + 'static) -> Self {
        Self {
            registry: ProgramRegistry::new(),
            engine: Box::new(Preprocessor::new()),
            sources: Box::new(FileSystemSources::new()),
            compiler: Box::new(compiler),
        }
    }

    pub fn with_sources(mut self, sources: impl SourceProvider + 'static) -> Self {
        self.sources = Box::new(sources);
        self
    }

    pub fn with_engine(mut self, engine: impl PreprocessorEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn registry(&self) -> &ProgramRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProgramRegistry {
        &mut self.registry
    }

    pub fn create_program(
        &mut self,
        name: &str,
        group: &str,
        desc: ProgramDesc,
    ) -> Result<Handle<ShaderProgram>, ProgramError> {
        let handle = self.registry.create(name, group, desc)?;
        info!("Created shader program '{}' (id {})", name, handle.id);
        Ok(handle)
    }

    pub fn program(&self, handle: Handle<ShaderProgram>) -> Option<&ShaderProgram> {
        self.registry.get(handle)
    }

    pub fn program_mut(&mut self, handle: Handle<ShaderProgram>) -> Option<&mut ShaderProgram> {
        self.registry.get_mut(handle)
    }

    pub fn find_by_name(&self, name: &str, query: GroupQuery<'_>) -> Option<Handle<ShaderProgram>> {
        self.registry.find_by_name(name, query)
    }

    pub fn remove(&mut self, handle: Handle<ShaderProgram>) -> Option<ShaderProgram> {
        self.registry.remove(handle)
    }

    /// Preprocess and compile a program. Does nothing if it is already loaded.
    #[tracing::instrument(level = "info", skip_all, fields(program = %handle))]
    pub fn load(&mut self, handle: Handle<ShaderProgram>) -> Result<(), ProgramError> {
        let ctx = LoadContext {
            engine: self.engine.as_ref(),
            sources: self.sources.as_ref(),
            compiler: self.compiler.as_ref(),
        };
        let program = self.registry.get_mut(handle).ok_or_else(|| unknown(handle))?;
        program.load_high_level(&ctx)
    }

    /// True when the program exists, has no outstanding compile error and its
    /// dialect is supported by the compiler.
    pub fn is_supported(&self, handle: Handle<ShaderProgram>) -> bool {
        self.registry.get(handle).is_some_and(|program| {
            !program.has_compile_error() && self.compiler.supports(program.language())
        })
    }

    /// Attach the program called `name` to `parent`.
    ///
    /// Returns `Ok(false)` when the attachment is skipped: no such program, a
    /// different dialect, the parent itself, or a parent that is not supported.
    /// The child is loaded first if needed. A child that fails to load is still
    /// attached and `link` reports it later.
    pub fn attach_child_shader(
        &mut self,
        parent: Handle<ShaderProgram>,
        name: &str,
    ) -> Result<bool, ProgramError> {
        let language = self
            .registry
            .get(parent)
            .ok_or_else(|| unknown(parent))?
            .language();

        let Some(child) = self.registry.find_by_name(name, GroupQuery::Autodetect) else {
            debug!("Skipping attachment of '{}': no such program", name);
            return Ok(false);
        };
        if child == parent {
            debug!("Skipping attachment of '{}': program cannot attach itself", name);
            return Ok(false);
        }
        let child_language = self
            .registry
            .get(child)
            .ok_or_else(|| unknown(child))?
            .language();
        if child_language != language {
            debug!(
                "Skipping attachment of '{}': {} child for {} program",
                name, child_language, language
            );
            return Ok(false);
        }
        if !self.is_supported(parent) {
            debug!("Skipping attachment of '{}': parent is not supported", name);
            return Ok(false);
        }

        let ctx = LoadContext {
            engine: self.engine.as_ref(),
            sources: self.sources.as_ref(),
            compiler: self.compiler.as_ref(),
        };
        let child_program = self.registry.get_mut(child).ok_or_else(|| unknown(child))?;
        if let Err(e) = child_program.load_high_level(&ctx) {
            warn!("Attached shader '{}' failed to load: {}", name, e);
        }

        let parent_program = self.registry.get_mut(parent).ok_or_else(|| unknown(parent))?;
        parent_program.push_attachment(child, name);
        debug!("Attached '{}' to '{}'", name, parent_program.name());
        Ok(true)
    }

    /// Attach every whitespace-separated name in `names`, left to right.
    /// Returns how many were attached.
    pub fn attach_children(
        &mut self,
        parent: Handle<ShaderProgram>,
        names: &str,
    ) -> Result<usize, ProgramError> {
        let mut attached = 0;
        for name in names.split_whitespace() {
            if self.attach_child_shader(parent, name)? {
                attached += 1;
            }
        }
        Ok(attached)
    }

    /// Link a loaded program with its attached children, in attachment order.
    pub fn link(&mut self, handle: Handle<ShaderProgram>) -> Result<(), ProgramError> {
        let program = self.registry.get(handle).ok_or_else(|| unknown(handle))?;
        if program.is_linked() {
            return Ok(());
        }
        let native = program.native().ok_or_else(|| ProgramError::NotLoaded {
            name: program.display_name(),
        })?;

        let mut children = Vec::with_capacity(program.attached().len());
        for attached in program.attached() {
            let child = self
                .registry
                .get(attached.handle)
                .and_then(ShaderProgram::native)
                .ok_or_else(|| ProgramError::MissingAttachment {
                    program: program.display_name(),
                    child: attached.name.clone(),
                })?;
            children.push(child);
        }

        self.compiler
            .link(program.name(), native, &children)
            .map_err(|source| ProgramError::CompileFailed {
                name: program.display_name(),
                source,
            })?;
        info!(
            "Linked {} with {} attached shader(s)",
            program.display_name(),
            children.len()
        );

        if let Some(program) = self.registry.get_mut(handle) {
            program.mark_linked();
        }
        Ok(())
    }

    /// Release the native shader and attachments. Unknown handles are ignored.
    pub fn unload(&mut self, handle: Handle<ShaderProgram>) {
        if let Some(program) = self.registry.get_mut(handle) {
            program.unload();
        }
    }

    pub fn get_parameter(
        &self,
        handle: Handle<ShaderProgram>,
        param: ProgramParameter,
    ) -> Result<String, ProgramError> {
        let program = self.registry.get(handle).ok_or_else(|| unknown(handle))?;
        let value = match param {
            ProgramParameter::Attach => program.attached_names().to_string(),
            ProgramParameter::PreprocessorDefines => program.preprocessor_defines().to_string(),
            ProgramParameter::ColumnMajorMatrices => {
                format_bool(program.column_major_matrices()).to_string()
            }
        };
        Ok(value)
    }

    pub fn set_parameter(
        &mut self,
        handle: Handle<ShaderProgram>,
        param: ProgramParameter,
        value: &str,
    ) -> Result<(), ProgramError> {
        match param {
            ProgramParameter::Attach => {
                if self.registry.get(handle).is_none() {
                    return Err(unknown(handle));
                }
                self.attach_children(handle, value)?;
            }
            ProgramParameter::PreprocessorDefines => {
                self.program_mut(handle)
                    .ok_or_else(|| unknown(handle))?
                    .set_preprocessor_defines(value);
            }
            ProgramParameter::ColumnMajorMatrices => {
                let column_major = parse_bool(value)?;
                self.program_mut(handle)
                    .ok_or_else(|| unknown(handle))?
                    .set_column_major_matrices(column_major);
            }
        }
        Ok(())
    }

    /// Set a parameter by its text name.
    pub fn set_parameter_str(
        &mut self,
        handle: Handle<ShaderProgram>,
        param: &str,
        value: &str,
    ) -> Result<(), ProgramError> {
        let param: ProgramParameter = param.parse()?;
        self.set_parameter(handle, param, value)
    }

    /// Apply a typed configuration. Attachment happens last, in list order.
    pub fn apply_config(
        &mut self,
        handle: Handle<ShaderProgram>,
        config: &ProgramConfig,
    ) -> Result<(), ProgramError> {
        let program = self.program_mut(handle).ok_or_else(|| unknown(handle))?;
        program.set_preprocessor_defines(config.preprocessor_defines.as_str());
        program.set_column_major_matrices(config.column_major_matrices);

        for name in &config.attach {
            self.attach_child_shader(handle, name)?;
        }
        Ok(())
    }

    /// Register every program in `manifest`.
    ///
    /// All programs are created first, then configured, then attached, so an
    /// attachment may name any program of the manifest and the child already
    /// carries its own defines when it is loaded.
    pub fn register_manifest(
        &mut self,
        manifest: &ProgramManifest,
    ) -> Result<Vec<Handle<ShaderProgram>>, ProgramError> {
        let mut handles = Vec::with_capacity(manifest.programs.len());
        for definition in &manifest.programs {
            let handle = self.create_program(&definition.name, &definition.group, definition.desc()?)?;
            handles.push(handle);
        }

        for (definition, &handle) in manifest.programs.iter().zip(&handles) {
            let program = self.program_mut(handle).ok_or_else(|| unknown(handle))?;
            program.set_preprocessor_defines(definition.config.preprocessor_defines.as_str());
            program.set_column_major_matrices(definition.config.column_major_matrices);

            for (key, value) in &definition.params {
                let param: ProgramParameter = key.parse()?;
                if param != ProgramParameter::Attach {
                    self.set_parameter(handle, param, value)?;
                }
            }
        }

        for (definition, &handle) in manifest.programs.iter().zip(&handles) {
            for name in &definition.config.attach {
                self.attach_child_shader(handle, name)?;
            }
            if let Some(names) = definition.params.get(ProgramParameter::Attach.as_str()) {
                self.attach_children(handle, names)?;
            }
        }

        info!("Registered {} program(s) from manifest", handles.len());
        Ok(handles)
    }
}

impl Default for ShaderManager {
    fn default() -> Self {
        Self::new(NullCompiler)
    }
}
