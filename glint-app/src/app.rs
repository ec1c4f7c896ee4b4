//! Manifest registration and the load / link run.

use glint_gpu::{
    ConfigError, GroupQuery, NullCompiler, ProgramError, ProgramManifest, ProgramParameter,
    ShaderManager,
};
use glint_preprocess::FileSystemSources;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error("Program '{0}' is not defined in the manifest")]
    UnknownProgram(String),
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

pub struct RunOptions {
    pub manifest: PathBuf,
    pub program: String,
    pub defines: Option<String>,
    pub attach: Option<String>,
    pub preprocess_only: bool,
    pub output: Option<PathBuf>,
    pub logging: LoggingConfig,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct RunOutput {
    pub shader_id: u64,
    pub attached_names: String,
    pub source: String,
}

pub fn run(options: RunOptions) -> Result<(), AppError> {
    init_logging(&options.logging);

    let output = execute(&options)?;
    info!(
        shader_id = output.shader_id,
        attached = %output.attached_names.trim_end(),
        "Program '{}' ready",
        options.program
    );
    write_output(&output.source, options.output.as_deref())?;
    Ok(())
}

/// Register the manifest, then load (and unless preprocess-only, link) the program.
pub fn execute(options: &RunOptions) -> Result<RunOutput, AppError> {
    let mut manifest = ProgramManifest::load(&options.manifest)?;
    let definition = manifest
        .program_mut(&options.program)
        .ok_or_else(|| AppError::UnknownProgram(options.program.clone()))?;
    // Set before registration so a load forced by another program's attachment
    // already sees these defines.
    if let Some(defines) = &options.defines {
        definition.config.preprocessor_defines = defines.clone();
    }
    let group = definition.group.clone();

    let sources = FileSystemSources::with_search_paths(&manifest.search_paths);
    let mut shaders = if options.preprocess_only {
        ShaderManager::new(NullCompiler)
    } else {
        ShaderManager::new(driver_compiler())
    }
    .with_sources(sources);

    shaders.register_manifest(&manifest)?;
    let handle = shaders
        .find_by_name(&options.program, GroupQuery::Named(&group))
        .ok_or_else(|| AppError::UnknownProgram(options.program.clone()))?;

    if let Some(names) = &options.attach {
        shaders.set_parameter(handle, ProgramParameter::Attach, names)?;
    }

    shaders.load(handle)?;
    if options.preprocess_only {
        debug!("Preprocess only, skipping link");
    } else {
        shaders.link(handle)?;
    }

    let program = shaders
        .program(handle)
        .ok_or_else(|| AppError::UnknownProgram(options.program.clone()))?;
    Ok(RunOutput {
        shader_id: program.shader_id(),
        attached_names: program.attached_names().to_string(),
        source: program.source().to_string(),
    })
}

fn write_output(source: &str, path: Option<&Path>) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, source),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(source.as_bytes())?;
            stdout.flush()
        }
    }
}

#[cfg(feature = "naga")]
fn driver_compiler() -> glint_gpu::NagaCompiler {
    glint_gpu::NagaCompiler::new()
}

#[cfg(not(feature = "naga"))]
fn driver_compiler() -> NullCompiler {
    warn!("Built without a driver compiler, sources are only preprocessed");
    NullCompiler
}

fn init_logging(config: &LoggingConfig) {
    #[cfg(feature = "tracy")]
    {
        if config.enable_tracy {
            use tracing_subscriber::Layer;
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(tracing_tracy::TracyLayer::default())
                .with(
                    tracing_subscriber::fmt::layer().with_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| config.level.clone().into()),
                    ),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if config.enable_tracy && cfg!(not(feature = "tracy")) {
        warn!("--tracy ignored: built without the `tracy` feature");
    }
}
