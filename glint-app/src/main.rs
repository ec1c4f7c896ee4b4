//! Glint command-line tool
//!
//! Registers the programs of a JSON manifest, then preprocesses, compiles and
//! links one of them and prints its expanded source.

mod app;

use clap::Parser;
use std::path::PathBuf;

/// Glint - GLSL shader program loader
#[derive(Parser, Debug)]
#[command(name = "glint")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON program manifest
    manifest: PathBuf,

    /// Name of the program to load
    #[arg(short, long)]
    program: String,

    /// Replace the program's preprocessor defines (NAME=VALUE,NAME;...)
    #[arg(short, long)]
    defines: Option<String>,

    /// Extra child programs to attach, space separated
    #[arg(short, long)]
    attach: Option<String>,

    /// Only preprocess; skip driver compilation and linking
    #[arg(long)]
    preprocess_only: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Send spans to Tracy (needs the `tracy` feature)
    #[arg(long)]
    tracy: bool,

    /// Write the expanded source here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let options = app::RunOptions {
        manifest: args.manifest,
        program: args.program,
        defines: args.defines,
        attach: args.attach,
        preprocess_only: args.preprocess_only,
        output: args.output,
        logging: app::LoggingConfig {
            level: args.log_level,
            enable_tracy: args.tracy,
        },
    };

    if let Err(e) = app::run(options) {
        eprintln!("glint: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
