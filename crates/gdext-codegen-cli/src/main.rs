//! `gdext-codegen` command-line driver.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gdext_codegen::api::BuildConfiguration;
use gdext_codegen::{Config, Pipeline};

/// Generate Go/cgo bindings from the extension ABI header and API descriptor.
#[derive(Parser, Debug)]
#[command(name = "gdext-codegen", version)]
struct Args {
    /// Project root; inputs and outputs are located relative to it.
    #[arg(default_value = ".")]
    project_root: PathBuf,

    /// Configuration file (defaults to gdext-codegen.toml in the project root).
    #[arg(short, long, env = "GDEXT_CODEGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Extension interface header.
    #[arg(long)]
    header: Option<PathBuf>,

    /// API descriptor JSON.
    #[arg(long)]
    api: Option<PathBuf>,

    /// Directory generated files are written under.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// One of float_32, float_64, double_32, double_64.
    #[arg(long, value_parser = parse_build_configuration)]
    build_configuration: Option<BuildConfiguration>,

    /// Compare against existing output without writing; exit 1 if anything would change.
    #[arg(long)]
    check: bool,

    /// Log at debug level.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_build_configuration(s: &str) -> Result<BuildConfiguration, String> {
    s.parse().map_err(|e: gdext_codegen::error::ConfigError| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(args: &Args) {
    let default = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(&args.project_root, args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(header) = &args.header {
        config.set_header(header);
    }
    if let Some(api) = &args.api {
        config.set_api(api);
    }
    if let Some(output_dir) = &args.output_dir {
        config.set_output_dir(output_dir);
    }
    if let Some(build) = args.build_configuration {
        config.set_build_configuration(build);
    }
    config
        .discover_inputs()
        .context("failed to locate generator inputs")?;

    let output_dir = config.output_dir.clone();
    let pipeline = Pipeline::new(config);

    if args.check {
        let report = pipeline.check().context("binding generation failed")?;
        if report.is_up_to_date() {
            tracing::info!(files = report.len(), "generated bindings are up to date");
            return Ok(ExitCode::SUCCESS);
        }
        for path in &report.written {
            println!("out of date: {}", path.display());
        }
        return Ok(ExitCode::from(1));
    }

    let report = pipeline
        .run()
        .with_context(|| format!("failed to generate bindings into {}", output_dir.display()))?;
    tracing::info!(
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        "done"
    );
    Ok(ExitCode::SUCCESS)
}
