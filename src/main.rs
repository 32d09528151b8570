use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{prelude::*, EnvFilter};

use setupdeps::{
    config::env_keys, domain::Source, ExtractConfig, ExtractError, Extractor, HostModules,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One specifier per line.
    Lines,
    /// A JSON array of `{ "path", "install_requires" }` objects.
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "setupdeps")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Build descriptors to extract from
    #[arg(value_name = "SETUP_PY", required = true)]
    paths: Vec<PathBuf>,

    /// TOML file with extraction settings
    #[arg(long, value_name = "FILE", env = env_keys::SETUPDEPS_CONFIG)]
    config: Option<PathBuf>,

    /// Treat these root modules as importable instead of stubbing them
    #[arg(long, value_name = "MOD", value_delimiter = ',')]
    available: Vec<String>,

    /// Text that stubs and faked file reads produce
    #[arg(long, value_name = "TEXT")]
    sentinel: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Lines)]
    format: OutputFormat,

    /// Log extraction phases and script output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report {
    path: String,
    install_requires: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
}

fn load_config(cli: &Cli) -> Result<ExtractConfig> {
    let config = match &cli.config {
        Some(path) => ExtractConfig::load(path)?,
        None => ExtractConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("invalid SETUPDEPS_* environment override")?;
    if let Some(sentinel) = &cli.sentinel {
        config.sentinel = sentinel.clone();
    }
    config.available_modules.extend(cli.available.iter().cloned());
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;
    let prober = HostModules::new(config.available_modules.iter().cloned());
    let mut extractor = Extractor::new(&config, &prober);

    let mut reports = vec![];
    let mut all_ok = true;
    for path in &cli.paths {
        let result = Source::from_path(path)
            .map_err(|source| ExtractError::Io {
                path: path.display().to_string(),
                source,
            })
            .and_then(|source| extractor.extract(&source));
        match result {
            Ok(install_requires) => reports.push(Report {
                path: path.display().to_string(),
                install_requires,
            }),
            Err(e) => {
                eprintln!("{e}");
                all_ok = false;
            }
        }
    }

    match cli.format {
        OutputFormat::Lines => {
            for requirement in reports.iter().flat_map(|r| &r.install_requires) {
                println!("{requirement}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
