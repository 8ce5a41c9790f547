//! Registry Check CLI
//!
//! Checks every command's return codes against the types it accepts.
//! Exits with status 1 when any error-severity finding remains.

use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use api_registry::{ConsistencyChecker, Registry, RegistryConfig, SchemaTree};

#[derive(Parser)]
#[command(name = "registry-check")]
#[command(about = "Check command return codes for consistency")]
struct Cli {
    /// Registry JSON (defaults to [schema].path from the config)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Config file layered over registry.toml and the environment
    #[arg(short, long)]
    config: Option<String>,

    /// Check a single command
    #[arg(long)]
    command: Option<String>,

    /// Print findings as JSON
    #[arg(long)]
    json: bool,

    /// Also report unknown `group` attributes on command parameters
    #[arg(long)]
    groups: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the registry passed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = RegistryConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let schema_path = cli
        .schema
        .or_else(|| config.schema_path())
        .ok_or_else(|| anyhow!("no schema given (use --schema or [schema].path)"))?;
    let tree = SchemaTree::from_path(&schema_path).with_context(|| format!("loading {:?}", schema_path))?;
    let registry = Registry::new(&tree);

    if cli.groups {
        for (group, count) in registry.validate_groups() {
            println!("⚠️  group {} is referenced {} time(s) but not defined", group, count);
        }
    }

    let mut checker = ConsistencyChecker::new(&registry, &config.check)?;
    let diags = match cli.command.as_deref() {
        Some(name) => {
            let cmd = registry
                .commands()
                .find(|c| c.name == name)
                .ok_or_else(|| anyhow!("unknown command {}", name))?;
            checker.check_command(cmd)
        }
        None => checker.check(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(diags.all())?);
    } else if diags.is_empty() {
        println!("✅ No return-code findings");
    } else {
        print!("{}", diags.format_all());
    }

    Ok(!diags.has_errors())
}
