//! Registry Resolve CLI
//!
//! Resolves one api configuration and prints the declarations it produces,
//! in dependency order.

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use api_registry::resolve::EmitEvent;
use api_registry::{Generator, RecordingEmitter, Registry, RegistryConfig, SchemaTree};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "registry-resolve")]
#[command(about = "Resolve an api configuration and list its declarations in order")]
struct Cli {
    /// Registry JSON (defaults to [schema].path from the config)
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Config file layered over registry.toml and the environment
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    api: Option<String>,

    #[arg(long)]
    profile: Option<String>,

    /// Core versions to include
    #[arg(long)]
    versions: Option<String>,

    /// Included core versions to emit
    #[arg(long)]
    emit_versions: Option<String>,

    #[arg(long)]
    add_extensions: Option<String>,

    #[arg(long)]
    remove_extensions: Option<String>,

    /// Only list the selected features
    #[arg(long)]
    features_only: bool,

    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RegistryConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let generate = &mut config.generate;
    if let Some(api) = cli.api {
        generate.api = api;
    }
    if cli.profile.is_some() {
        generate.profile = cli.profile;
    }
    if let Some(versions) = cli.versions {
        generate.versions = versions;
    }
    if let Some(emit) = cli.emit_versions {
        generate.emit_versions = emit;
    }
    if cli.add_extensions.is_some() {
        generate.add_extensions = cli.add_extensions;
    }
    if cli.remove_extensions.is_some() {
        generate.remove_extensions = cli.remove_extensions;
    }

    let schema_path = cli
        .schema
        .or_else(|| config.schema_path())
        .ok_or_else(|| anyhow!("no schema given (use --schema or [schema].path)"))?;
    let tree = SchemaTree::from_path(&schema_path).with_context(|| format!("loading {:?}", schema_path))?;
    let registry = Registry::new(&tree);

    let options = config.generate.to_options()?;
    let generator = Generator::new(&registry, &options).with_order(config.generate.feature_order());

    if cli.features_only {
        let features = generator.features();
        match cli.format {
            Format::Json => {
                let names: Vec<_> = features
                    .iter()
                    .map(|f| serde_json::json!({"name": f.feature.name, "emit": f.emit}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            }
            Format::Text => {
                for f in &features {
                    println!("{} {}", if f.emit { "📦" } else { "  " }, f.feature.name);
                }
            }
        }
        return Ok(());
    }

    let mut emitter = RecordingEmitter::new();
    let resolution = generator.run(&mut emitter)?;

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(emitter.events())?),
        Format::Text => {
            println!("🔍 Resolved {} ({})", config.generate.api, &tree.bundle_hash[..12.min(tree.bundle_hash.len())]);
            for event in emitter.events() {
                match event {
                    EmitEvent::BeginFeature { name, emit } => {
                        println!("\n📦 {}{}", name, if *emit { "" } else { " (not emitted)" });
                    }
                    EmitEvent::Type { name, category } => match category {
                        Some(c) => println!("  type    {} ({:?})", name, c),
                        None => println!("  type    {}", name),
                    },
                    EmitEvent::Group { name, members } => {
                        println!("  group   {}", name);
                        for m in members {
                            match &m.value {
                                Some(v) => println!("    {} = {}", m.name, v),
                                None => println!("    {}", m.name),
                            }
                        }
                    }
                    EmitEvent::Enum { name, value } => match value {
                        Some(v) => println!("  enum    {} = {}", name, v),
                        None => println!("  enum    {}", name),
                    },
                    EmitEvent::Command { name } => println!("  command {}", name),
                    EmitEvent::BeginFile { .. } | EmitEvent::EndFeature | EmitEvent::EndFile => {}
                }
            }
            println!(
                "\n✅ {} features, {} declarations",
                resolution.features.len(),
                emitter.declared().len()
            );
        }
    }
    Ok(())
}
