//! # agent-link CLI
//!
//! - `agent-link link` - Link every agent and command into the destination
//! - `agent-link unlink` - Remove everything a previous link created
//! - `agent-link list` - Show the resolved registry
//! - `agent-link invoke <token> [args...]` - Render the document a reference resolves to

use std::path::PathBuf;
use std::process::ExitCode;

use agent_link::{
    CapabilityKind, EnvOverrides, InvocationRouter, LinkMode, Linker, RegistryLoader,
    ResolvedRegistry, RootSettings, Settings, SettingsLoader, TracingConfig, TracingLevel,
    init_tracing,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

/// agent-link - link a library of agents and commands into a Claude environment
#[derive(Parser)]
#[command(name = "agent-link")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Registry, linker and invocation router for agent and command libraries")]
struct Cli {
    /// Source repository holding agents/ and commands/ (repeatable; earlier wins ties)
    #[arg(long = "source", global = true)]
    sources: Vec<PathBuf>,

    /// Destination root (default: ~/.claude)
    #[arg(long, global = true)]
    dest: Option<PathBuf>,

    /// Settings file (default: ~/.claude/agent-link.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to stderr as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link every resolved document into the destination
    Link {
        /// Report what would change without touching the filesystem
        #[arg(long)]
        dry_run: bool,

        /// Copy files instead of creating symlinks
        #[arg(long)]
        copy: bool,

        /// Copy when a symlink cannot be created
        #[arg(long)]
        fallback_copy: bool,

        /// Keep entries whose document left the registry
        #[arg(long)]
        no_prune: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every entry a previous link created
    Unlink {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List resolved agents and commands
    List {
        /// Only list one kind (agent or command)
        #[arg(long)]
        kind: Option<CapabilityKind>,

        /// Print documents, warnings and overrides as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a reference like @agent-<name> or /<name> and print the rendered document
    Invoke {
        /// Reference token
        token: String,

        /// Argument text handed to the document
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Serialize)]
struct ListOutput<'a> {
    documents: Vec<&'a agent_link::CapabilityDocument>,
    warnings: &'a [agent_link::LoadWarning],
    overrides: &'a [agent_link::OverrideRecord],
}

async fn load_settings(cli: &Cli) -> Result<Settings> {
    let env = EnvOverrides::from_env()?;
    let mut loader = SettingsLoader::new();
    loader
        .load(cli.config.as_deref(), &env)
        .await
        .context("Failed to load settings")?;
    let mut settings = loader.into_settings();

    if let Some(dest) = &cli.dest {
        settings.destination = Some(dest.clone());
    }
    if !cli.sources.is_empty() {
        settings.roots = cli.sources.iter().map(RootSettings::repository).collect();
    }
    Ok(settings)
}

async fn load_registry(
    settings: &Settings,
) -> Result<(
    ResolvedRegistry,
    Vec<agent_link::LoadWarning>,
    Vec<agent_link::OverrideRecord>,
)> {
    let specs = settings.root_specs()?;
    let loaded = RegistryLoader::new().load_concurrent(&specs).await?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    let (registry, overrides) = loaded.resolve();
    Ok((registry, loaded.warnings, overrides))
}

fn linker(settings: &Settings) -> Linker {
    Linker::new().with_options(settings.sync_options())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(
        &TracingConfig::new()
            .level(TracingLevel::from_verbosity(cli.verbose))
            .json(cli.log_json),
    );

    let settings = load_settings(&cli).await?;

    match &cli.command {
        Commands::Link {
            dry_run,
            copy,
            fallback_copy,
            no_prune,
            json,
        } => {
            let destination = settings.destination()?;
            let (registry, _, _) = load_registry(&settings).await?;

            let mut options = settings.sync_options();
            if *copy {
                options.mode = LinkMode::Copy;
            }
            options.fallback_to_copy |= *fallback_copy;
            options.dry_run = *dry_run;
            options.prune = !*no_prune;

            let report = linker(&settings).with_options(options).sync(&registry, &destination);

            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                for entry in report.collisions() {
                    eprintln!("skipped (collision): {}", entry.target_path.display());
                }
                for error in report.failures() {
                    eprintln!("error: {}", error);
                }
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::Unlink { json } => {
            let destination = settings.destination()?;
            let report = linker(&settings).unlink(&destination);

            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                for error in report.failures() {
                    eprintln!("error: {}", error);
                }
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::List { kind, json } => {
            let (registry, warnings, overrides) = load_registry(&settings).await?;
            let documents: Vec<_> = match kind {
                Some(kind) => registry.documents(*kind).collect(),
                None => registry.iter().collect(),
            };

            if *json {
                let output = ListOutput {
                    documents,
                    warnings: &warnings,
                    overrides: &overrides,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for document in documents {
                    println!(
                        "{:<40} {:<45} {}",
                        document.reference_token(),
                        document.id,
                        document.source_path.display()
                    );
                }
                for record in &overrides {
                    println!(
                        "override: {} {} <- {} (shadows {})",
                        record.kind,
                        record.id,
                        record.winning_source_path.display(),
                        record.shadowed_source_paths.len()
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Invoke { token, args } => {
            let (registry, _, _) = load_registry(&settings).await?;
            match InvocationRouter::resolve(token, &args.join(" "), &registry) {
                Ok(result) => {
                    println!("{}", result.rendered_content);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) if e.is_lookup_error() => {
                    eprintln!("error: {}", e);
                    Ok(ExitCode::from(2))
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}
