//! cmdstack CLI: inspect command set catalogs and try input against them.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use cmdstack::catalog::Catalog;
use cmdstack::resolve::{self, Resolution, Resolver};

#[derive(Parser)]
#[command(name = "cmdstack", version, about = "Layered command set composition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a catalog and list its sets and layers.
    Check {
        /// Path to the catalog TOML file.
        catalog: PathBuf,
    },

    /// Print the merged, access-filtered command table of the catalog's actor.
    Merged {
        /// Path to the catalog TOML file.
        catalog: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Group visible commands by help category instead.
        #[arg(long, conflicts_with = "json")]
        by_category: bool,
    },

    /// Resolve a line of input against the merged set.
    Resolve {
        /// Path to the catalog TOML file.
        catalog: PathBuf,

        /// The typed input.
        #[arg(required = true, trailing_var_arg = true)]
        input: Vec<String>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { catalog } => {
            let catalog = Catalog::load(&catalog)?;

            println!("Sets:");
            for set in catalog.sets() {
                println!(
                    "  {:<16} {:<10} priority={:<4} policy={} commands={}",
                    set.key(),
                    set.merge_type().to_string(),
                    set.priority(),
                    set.duplicate_policy(),
                    set.len()
                );
            }

            if catalog.layers().is_empty() {
                println!("No layers.");
            } else {
                println!("Layers:");
                for layer in catalog.layers() {
                    println!(
                        "  {:<16} -> {:<16} kind={} stack_priority={}",
                        layer.source, layer.set, layer.kind, layer.stack_priority
                    );
                }
            }

            let mut handler = catalog.handler();
            let merged = handler.get_merged();
            println!(
                "Merged: {} commands for {}",
                merged.len(),
                handler.actor()
            );
            for conflict in handler.conflicts() {
                let err: cmdstack::error::MergeError = conflict.clone().into();
                println!("  conflict: {err}");
            }
        }

        Commands::Merged {
            catalog,
            json,
            by_category,
        } => {
            let catalog = Catalog::load(&catalog)?;
            let grants = catalog.grants();
            let mut handler = catalog.handler();
            let actor = handler.actor();
            let merged = handler.get_merged();

            if by_category {
                for (category, keys) in resolve::help_index(&merged, actor, &grants) {
                    println!("{category}: {}", keys.join(", "));
                }
                return Ok(());
            }

            let visible = resolve::visible(&merged, actor, &grants);
            if json {
                let rows: Vec<serde_json::Value> = visible
                    .iter()
                    .map(|entry| {
                        let command = entry.command();
                        serde_json::json!({
                            "key": command.key(),
                            "aliases": command.aliases().collect::<Vec<_>>(),
                            "priority_in_set": command.priority_in_set(),
                            "help_category": command.help_category(),
                            "origin": entry.origin().set_key,
                            "origin_priority": entry.origin().priority,
                        })
                    })
                    .collect();
                let output = serde_json::json!({
                    "actor": actor.get(),
                    "set": merged.key(),
                    "priority": merged.priority(),
                    "no_exits": merged.no_exits(),
                    "no_objs": merged.no_objs(),
                    "no_channels": merged.no_channels(),
                    "commands": rows,
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            } else {
                println!(
                    "Merged set \"{}\" (priority {}) for {}:",
                    merged.key(),
                    merged.priority(),
                    actor
                );
                for entry in &visible {
                    let command = entry.command();
                    let aliases: Vec<&str> = command.aliases().collect();
                    println!(
                        "  {:<16} [{}] from {}",
                        command.key(),
                        aliases.join(", "),
                        entry.origin().set_key
                    );
                }
            }
        }

        Commands::Resolve { catalog, input } => {
            let catalog = Catalog::load(&catalog)?;
            let grants = catalog.grants();
            let resolver = Resolver::new(catalog.resolver().clone());
            let mut handler = catalog.handler();
            let line = input.join(" ");

            match handler.resolve(&resolver, &line, &grants) {
                Resolution::Matched(m) => {
                    println!("matched: {} ({:?} via \"{}\")", m.command.key(), m.kind, m.matched);
                    if !m.args.is_empty() {
                        println!("args: {}", m.args);
                    }
                }
                Resolution::Ambiguous(candidates) => {
                    println!("ambiguous: {}", candidates.join(", "));
                }
                Resolution::NoMatch => {
                    let merged = handler.get_merged();
                    let suggestions = resolver.suggest(&line, &merged, handler.actor(), &grants);
                    if suggestions.is_empty() {
                        println!("no match");
                    } else {
                        println!("no match; did you mean: {}?", suggestions.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}
