//==================================================
// File: main.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Command line front end for solvra_rtti
// Objective: Inspect type manifests and run casts through the fatal path
//==================================================

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use solvra_rtti::cast::DowncastPolicy;
use solvra_rtti::runtime::{self, RuntimeContext};
use solvra_rtti::{RtConfig, TypeRegistry, logging};

#[derive(Parser, Debug)]
#[command(
    name = "solvra-rtti",
    version,
    about = "Inspect SolvraScript type manifests and exercise runtime cast checks"
)]
struct Cli {
    /// Configuration file (defaults to $SOLVRA_RTTI_CONFIG, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cast an object of SOURCE to TARGET; an illegal cast ends with the runtime fault report.
    ///
    /// The report is written to stderr. Set `faults.stream = "stdout"` in the
    /// configuration file to print it on standard output instead.
    Check {
        #[arg(long)]
        registry: PathBuf,
        /// Only accept casts the source's runtime type already satisfies.
        #[arg(long)]
        strict: bool,
        /// Source fingerprint, or `null` for a null reference.
        source: String,
        /// Target fingerprint.
        target: String,
    },
    /// Print the ancestor chain of a type.
    Lineage {
        #[arg(long)]
        registry: PathBuf,
        fingerprint: String,
    },
    /// Build the registry and report its shape.
    Validate {
        #[arg(long)]
        registry: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init("solvra-rtti", cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = RtConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Check {
            registry,
            strict,
            source,
            target,
        } => {
            if strict {
                config.casts.downcast = DowncastPolicy::Strict;
            }
            let registry = load_registry(&registry)?;
            let source_id = if source == "null" {
                None
            } else {
                let handle = registry
                    .by_fingerprint(&source)
                    .ok_or_else(|| anyhow!("unknown source type '{source}'"))?;
                Some(handle.id())
            };
            // A target missing from the manifest is the broken-executable case.
            let target_id = registry.by_fingerprint(&target).map(|handle| handle.id());
            let context = runtime::install(RuntimeContext::new(registry, config))?;
            context.ensure_cast(source_id, target_id, &target);
            println!("ok");
        }
        Command::Lineage {
            registry,
            fingerprint,
        } => {
            let registry = load_registry(&registry)?;
            let handle = registry
                .by_fingerprint(&fingerprint)
                .ok_or_else(|| anyhow!("unknown type '{fingerprint}'"))?;
            println!("{handle}");
            for ancestor in handle.ancestors() {
                println!("  <- {ancestor}");
            }
        }
        Command::Validate { registry } => {
            let registry = load_registry(&registry)?;
            println!(
                "registry ok: {} types, max depth {}, universal top '{}'",
                registry.len(),
                registry.max_depth(),
                registry.universal_top()
            );
        }
    }
    Ok(())
}

fn load_registry(path: &Path) -> Result<TypeRegistry> {
    TypeRegistry::load(path).with_context(|| format!("loading type registry {}", path.display()))
}
