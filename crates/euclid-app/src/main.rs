//! Euclid 命令行工具
//!
//! 回放命题、与参考构造比对、并行预计算预览快照。

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use euclid_core::conformance::{compare, describe_fact};
use euclid_core::prelude::*;
use euclid_core::reference;
use euclid_file::{
    load_catalog, load_proposition, load_registry, save_catalog, save_snapshot, Snapshot,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "euclid")]
#[command(about = "Replay Euclid's straightedge-and-compass constructions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra propositions (JSON array), registered after the built-ins
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    /// Treat segments as infinite lines when intersecting
    #[arg(long, global = true)]
    extended: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a proposition by number or from a JSON script
    Replay {
        /// Proposition number, or path to a proposition JSON file
        target: String,

        /// Print the final state and facts as JSON
        #[arg(long)]
        json: bool,

        /// Print what each step created
        #[arg(long)]
        trace: bool,
    },

    /// Compare built-in propositions against their reference constructions
    Verify,

    /// Replay every proposition in parallel and write snapshots
    Precompute {
        /// Output directory for .eucl snapshots
        #[arg(short, long, default_value = "previews")]
        output: PathBuf,
    },

    /// List known propositions
    List,

    /// Write the built-in propositions as a JSON catalog
    Export {
        /// Output file
        output: PathBuf,
    },
}

/// 内置命题与目录命题（目录中同编号的命题覆盖内置命题）
struct Library {
    propositions: Vec<Proposition>,
    registry: MacroRegistry,
}

impl Library {
    fn load(catalog: Option<&Path>) -> Result<Self> {
        let extra = match catalog {
            Some(path) => load_catalog(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
            None => Vec::new(),
        };
        let registry = load_registry(&extra)?;

        let mut propositions: Vec<Proposition> = propositions::builtin()
            .into_iter()
            .filter(|p| !extra.iter().any(|e| e.number == p.number))
            .collect();
        propositions.extend(extra);
        propositions.sort_by_key(|p| p.number);

        Ok(Self {
            propositions,
            registry,
        })
    }

    fn find(&self, number: u32) -> Option<&Proposition> {
        self.propositions.iter().find(|p| p.number == number)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let library = Library::load(cli.catalog.as_deref())?;
    let options = ReplayOptions {
        extended: cli.extended,
        record_snapshots: false,
    };

    match cli.command {
        Commands::Replay {
            target,
            json,
            trace,
        } => replay(&library, options, &target, json, trace),
        Commands::Verify => verify(&library, options),
        Commands::Precompute { output } => precompute(&library, options, &output),
        Commands::List => {
            for p in &library.propositions {
                println!(
                    "I.{:<3} {} given point(s), {} step(s), outputs [{}]  {}",
                    p.number,
                    p.arity(),
                    p.steps.len(),
                    p.outputs.join(", "),
                    p.title
                );
            }
            Ok(())
        }
        Commands::Export { output } => {
            save_catalog(&propositions::builtin(), &output)?;
            println!("Wrote {}", output.display());
            Ok(())
        }
    }
}

fn replay(
    library: &Library,
    options: ReplayOptions,
    target: &str,
    json: bool,
    trace: bool,
) -> Result<()> {
    let proposition = match target.parse::<u32>() {
        Ok(number) => library
            .find(number)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown proposition I.{}", number))?,
        Err(_) => load_proposition(Path::new(target))?,
    };

    let interpreter = Interpreter::new(&library.registry).with_options(options);
    let result = match interpreter.replay(&proposition) {
        Ok(result) => result,
        Err(failure) => {
            eprintln!(
                "State before failure: {} entities, {} facts",
                failure.state.len(),
                failure.facts.len()
            );
            return Err(failure.into());
        }
    };

    if json {
        let snapshot = Snapshot::from_replay(proposition.number, &result);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("I.{} {}", proposition.number, proposition.title);
    if trace {
        for record in &result.trace {
            let created: Vec<&str> = record
                .created
                .iter()
                .filter_map(|id| result.state.label_of(*id))
                .collect();
            println!("  step {:<2} {:<13} {}", record.index, record.kind, created.join(", "));
        }
    }

    println!("Points:");
    for point in result.state.points() {
        println!(
            "  {:<6} ({:>12.6}, {:>12.6})  {:?}",
            point.label, point.position.x, point.position.y, point.origin
        );
    }
    println!(
        "{} segment(s), {} circle(s), {} line(s)",
        result.state.segment_count(),
        result.state.circle_count(),
        result.state.line_count()
    );
    println!("Facts:");
    for fact in result.facts.iter() {
        println!("  {}", describe_fact(&result.state, fact));
    }
    Ok(())
}

fn verify(library: &Library, options: ReplayOptions) -> Result<()> {
    let interpreter = Interpreter::new(&library.registry).with_options(options);
    let mut failed = 0;

    for number in reference::NUMBERS {
        let Some(proposition) = library.find(number) else {
            continue;
        };
        let Some(expected) = reference::for_proposition(proposition) else {
            warn!("I.{} has no reference for its given elements", number);
            continue;
        };
        let expected = expected?;

        let report = match interpreter.replay(proposition) {
            Ok(result) => compare(&result.state, &result.facts, &expected.state, &expected.facts),
            Err(failure) => {
                println!("I.{}: {}", number, failure);
                failed += 1;
                continue;
            }
        };

        println!("I.{}: {}", number, report);
        if !report.is_ok() {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} proposition(s) do not conform", failed);
    }
    Ok(())
}

fn precompute(library: &Library, options: ReplayOptions, output: &Path) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let interpreter = Interpreter::new(&library.registry).with_options(options);
    let results: Vec<(u32, Result<PathBuf>)> = library
        .propositions
        .par_iter()
        .map(|proposition| {
            let path = output.join(format!("I.{}.eucl", proposition.number));
            let written = interpreter
                .replay(proposition)
                .map_err(anyhow::Error::from)
                .and_then(|result| {
                    let snapshot = Snapshot::from_replay(proposition.number, &result);
                    save_snapshot(&snapshot, &path)?;
                    Ok(path)
                });
            (proposition.number, written)
        })
        .collect();

    let mut failed = 0;
    for (number, written) in results {
        match written {
            Ok(path) => println!("I.{} -> {}", number, path.display()),
            Err(e) => {
                println!("I.{} failed: {:#}", number, e);
                failed += 1;
            }
        }
    }
    info!("Precomputed {} snapshot(s)", library.propositions.len() - failed);

    if failed > 0 {
        bail!("{} proposition(s) failed to replay", failed);
    }
    Ok(())
}
