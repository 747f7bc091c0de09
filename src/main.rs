use anyhow::Context;
use clap::{Parser, Subcommand};
use mango_build_native::collector::{collect_classes, collect_props_from_source};
use mango_build_native::logging::init_logging;
use mango_build_native::{build, BuildConfig, ExportBatch, UnitKind};
use std::path::PathBuf;
use std::process;

/// Mango build layer: naming coordinator, export resolver and unit pipeline
#[derive(Parser, Debug)]
#[command(name = "mango-build", version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (defaults to ./mango.toml when present)
    #[arg(short, long, env = "MANGO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "MANGO_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transform every unit under the source directory
    Build {
        #[arg(long)]
        src_dir: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
        /// Skip class and prop minification
        #[arg(long)]
        no_optimize: bool,
    },
    /// Resolve one export batch (JSON) and print the declarations
    Resolve { batch: PathBuf },
    /// Print the symbols collected from one unit
    Collect { file: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level, cli.log_json) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{e:#}"), "Build failed");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = BuildConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            src_dir,
            out_dir,
            workers,
            no_optimize,
        } => {
            if let Some(src_dir) = src_dir {
                config.build.src_dir = src_dir;
            }
            if let Some(out_dir) = out_dir {
                config.build.out_dir = out_dir;
            }
            if let Some(workers) = workers {
                config.build.workers = workers;
            }
            if no_optimize {
                config.build.optimize = false;
            }
            config.validate()?;

            let summary = build(&config).await?;
            println!(
                "built {} units ({} transformed, {} classes, {} props, {} resolved exports)",
                summary.units,
                summary.transformed,
                summary.classes,
                summary.props,
                summary.resolved_exports
            );
        }
        Commands::Resolve { batch } => {
            let json = std::fs::read_to_string(&batch)
                .with_context(|| format!("reading {}", batch.display()))?;
            let batch: ExportBatch = serde_json::from_str(&json).context("parsing export batch")?;
            let resolved = config.resolver.to_resolver().resolve_batch(batch).await?;
            for (name, source) in resolved.declarations() {
                println!("var {} = {};", name, source);
            }
        }
        Commands::Collect { file } => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let symbols = match UnitKind::from_path(&file) {
                Some(UnitKind::Style) => collect_classes(&source),
                Some(UnitKind::Script) => collect_props_from_source(&source, &file)?,
                None => anyhow::bail!("{} is neither a script nor a style sheet", file.display()),
            };
            println!("{}", serde_json::to_string_pretty(&symbols)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_build() {
        let cli = Cli::parse_from(["mango-build", "build", "--workers", "3", "--no-optimize"]);
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Build {
                workers, no_optimize, ..
            } => {
                assert_eq!(workers, Some(3));
                assert!(no_optimize);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_resolve_with_config() {
        let cli = Cli::parse_from(["mango-build", "--config", "m.toml", "resolve", "batch.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("m.toml")));
        assert!(matches!(cli.command, Commands::Resolve { .. }));
    }
}
