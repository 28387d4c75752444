use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use mortality_compiler::config::Config;
use mortality_compiler::constants::get_supported_sources;
use mortality_compiler::logging;
use mortality_compiler::pipeline;
use mortality_compiler::types::SourceId;

#[derive(Parser)]
#[command(name = "mortality_compiler")]
#[command(about = "Compiles US weekly all-cause mortality from public data sources")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file. Without this flag, config.toml is used
    /// when present and built-in defaults otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the output tables are written to (overrides the config)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Specific sources to run (comma-separated). Available: world_mortality,
    /// cdc_provisional, archived_nchs, local_2019
    #[arg(long)]
    sources: Option<String>,
}

fn parse_sources(list: &str) -> Vec<SourceId> {
    let mut sources = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match SourceId::parse(name) {
            Some(id) => {
                if !sources.contains(&id) {
                    sources.push(id);
                }
            }
            None => {
                println!(
                    "⚠️  Unknown source: {} (expected one of: {})",
                    name,
                    get_supported_sources().join(", ")
                );
            }
        }
    }
    sources
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.directory = dir;
    }

    let requested = match &cli.sources {
        Some(list) => parse_sources(list),
        None => config.enabled_sources(),
    };
    if requested.is_empty() {
        println!("⚠️  No sources selected, nothing to do");
        return Ok(());
    }

    match pipeline::run(&config, &requested).await {
        Ok(summary) => {
            let usable = summary.usable_sources();
            if usable < requested.len() {
                println!(
                    "\n⚠️  Completed with {} of {} sources",
                    usable,
                    requested.len()
                );
            } else {
                println!("\n✅ Compilation completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            error!("Compilation failed: {}", e);
            println!("❌ Compilation failed: {}", e);
            Err(e.into())
        }
    }
}
