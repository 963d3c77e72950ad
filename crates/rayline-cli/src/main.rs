//! Rayline command-line interface.
//!
//! Trace beamlines described in TOML job files:
//! ```sh
//! rayline-cli run job.toml
//! rayline-cli validate job.toml
//! rayline-cli columns
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use rayline_core::Column;

#[derive(Parser)]
#[command(name = "rayline-cli")]
#[command(about = "Rayline: X-ray beamline ray tracing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace a beamline from a TOML job file.
    Run {
        /// Path to the job file.
        config: PathBuf,
        /// Output directory (overrides the job file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a job file and load every table it names, without tracing.
    Validate {
        /// Path to the job file.
        config: PathBuf,
    },
    /// List the beam column numbers.
    Columns,
}

fn job_dir(config: &Path) -> PathBuf {
    config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Rayline Beamline Tracer");
            println!("=======================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job, &job_dir(&config))?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_outputs(&result, &job, &out_dir)?;

            let image = &result.trace.image;
            println!(
                "Trace complete: {} of {} rays reach the image plane.",
                image.good_count(),
                image.len()
            );
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let base = job_dir(&config);
            let source = runner::build_source(&job.source, &base)?;
            let energy = runner::central_energy(&source)?;
            let beamline = runner::build_beamline(&job, &base, energy)?;
            println!(
                "Configuration is valid: {} ({} elements, {} rays)",
                config.display(),
                beamline.len(),
                source.len()
            );
            Ok(())
        }
        Commands::Columns => {
            println!("Beam columns:");
            println!();
            for column in Column::all() {
                let kind = if column.is_stored() { "stored" } else { "derived" };
                println!("  {:>2}  {:<22} {}", column.number(), column.label(), kind);
            }
            Ok(())
        }
    }
}
