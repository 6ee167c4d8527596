use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use qv_cli::run_batch;
use qv_common::{logging::init_logging, MotionId};
use qv_config::BatchConfig;
use qv_deployer::{derive_motion, AddressDeriver};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; otherwise QV_* environment variables are used
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a batch of proposals and write the address lists and document
    Generate {
        /// Number of motions to derive
        #[arg(long)]
        count: Option<usize>,
        /// Directory to write into
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Prior proposal document to carry metadata over from
        #[arg(long)]
        old_data: Option<PathBuf>,
    },
    /// Print the addresses of one motion
    Derive {
        /// Motion identifier
        #[arg(long)]
        motion_id: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<BatchConfig> {
    let config = match path {
        Some(path) => BatchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BatchConfig::from_env().context("reading QV_* environment")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    init_logging(&config.log_level)?;

    match cli.command {
        Commands::Generate {
            count,
            out_dir,
            old_data,
        } => {
            if let Some(count) = count {
                config.how_many = count;
            }
            if let Some(out_dir) = out_dir {
                config.out_dir = out_dir;
            }

            let document = tokio::task::spawn_blocking(move || {
                run_batch(&AddressDeriver::new(), &config, old_data.as_deref())
            })
            .await??;

            info!("Generated {} proposals", document.proposals.len());
        }
        Commands::Derive { motion_id } => {
            let motion = MotionId::new(motion_id)?;
            let addresses = derive_motion(&AddressDeriver::new(), motion, &config.tokens)?.addresses();
            println!("{}", serde_json::to_string_pretty(&addresses)?);
        }
    }

    Ok(())
}
