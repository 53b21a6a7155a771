use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use landsat_order::config::{Config, LoggingConfig, DEFAULT_HOST};
use landsat_order::credentials::Credentials;
use landsat_order::espa::Provider;
use landsat_order::logging;
use landsat_order::pipeline;
use landsat_order::poller::PollSchedule;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Order, download and unpack Landsat Level-2 products from USGS ESPA.
#[derive(Debug, Parser)]
#[command(name = "landsat-order", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build orders from a config file, submit them and download the results.
    Order {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Resume polling and downloading for the order ids in a jobs file.
    Resume {
        /// Folder to save the downloaded archives in
        target_folder: PathBuf,
        /// File containing ESPA order ids, one per line
        jobs_file: PathBuf,
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,
        #[arg(long, default_value_t = 300)]
        poll_interval_secs: u64,
        #[arg(long, default_value_t = 288)]
        max_polls: u32,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Unpack downloaded scene archives into tile/scene folders.
    Unpack {
        source_folder: PathBuf,
        target_folder: PathBuf,
    },
}

#[derive(Debug, Args)]
struct AuthArgs {
    /// ESPA username, prompted for when absent
    #[arg(long, env = "ESPA_USERNAME")]
    username: Option<String>,
    /// ESPA password, prompted for when absent
    #[arg(long, env = "ESPA_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl AuthArgs {
    fn credentials(self) -> Result<Credentials> {
        Credentials::resolve(self.username, self.password)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let started = Instant::now();

    match cli.command {
        Command::Order { config, auth } => {
            let config = Config::read(config)?;
            logging::init(&config.logging)?;
            info!("start ...");

            let catalog = pipeline::prepare_catalog(&config).await?;
            let provider = Provider::new(&config.api.host, auth.credentials()?)?;
            pipeline::order_run(&provider, &config, &catalog).await?;
        }
        Command::Resume {
            target_folder,
            jobs_file,
            host,
            poll_interval_secs,
            max_polls,
            auth,
        } => {
            logging::init(&LoggingConfig::default())?;
            let provider = Provider::new(&host, auth.credentials()?)?;
            let schedule = PollSchedule {
                interval: Duration::from_secs(poll_interval_secs),
                max_polls,
            };
            pipeline::resume_run(&provider, &target_folder, &jobs_file, &schedule).await?;
        }
        Command::Unpack {
            source_folder,
            target_folder,
        } => {
            logging::init(&LoggingConfig::default())?;
            pipeline::unpack_run(&source_folder, &target_folder)?;
        }
    }

    info!("Completed in {}", logging::format_elapsed(started.elapsed()));
    Ok(())
}
