use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vlr_runner::{Config, RecordEmitter, Runner, SnapshotStore};

/// Reconcile new verifier log uploads against cluster state and print one CSV
/// row per cluster.
#[derive(Parser, Debug)]
#[command(name = "vlr", version)]
struct Cli {
    /// Listing saved by the previous run (created as `{}` when absent)
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    previous: String,

    /// Where this run writes the fresh bucket listing
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    current: String,

    /// TOML config file (default: ./vlr.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the CSV header row before the first record
    #[arg(long)]
    header: bool,

    /// Override pending.dir
    #[arg(long)]
    pending_dir: Option<String>,

    /// Override pending.min_age_secs
    #[arg(long)]
    min_age_secs: Option<u64>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut cfg = Config::resolve(self.config.as_deref())?;
        if let Some(dir) = &self.pending_dir {
            cfg.pending.dir = dir.clone();
        }
        if let Some(secs) = self.min_age_secs {
            cfg.pending.min_age_secs = secs;
        }
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = cli.config()?;
    debug!(?cfg, "configuration resolved");

    let runner = Runner::open(cfg)?;
    let store = SnapshotStore::new(&cli.previous, &cli.current);
    let stdout = std::io::stdout().lock();
    let mut emitter = if cli.header { RecordEmitter::with_header(stdout) } else { RecordEmitter::new(stdout) };
    runner.run_once(&store, &mut emitter)?;
    Ok(())
}
