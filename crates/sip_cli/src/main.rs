//! SIP CLI
//!
//! Command-line client for sync info providers.
//!
//! # Commands
//!
//! - `list` - List registered providers
//! - `info` - Describe a provider by name or by data/stage type
//! - `status` - Show the start and current position of a shard
//! - `fetch` - Fetch entries from a shard, optionally paging to the end
//! - `trim` - Trim a shard up to a marker

mod commands;
mod fixture;

use clap::{Parser, Subcommand};
use fixture::Fixture;
use sip_server::{ServerConfig, ShardRequest, UserCaps};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sync info provider command-line tools.
#[derive(Parser)]
#[command(name = "sipctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON fixture seeding the keyspace and change log
    #[arg(global = true, short, long)]
    fixture: Option<PathBuf>,

    /// Capabilities of the caller, e.g. "sip=read,write"
    #[arg(global = true, long, default_value = "sip=*")]
    caps: String,

    /// Largest number of entries a single fetch may return
    #[arg(global = true, long, default_value_t = ServerConfig::FETCH_LIMIT)]
    max_fetch: u32,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Shard addressing shared by the per-shard commands.
#[derive(clap::Args)]
struct ShardArgs {
    /// Provider name
    provider: String,

    /// Shard id
    shard: u32,

    /// Stage id (defaults to the first stage)
    #[arg(long)]
    stage: Option<String>,
}

impl From<ShardArgs> for ShardRequest {
    fn from(args: ShardArgs) -> Self {
        ShardRequest {
            provider: args.provider,
            stage: args.stage,
            shard: args.shard,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List registered providers
    List,

    /// Describe a provider
    Info {
        /// Provider name
        provider: Option<String>,

        /// Look up by data type instead of name
        #[arg(short, long)]
        data_type: Option<String>,

        /// Stage type to match with --data-type (full, inc)
        #[arg(short, long)]
        stage_type: Option<String>,
    },

    /// Show start and current position of a shard
    Status {
        #[command(flatten)]
        shard: ShardArgs,
    },

    /// Fetch entries from a shard
    Fetch {
        #[command(flatten)]
        shard: ShardArgs,

        /// Resume after this marker
        #[arg(short, long, default_value = "")]
        marker: String,

        /// Entries per fetch
        #[arg(short = 'n', long)]
        max: Option<u32>,

        /// Keep fetching until the shard is done or caught up
        #[arg(short, long)]
        all: bool,
    },

    /// Trim a shard up to a marker
    Trim {
        #[command(flatten)]
        shard: ShardArgs,

        /// Last marker that may be discarded
        marker: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let caps = UserCaps::parse(&cli.caps)?;
    let fixture = match &cli.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::parse("{}")?,
    };
    let config = ServerConfig::new()
        .with_max_fetch(cli.max_fetch)
        .with_default_fetch(cli.max_fetch);
    let server = fixture.server(config)?;

    match cli.command {
        Commands::List => commands::query::list(&server, &caps)?,
        Commands::Info {
            provider,
            data_type,
            stage_type,
        } => commands::query::info(&server, &caps, provider, data_type, stage_type.as_deref())?,
        Commands::Status { shard } => commands::query::status(&server, &caps, shard.into())?,
        Commands::Fetch {
            shard,
            marker,
            max,
            all,
        } => commands::fetch::run(&server, &caps, shard.into(), &marker, max, all)?,
        Commands::Trim { shard, marker } => {
            commands::trim::run(&server, &caps, shard.into(), marker)?
        }
    }

    Ok(())
}
