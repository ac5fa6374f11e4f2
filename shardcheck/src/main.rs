//! Entrypoint for the `shardcheck` CLI: health checks on the config
//! catalogs of a sharded cluster.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use clap::Parser;
use dotenvy::dotenv;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

mod commands {
    pub mod check;
}

#[derive(Debug, Parser)]
#[clap(
    name = "shardcheck",
    version,
    about = "Audits the shard-metadata of a sharded document database",
    long_about = "Audits the shard-metadata of a sharded document database.\n\n\
    Verifies that each config catalog covers every sharded namespace with a \
    gap-free, overlap-free chunk range from MinKey to MaxKey, and, given \
    several catalogs, rolls each one backwards through its change journal \
    to find the last moment they agreed.\n\n\
    If there is a file named '.env' in the current working directory, it is \
    sourced before loading the configuration.\n\n\
    Configuration is loaded from the following sources (highest precedence first):\n\
        - command line arguments\n\
        - user set environment variables\n\
        - .env file contents\n\
        - pre-configured default values"
)]
struct Config {
    /// Logs: filter directive
    ///
    /// The filter is passed to the tracing subscriber, e.g. "warn",
    /// "info,reconstruct=debug".
    #[clap(
        long = "--log-filter",
        env = "SHARDCHECK_LOG_FILTER",
        default_value = "warn",
        global = true,
        action
    )]
    log_filter: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Performs a health check on config catalogs and compares them for
    /// inconsistencies
    Check(commands::check::Config),
}

fn main() {
    // load environment variables from an optional .env next to the tool
    if let Err(e) = dotenv() {
        if !e.not_found() {
            eprintln!("FATAL Error loading config from: {e}");
            std::process::exit(ReturnCode::Failure as _);
        }
    }

    let config = Config::parse();
    init_logging(&config.log_filter);

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("FATAL Error creating tokio runtime: {e}");
            std::process::exit(ReturnCode::Failure as _);
        }
    };

    runtime.block_on(async move {
        match config.command {
            Command::Check(config) => {
                if let Err(e) = commands::check::command(config).await {
                    eprintln!("{e}");
                    std::process::exit(ReturnCode::Failure as _);
                }
            }
        }
    });
}

/// Process exit codes. URI parse failures and unreachable catalogs exit
/// non-zero; metadata findings are report content, not failures.
enum ReturnCode {
    Failure = 1,
}

fn init_logging(filter: &str) {
    // the subscriber is not installed yet, so complain on stderr directly
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("invalid log filter ({e}), falling back to `warn`");
        EnvFilter::new("warn")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
