use clap::{Args, Parser, Subcommand};
use ddos_blacklist_common::{exit_code, Result};
use ddos_blacklist_xdp::XdpMode;
use std::{path::PathBuf, process::ExitCode};

mod commands;
mod settings;
mod utils;

/// XDP example: DDoS protection via IPv4 blacklist
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML); flags take precedence over it
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach the filter to a device and show blacklist hits until interrupted
    Run(RunArgs),

    /// Add an address to the exported blacklist
    Add {
        /// IPv4 address in dotted-quad notation
        ip: String,

        #[clap(flatten)]
        pin: PinArgs,
    },

    /// Remove an address from the exported blacklist
    Remove {
        /// IPv4 address in dotted-quad notation
        ip: String,

        #[clap(flatten)]
        pin: PinArgs,
    },

    /// Print one snapshot of blacklist hits
    Stats {
        #[clap(flatten)]
        pin: PinArgs,
    },

    /// List every blacklisted address, including ones without hits
    List {
        #[clap(flatten)]
        pin: PinArgs,
    },
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Network device to attach to
    #[clap(short, long)]
    dev: Option<String>,

    /// Path to the compiled XDP object file [default: <program>_kern.o]
    #[clap(short, long)]
    object: Option<PathBuf>,

    /// Name of the XDP program inside the object
    #[clap(long)]
    program: Option<String>,

    /// Name of the blacklist map inside the object
    #[clap(long)]
    map: Option<String>,

    /// Where to export the blacklist map
    #[clap(long)]
    pin_path: Option<PathBuf>,

    /// Seconds between statistics updates
    #[clap(short, long)]
    interval: Option<u64>,

    /// Address to blacklist at startup (repeatable)
    #[clap(short, long = "seed")]
    seeds: Vec<String>,

    /// XDP attach mode
    #[clap(short, long, value_enum)]
    mode: Option<XdpMode>,

    /// Append statistics instead of redrawing the screen
    #[clap(long)]
    no_clear: bool,
}

#[derive(Args)]
pub struct PinArgs {
    /// Path the blacklist map was exported at
    #[clap(long)]
    pin_path: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    // Execute the specified command
    match dispatch(cli).await {
        Ok(()) => ExitCode::from(exit_code::OK),
        Err(e) => {
            eprintln!("ERR: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings = settings::Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => commands::run::run_daemon(settings.with_run_args(args)).await,
        Commands::Add { ip, pin } => commands::table::add(&ip, &settings.pin_path(pin)),
        Commands::Remove { ip, pin } => commands::table::remove(&ip, &settings.pin_path(pin)),
        Commands::Stats { pin } => commands::table::stats(&settings.pin_path(pin)),
        Commands::List { pin } => commands::table::list(&settings.pin_path(pin)),
    }
}
