mod config;
mod console;
mod registry;
mod server;
mod tick;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use aster::UdpTransport;

use config::ServerConfig;
use server::Server;

#[derive(Parser)]
#[command(name = "aster-server")]
#[command(about = "Aster dedicated multiplayer server")]
struct Args {
    /// Load configuration from a file
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Server port
    #[arg(long, value_name = "N")]
    port: Option<u16>,

    /// Server name
    #[arg(long, value_name = "STR")]
    name: Option<String>,

    /// Maximum players
    #[arg(long, value_name = "N")]
    max_players: Option<u32>,

    /// Disable the operator console
    #[arg(long)]
    no_console: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
        Err(e) => {
            // --help and --version print to stdout and exit cleanly.
            print!("{}", e);
            return ExitCode::SUCCESS;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path))?,
        None => ServerConfig::default(),
    };

    // Command line flags override the config file.
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(name) = args.name {
        config.server_name = name;
    }
    if let Some(max_players) = args.max_players {
        config.max_players = max_players;
    }
    if args.no_console {
        config.enable_console = false;
    }

    let mut server = Server::new(config, Box::new(UdpTransport::new()))
        .context("invalid configuration")?;

    // Graceful shutdown on SIGINT/SIGTERM through the owned loop handle;
    // the in-flight tick completes before the loop exits.
    let stop = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        stop.stop();
    })
    .context("installing signal handler")?;

    if server.config().enable_console {
        console::spawn_stdin_reader(server.console_sender());
    }

    server.start().context("opening server transport")?;
    server.run().context("server loop failed")?;

    info!("server stopped");
    Ok(())
}
