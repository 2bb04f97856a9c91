//! Headless probe client: connects to a running server, flies a lazy
//! circle for a while, and reports connection statistics. Useful for
//! smoke-testing a server without a renderer.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::info;

use aster::command::controls;
use aster::UdpTransport;
use aster_client::{ClientState, MultiplayerClient};

#[derive(Parser)]
#[command(name = "aster-probe")]
#[command(about = "Headless Aster client for server smoke tests")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = aster::DEFAULT_PORT)]
    port: u16,

    /// How long to stay connected, in seconds
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Fire the primary weapon while flying
    #[arg(long)]
    fire: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut client = MultiplayerClient::new(Box::new(UdpTransport::new()));
    client
        .connect(&args.host, args.port)
        .with_context(|| format!("connecting to {}:{}", args.host, args.port))?;

    let start = Instant::now();
    let frame = Duration::from_millis(1000 / 60);
    let deadline = Duration::from_secs(args.duration);
    let mut frame_count: u64 = 0;

    while start.elapsed() < deadline {
        client.update();

        if client.state() == ClientState::Disconnected && start.elapsed() > Duration::from_secs(2) {
            anyhow::bail!("lost connection to server");
        }

        if client.player_uuid().is_some() {
            // Thrust with a periodic turn so the probe orbits instead of
            // sailing off the map.
            let mut word = controls::THRUST;
            if frame_count % 3 == 0 {
                word |= controls::TURN_RIGHT;
            }
            if args.fire && frame_count % 30 == 0 {
                word |= controls::PRIMARY_FIRE;
            }
            client.send_command(word, None);
        }

        if frame_count % 300 == 0 {
            report(&client);
        }

        frame_count += 1;
        thread::sleep(frame);
    }

    report(&client);
    client.disconnect();
    Ok(())
}

fn report(client: &MultiplayerClient) {
    let stats = client.statistics();
    info!(
        "quality={} ping={}ms jitter={}ms loss={:.1}% sent={} updates={} mispredicts={} entities={}",
        stats.quality,
        stats.ping,
        stats.jitter,
        stats.packet_loss,
        stats.commands_sent,
        stats.updates_received,
        stats.prediction_errors,
        stats.interpolated_entities,
    );
    if let Some(ship) = client.player_ship() {
        info!(
            "ship at ({:.1}, {:.1}) facing {:.0} deg",
            ship.position.x,
            ship.position.y,
            ship.facing.normalized().degrees()
        );
    }
}
