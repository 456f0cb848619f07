//! arena-sync-bot binary
//!
//! A headless player: joins the relay, walks in circles, throws the odd
//! punch and logs what the HUD would show.  Useful for populating a test
//! arena and for exercising a relay deployment end to end.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                   | Default                            | Description                  |
//! |-----------------------|------------------------------------|------------------------------|
//! | `ARENA_URL`           | from config                        | Relay WebSocket endpoint     |
//! | `ARENA_NICKNAME`      | `bot`                              | Display name (≤ 10 chars)    |
//! | `ARENA_DATA_DIR`      | `.arena-sync`                      | Where the player id persists |
//! | `ARENA_CONFIG`        | none                               | Optional TOML config file    |
//! | `ARENA_TICK_RATE_HZ`  | `30`                               | Simulation tick rate         |
//! | `ARENA_TICKS`         | `0`                                | Stop after N ticks (0 = run) |
//! | `ARENA_RELAY__*` etc. | see `SyncConfig`                   | Any nested config key        |

use anyhow::{Context, Result};
use arena_sync::{
    controller::InputState,
    identity::IdentityStore,
    physics::KinematicBody,
    session::{GameSession, HudState, TickInput},
    transport::{TransportConfig, TransportSession},
    SyncConfig,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "arena-sync-bot", about = "Headless Arena Sync player", version)]
struct Args {
    /// Relay WebSocket URL (overrides the config file)
    #[arg(long, env = "ARENA_URL")]
    url: Option<String>,

    /// Nickname shown to other players
    #[arg(long, env = "ARENA_NICKNAME", default_value = "bot")]
    nickname: String,

    /// Directory holding the persistent player id
    #[arg(long, env = "ARENA_DATA_DIR", default_value = ".arena-sync")]
    data_dir: PathBuf,

    /// Optional TOML config file
    #[arg(long, env = "ARENA_CONFIG")]
    config: Option<PathBuf>,

    /// Tick rate (Hz)
    #[arg(long, env = "ARENA_TICK_RATE_HZ", default_value_t = 30.0)]
    tick_rate_hz: f32,

    /// Stop after this many ticks (0 = until Ctrl-C)
    #[arg(long, env = "ARENA_TICKS", default_value_t = 0)]
    ticks: u64,
}

// ---------------------------------------------------------------------------
// Scripted input
// ---------------------------------------------------------------------------

/// Walk forward while turning, punch every two seconds, jump every five.
fn scripted_input(tick: u64, tick_rate_hz: f32) -> InputState {
    let per_second = tick_rate_hz.max(1.0) as u64;
    InputState {
        forward: true,
        run: (tick / (per_second * 3)) % 2 == 1,
        jump: tick % (per_second * 5) == 0,
        punch: tick % (per_second * 2) == 0,
        pointer_locked: true,
        pointer_delta: (4.0, 0.0),
        ..Default::default()
    }
}

fn log_hud_changes(prev: &Option<HudState>, hud: &HudState) {
    let Some(prev) = prev else {
        log::info!("HUD: {} health={} connected={}", hud.display_name, hud.health, hud.connected);
        return;
    };
    if prev.connected != hud.connected {
        log::info!("Relay {}", if hud.connected { "connected" } else { "disconnected" });
    }
    if prev.health != hud.health {
        log::info!("Health {} -> {}", prev.health, hud.health);
    }
    if !prev.is_dead && hud.is_dead {
        log::info!("Died; respawning in {:.1}s", hud.respawn_remaining);
    }
    if prev.is_dead && !hud.is_dead {
        log::info!("Respawned at {}", hud.position);
    }
    if prev.remote_players != hud.remote_players {
        log::info!("{} other player(s) online", hud.remote_players);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arena_sync=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = SyncConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(url) = &args.url {
        config.relay.url = url.clone();
    }

    let mut store = IdentityStore::open(&args.data_dir);
    store
        .set_nickname(&args.nickname)
        .with_context(|| format!("rejected nickname '{}'", args.nickname))?;
    let identity = store
        .get_or_create_identity()
        .context("loading player identity")?;
    store.mark_entered()?;

    log::info!(
        "Starting arena-sync-bot (id={}, nickname='{}', url='{}', tick_rate={} Hz)",
        identity.id,
        args.nickname,
        config.relay.url,
        args.tick_rate_hz,
    );

    let transport = Arc::new(
        TransportSession::connect(TransportConfig::from(&config.relay))
            .context("starting relay transport")?,
    );
    let body = KinematicBody::new(config.movement.spawn_point);
    let mut session = GameSession::new(
        config,
        identity,
        Box::new(transport.clone()),
        Box::new(body),
    );

    let dt = 1.0 / args.tick_rate_hz.max(1.0);
    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));
    let mut hud: Option<HudState> = None;
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let frame = session.tick(TickInput {
                    dt,
                    input: scripted_input(tick, args.tick_rate_hz),
                    props: Vec::new(),
                });
                log_hud_changes(&hud, &frame.hud);
                hud = Some(frame.hud);

                tick += 1;
                if args.ticks > 0 && tick >= args.ticks {
                    log::info!("Reached {} ticks", tick);
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received");
                break;
            }
        }
    }

    session.shutdown();
    // `close` polls the bridge thread; keep it off the runtime thread.
    let closing = transport.clone();
    let closed = tokio::task::spawn_blocking(move || closing.close(Duration::from_secs(2)))
        .await
        .context("waiting for relay bridge")?;
    if !closed {
        log::warn!("Relay bridge did not stop within 2s");
    }
    let stats = transport.stats();
    log::info!(
        "Done: {} connects, {} frames in, {} frames out, {} dropped events",
        stats.connects,
        stats.frames_in,
        stats.frames_out,
        stats.dropped_events,
    );
    Ok(())
}
