//! Headless voxlink client.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI
//! flags. Run with `cargo run -p voxlink-app -- --offline` to stream terrain
//! without a server. The simulated player walks a slow circle around the
//! spawn point so chunks stream in and out.

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};
use voxlink_app::{
    DriverSettings, GameLoop, HeadlessRenderer, LoggingObserver, PlayerPose, WorldDriver,
};
use voxlink_config::{CliArgs, Config, default_config_dir};
use voxlink_net::{Credentials, FrameConfig, SessionLink};

/// World units per second the simulated player walks.
const WALK_SPEED: f64 = 40.0;

/// Radius of the walked circle in world units.
const WALK_RADIUS: f64 = 600.0;

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    voxlink_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = run(&config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let settings = DriverSettings::from_config(config);
    let renderer = HeadlessRenderer::default();
    let observer = LoggingObserver::default();

    let mut driver = if config.network.offline {
        WorldDriver::offline(settings, renderer, observer)?
    } else {
        let endpoint = config.server_endpoint();
        info!("Connecting to {}", endpoint);
        let link = SessionLink::connect(
            endpoint,
            FrameConfig {
                max_payload_size: config.network.max_frame_bytes,
            },
        )?;
        let credentials = Credentials::Password {
            login: config.account.login.clone(),
            password: config.account.password.clone(),
        };
        WorldDriver::online(settings, renderer, observer, Box::new(link), credentials)?
    };

    let [spawn_x, spawn_y, spawn_z] = config.world.spawn;
    let mut game_loop = GameLoop::new();
    let mut last_report = Instant::now();

    loop {
        game_loop.tick(|_, sim_time| {
            let angle = sim_time * WALK_SPEED / WALK_RADIUS;
            let pose = PlayerPose {
                x: spawn_x + WALK_RADIUS * angle.cos(),
                y: spawn_y,
                z: spawn_z + WALK_RADIUS * angle.sin(),
                camera_angle: angle,
            };
            driver.tick(Instant::now(), pose)
        })?;

        if last_report.elapsed() >= Duration::from_secs(10) {
            last_report = Instant::now();
            let renderer = driver.manager().renderer();
            info!(
                "{} chunks visible, {} quads, {} records, chunk {:?}",
                driver.manager().visible_count(),
                renderer.live_quads(),
                driver.manager().record_count(),
                driver.current_chunk()
            );
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}
