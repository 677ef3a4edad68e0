//! # Cratefall
//!
//! Process entry point for the physics sandbox server: open the user
//! store, build the world (scene geometry plus the crate wall), spawn
//! the 60 Hz simulation driver, register every endpoint, and run the
//! hybrid binary/HTTP/WebSocket server until shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use cratefall_api::{register_game_routes, register_system_routes, register_user_routes, UserStore};
use cratefall_server::{Server, ServerConfig, SharedSnapshot};
use cratefall_world::nodes::crates;
use cratefall_world::{run_driver, DriverContext, PhysicsWorld, Registry, SceneManager, Vec3};

/// Physics sandbox server speaking raw binary, HTTP, and WebSocket on
/// one port.
#[derive(Parser)]
#[command(name = "cratefall", version)]
struct Cli {
    /// TCP port shared by raw, HTTP, and WebSocket traffic.
    #[arg(short, long, default_value_t = 8081)]
    port: u16,

    /// Reactor worker count; 0 means one per hardware thread.
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// SQLite database path for the user store.
    #[arg(long, default_value = "cratefall.db")]
    db: String,

    /// Scene configuration file.
    #[arg(long, default_value = "demos/scene/default.json")]
    scene: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(&Cli::parse()) {
        tracing::error!(%err, "fatal error");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(UserStore::open(&cli.db)?);

    let scene = match SceneManager::load_from_file(&cli.scene) {
        Ok(scene) => scene,
        Err(err) => {
            tracing::warn!(%err, path = %cli.scene, "scene unavailable; using built-in fallback");
            SceneManager::fallback()
        }
    };

    let physics = Arc::new(Mutex::new(PhysicsWorld::new()));
    let registry = Arc::new(Mutex::new(Registry::default()));
    {
        let mut physics_guard = physics.lock();
        scene.create_all(&mut physics_guard);
        let mut registry_guard = registry.lock();
        crates::spawn_wall(
            &mut registry_guard,
            &mut physics_guard,
            Vec3::new(-5.0, 0.0, 10.0),
            10,
            1,
            5,
        );
    }

    let snapshot = Arc::new(SharedSnapshot::new());
    let running = Arc::new(AtomicBool::new(true));

    let driver = {
        let snapshot = Arc::clone(&snapshot);
        let ctx = DriverContext {
            registry: Arc::clone(&registry),
            physics: Arc::clone(&physics),
            running: Arc::clone(&running),
            publish: Box::new(move |bytes| snapshot.publish(bytes)),
        };
        std::thread::Builder::new()
            .name("simulation-driver".into())
            .spawn(move || run_driver(&ctx))?
    };

    let mut server = Server::new(ServerConfig {
        port: cli.port,
        workers: cli.workers,
        ..ServerConfig::default()
    });
    register_system_routes(&mut server, Arc::clone(&store), Instant::now())?;
    register_user_routes(&mut server, store)?;
    register_game_routes(
        &mut server,
        registry,
        physics,
        scene.raw_json().to_string(),
        snapshot,
    )?;

    tracing::info!(port = cli.port, db = %cli.db, "cratefall sandbox ready");
    server.start()?;
    server.join();

    running.store(false, Ordering::Relaxed);
    let _ = driver.join();
    Ok(())
}
