use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use claims_engine::repository::{MemoryStore, Repositories};
use claims_engine::{ClaimIndex, Flag, Permission, PlayerId, Position3D, WorldId};
use claims_server::config::ClaimsConfig;
use claims_server::dashboard::{self, DashboardState, Metrics};
use claims_server::event_bus::{self, ClaimEvent};
use claims_server::persistence::JsonStore;
use claims_server::player_state::PlayerStateRegistry;
use claims_server::rules::{Hazard, Interaction, WorldEvent};
use claims_server::service::{ClaimService, ServiceDeps};
use claims_server::services::{NoMetadata, SquareBorder};
use claims_server::{expiry, writer};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let demo_mode = std::env::args().any(|a| a == "--demo");
    let config_path: PathBuf = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .unwrap_or_else(|| "claims.toml".into())
        .into();
    let data_path: PathBuf = std::env::args()
        .skip_while(|a| a != "--data")
        .nth(1)
        .unwrap_or_else(|| "claims.json".into())
        .into();
    let port_flag: Option<u16> = std::env::args()
        .skip_while(|a| a != "--dashboard-port")
        .nth(1)
        .and_then(|s| s.parse().ok());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ClaimsConfig::from_optional_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let dashboard_port = port_flag.unwrap_or(config.dashboard_port);

    if demo_mode {
        return run_demo(config).await;
    }

    tracing::info!("Claims server starting");

    // ── Rebuild the index from the store ───────────────────────────────
    let store = Arc::new(JsonStore::open(&data_path)?);
    let repos = Repositories::from_batch_store(store);
    let index = Arc::new(ClaimIndex::new());
    let report = repos
        .rebuild(&index)
        .with_context(|| format!("reading claims from {}", data_path.display()))?;
    tracing::info!(
        "Loaded {} claims ({} partitions) in {} worlds from {}",
        report.claims,
        report.partitions,
        report.worlds,
        data_path.display()
    );
    for (claim, reason) in &report.rejected {
        tracing::warn!(claim = %claim, "Stored claim not loaded: {}", reason);
    }

    let service = Arc::new(compose(config.clone(), index, repos));

    // Live dashboard (non-blocking, runs on its own tasks).
    let dash = Arc::new(DashboardState::new(
        Arc::clone(service.metrics()),
        Arc::clone(service.index()),
        Arc::clone(service.players()),
        service.bus(),
    ));
    tokio::spawn(async move {
        dashboard::server::start(dash, dashboard_port).await;
    });

    expiry::start(Arc::clone(&service), config.expiry_check_interval());

    tracing::info!("Claims server ready");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    tracing::info!("Ctrl+C received, shutting down...");

    let violations = service.index().verify_invariants();
    if !violations.is_empty() {
        tracing::warn!("{} index invariant violations at shutdown", violations.len());
    }
    Ok(())
}

/// Wire the service from its parts. The caller owns the runtime.
fn compose(config: ClaimsConfig, index: Arc<ClaimIndex>, repos: Repositories) -> ClaimService {
    let (bus, _) = broadcast::channel::<ClaimEvent>(event_bus::BUS_CAPACITY);
    let deps = ServiceDeps {
        index,
        writer: writer::spawn(repos),
        players: Arc::new(PlayerStateRegistry::new()),
        world: Arc::new(SquareBorder::new(config.world_border_radius)),
        metadata: Arc::new(NoMetadata),
        metrics: Arc::new(Metrics::new()),
        bus,
    };
    ClaimService::new(config, deps)
}

/// Walk through a claim's life against an in-memory store.
async fn run_demo(config: ClaimsConfig) -> anyhow::Result<()> {
    tracing::info!("Claims demo (in-memory store)");

    let store = Arc::new(MemoryStore::new());
    let service = compose(
        config,
        Arc::new(ClaimIndex::new()),
        Repositories::from_store(Arc::clone(&store)),
    );
    let world = WorldId::new();
    let alice = PlayerId::new();
    let bob = PlayerId::new();

    let claim = service
        .create_claim(alice, world, "Homestead", Position3D::new(0, 64, 0))
        .await?;
    tracing::info!("Alice claimed {}", claim);

    let inside = Position3D::new(2, 64, 2);
    let dig = |player| WorldEvent::Interact {
        world,
        player,
        pos: inside,
        action: Interaction::BreakBlock,
    };
    tracing::info!("Bob may dig before grant: {}", service.protect(&dig(bob)));
    service
        .grant_player_permission(alice, claim, bob, Permission::Break)
        .await?;
    tracing::info!("Bob may dig after grant: {}", service.protect(&dig(bob)));

    let blast = WorldEvent::Hazard {
        world,
        pos: inside,
        hazard: Hazard::Explosion,
    };
    tracing::info!("Explosions allowed: {}", service.protect(&blast));
    service.set_flag(alice, claim, Flag::Explosion, true).await?;
    tracing::info!("Explosions allowed after flag: {}", service.protect(&blast));

    service.offer_transfer(alice, claim, bob).await?;
    service.accept_transfer(bob, claim).await?;
    let owner = service.claim_details(claim).map(|d| d.owner);
    tracing::info!("Owner after transfer is Bob: {}", owner == Some(bob));

    tracing::info!(
        "Store holds {} claims, {} partitions, {} grants, {} flags",
        store.claim_count(),
        store.partition_count(),
        store.grant_count(),
        store.flag_count()
    );
    Ok(())
}
