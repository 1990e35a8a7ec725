use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetmon_api::config::ServerConfig;
use fleetmon_api::router::build_app_router;
use fleetmon_api::state::AppState;
use fleetmon_client::pool::DeviceClientPool;
use fleetmon_monitor::config::MonitorConfig;
use fleetmon_monitor::discovery::DiscoveryOrchestrator;
use fleetmon_monitor::scheduler::MonitorScheduler;
use fleetmon_monitor::service::MonitorService;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fleetmon_api=debug,fleetmon_monitor=debug,fleetmon_client=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let monitor_config = MonitorConfig::from_env();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fleetmon_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fleetmon_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fleetmon_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Monitor engine ---
    let clients = Arc::new(DeviceClientPool::new(
        monitor_config.device_grpc_port,
        monitor_config.device_http_port,
    ));
    let discovery = DiscoveryOrchestrator::from_config(&monitor_config);
    let service = Arc::new(MonitorService::new(
        pool.clone(),
        discovery,
        Arc::clone(&clients),
    ));

    let shutdown = CancellationToken::new();
    let scheduler = MonitorScheduler::new(Arc::clone(&service), &monitor_config);
    let cycle_handles = scheduler.spawn(shutdown.clone());
    tracing::info!("Monitor scheduler started (discovery + polling cycles)");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    tracing::info!(addr = %addr, "API server listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            serve_shutdown.cancel();
        })
        .await
        .expect("Server error");

    shutdown.cancel();
    for handle in cycle_handles {
        let _ = handle.await;
    }
    tracing::info!("Monitor cycles stopped, exiting");
}
