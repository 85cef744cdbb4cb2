use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use fleetgate::{
    config::GatewayConfig,
    db, gateway,
    session::{spawn_sweeper, MemorySessionStore, SessionStore, SqliteSessionStore},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetgate=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();

    // Session store: SQLite when configured and reachable, otherwise
    // in-memory. An unreachable database is not fatal; sessions just do not
    // survive a restart.
    let sessions: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => match db::try_create_pool(url).await {
            Ok(pool) => {
                tracing::info!("using SQLite session store");
                Arc::new(SqliteSessionStore::new(pool))
            }
            Err(e) => {
                tracing::warn!(error = %e, "session database unavailable; using in-memory store");
                Arc::new(MemorySessionStore::new())
            }
        },
        None => {
            tracing::info!("using in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
    };

    let state = AppState::new(config.clone(), sessions.clone());

    spawn_sweeper(
        sessions,
        state.push.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );

    let app = gateway::router(state);

    let addr = SocketAddr::from((config.host.parse::<IpAddr>()?, config.port));
    tracing::info!("Gateway listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
