//! War Room - multi-agent conversation orchestration
//!
//! One shared timeline where a human addresses a roster of agents, either
//! one-shot or as a structured multi-round debate.

mod api;
mod command;
mod config;
mod engine;
mod hub;
mod roster;
mod store;
#[cfg(test)]
mod testing;
mod timeline;
mod turn;

use api::{create_router, AppState};
use config::Config;
use engine::WarRoom;
use hub::BroadcastHub;
use roster::{AliasResolver, ConfigRosterSource};
use std::net::SocketAddr;
use std::sync::Arc;
use store::MessageStore;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turn::{CommandRunner, TurnExecutor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warroom=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        log = %config.log_path.display(),
        agents_config = %config.agents_config.display(),
        agent_bin = %config.agent_bin.display(),
        "Configuration loaded"
    );

    let store = Arc::new(MessageStore::new(&config.log_path));
    let source = ConfigRosterSource::new(&config.agents_config, &config.home);
    let resolver = Arc::new(AliasResolver::new(Arc::new(source), config.alias_ttl));

    match resolver.resolve_aliases().await {
        Ok(roster) => tracing::info!(agents = ?roster.ids(), "Roster loaded"),
        Err(e) => tracing::warn!(error = %e, "Roster unavailable at startup"),
    }

    let runner = CommandRunner::new(&config.agent_bin).with_prefix_args(config.agent_args.clone());
    let executor = Arc::new(TurnExecutor::new(Arc::new(runner), config.turn_timeout));
    let hub = Arc::new(BroadcastHub::new(
        store.clone(),
        resolver.clone(),
        config.history_limit,
    ));
    let room = Arc::new(WarRoom::new(
        store,
        resolver,
        executor,
        hub,
        config.user_name.clone(),
    ));

    let state = AppState::new(room, config.history_limit);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("War room listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
