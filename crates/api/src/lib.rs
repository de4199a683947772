pub mod routes;
pub mod state;

use axum::Router;
use sigbridge_core::BridgeConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the Axum application router.
pub fn build_router(state: Arc<state::AppState>) -> Router {
    Router::new()
        .merge(routes::bridge_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the bridge server.
pub async fn start_server(config: BridgeConfig, bind_addr: &str) -> anyhow::Result<()> {
    let state = Arc::new(state::AppState::from_config(&config));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("bridge listening on {}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
