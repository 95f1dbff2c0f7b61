// src/bin/api_server.rs

use records_ledger_gateway::infra::logging::init_tracing;
use records_ledger_gateway::transport;
use records_ledger_gateway::{FabricSessionFactory, GatewayConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Channel and chaincode are needed by every route: refuse to start without them.
    let config = GatewayConfig::from_env()?;
    tracing::info!(
        channel = %config.target.channel,
        chaincode = %config.target.chaincode,
        peer = config.peer.peer_endpoint.as_deref().unwrap_or("<unset>"),
        "gateway configuration loaded"
    );
    if let Err(e) = config.peer.require() {
        // Not fatal: each request re-validates and reports this as a 400.
        tracing::warn!(error = %e, "peer settings incomplete");
    }

    let app_state = transport::http::AppState {
        sessions: Arc::new(FabricSessionFactory::new(config.peer.clone())),
        target: config.target.clone(),
        raw_preview_limit: config.raw_preview_limit,
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "records-ledger-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
        })
        .await?;

    tracing::info!("graceful shutdown complete");
    Ok(())
}
