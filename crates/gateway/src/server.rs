use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::{ConnectInfo, Query, State, WebSocketUpgrade},
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use {
    nexus_config::NexusConfig,
    nexus_protocol::{PROTOCOL_VERSION, TOKEN_PARAM},
};

use crate::{state::GatewayState, ws::handle_connection};

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws_upgrade_handler))
        .route("/ws", get(ws_upgrade_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the gateway on an already-bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: Arc<GatewayState>) -> anyhow::Result<()> {
    let app = build_gateway_app(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Start the gateway HTTP + WebSocket server.
pub async fn start_gateway(config: NexusConfig) -> anyhow::Result<()> {
    let state = GatewayState::from_config(&config);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port)
        .parse()
        .with_context(|| format!("invalid listen address {}", config.gateway.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Startup banner.
    let lines = [
        format!("nexus gateway v{}", state.version),
        format!("protocol v{PROTOCOL_VERSION}, listening on ws://{addr}"),
        format!("downstream: {}", config.gateway.downstream),
        format!(
            "auth: {}",
            if state.auth.is_enabled() {
                "token"
            } else {
                "disabled"
            }
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    serve(listener, state).await
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "protocol": PROTOCOL_VERSION,
        "connections": state.connection_count().await,
        "sessions": state.registry.session_count().await,
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    Query(mut query): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    // Repeated parameters collapse to the last value so a malformed query
    // still reaches the auth gate instead of failing the upgrade.
    let token = query.remove(TOKEN_PARAM);
    ws.on_upgrade(move |socket| handle_connection(socket, state, addr, token))
}
