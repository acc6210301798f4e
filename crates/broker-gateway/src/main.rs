//! broker gateway
//!
//! - `POST /handle`: one envelope in, one downstream call, one envelope out
//! - `POST /log/{variant}`: log delivery through a named protocol
//! - Config path from the first argument (default `broker.yaml`)

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use broker_gateway::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "broker.yaml".into());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .expect("gateway.listen must be a valid SocketAddr");

    let state = app_state::AppState::new(cfg).expect("gateway state init failed");
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "broker-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(listener, app).await.expect("server failed");
}
