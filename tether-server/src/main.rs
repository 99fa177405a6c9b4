use anyhow::Result;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use tether_server::{ws_handler, RelayService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether-server", about = "WebRTC room signaling relay")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3050)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let service = RelayService::new();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("signaling relay listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
