//! handoff_web demo server.
//!
//! Boots the server, drains contexts and answers each one with a short
//! plain-text response.
//!
//! # Usage
//!
//! ```text
//! handoff_web --config server.toml --port 8080
//! ```

use clap::Parser;
use handoff_web::{config::ServerConfig, Context, ErrorKind, Server, StatusCode};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "handoff_web", about = "HTTP/1.1 front end with a queued consumer")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handoff_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        bind_address = %config.bind_address,
        port = config.port,
        read_timeout_ms = config.read_timeout_ms,
        "configuration loaded"
    );

    let server = Arc::new(Server::bind(config).await?);
    info!(address = %server.local_addr()?, "listening for connections");
    server.start();

    {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                server.stop();
            }
        });
    }

    while let Some(ctx) = server.get_context().await {
        if let Err(e) = answer(ctx).await {
            warn!(error = %e, "failed to answer");
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn answer(mut ctx: Context) -> Result<(), ErrorKind> {
    let request = ctx.request();
    info!(
        peer = %request.remote(),
        method = %request.method(),
        path = request.path(),
        "handling request"
    );

    let body = format!("{} {}\n", request.method(), request.url());
    let head = format!(
        "content-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    );

    let resp = ctx.response_mut();
    resp.send(StatusCode::Ok.into_first_line()).await?;
    resp.send(head.as_bytes()).await?;
    resp.send(body.as_bytes()).await?;
    resp.close().await
}
