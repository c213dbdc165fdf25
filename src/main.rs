//! MDX Query Proxy
//!
//! Accepts an MDX query over HTTP, forwards the caller's basic-auth
//! credentials unchanged to an allow-listed analytical backend, runs the
//! query under that identity and returns the rowset as JSON.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                  MDX QUERY PROXY                     │
//!                     │                                                      │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│   auth   │──▶│     security     │   │
//!   (basic auth,      │  │ server  │   │  creds   │   │ allow-list +     │   │
//!    server, db,      │  └─────────┘   └──────────┘   │ field validation │   │
//!    query)           │                               └────────┬─────────┘   │
//!                     │                                        ▼             │
//!                     │                               ┌──────────────────┐   │
//!   Client Response   │  ┌──────────┐                 │ backend executor │   │  XMLA/HTTPS
//!   ◀─────────────────┼──│ response │◀────────────────│ connect/execute/ │◀──┼──▶ Backend
//!   (columns + rows)  │  │ marshal  │                 │ release          │   │   Server
//!                     │  └──────────┘                 └──────────────────┘   │
//!                     │                                                      │
//!                     │   config · observability · lifecycle · net/tls       │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mdx_query_proxy::config::{load_config, ConfigOrigin};
use mdx_query_proxy::lifecycle::{shutdown_signal, Shutdown};
use mdx_query_proxy::observability::{logging, metrics};
use mdx_query_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "mdx-query-proxy", version)]
#[command(about = "HTTP proxy forwarding MDX queries and caller credentials to an analytical backend")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "MDX_PROXY_CONFIG", default_value = "mdx-query-proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Configuration errors are fatal: nothing is served without an allow-list.
    let (config, origin) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("mdx-query-proxy: {}", e);
            std::process::exit(2);
        }
    };

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mdx-query-proxy starting");
    if origin == ConfigOrigin::Defaults {
        tracing::warn!(path = ?args.config, "Configuration file not found, using defaults and environment");
    }

    let allow_list = config.allow_list()?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        endpoint_template = %config.backend.endpoint_template,
        allowed_servers = ?allow_list.servers(),
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );
    if config.backend.allow_plaintext {
        tracing::warn!("Plaintext backend endpoints are allowed; credentials may travel unencrypted");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let tls = config.listener.tls.clone();
    let bind_address: SocketAddr = config.listener.bind_address.parse()?;
    let server = HttpServer::new(config, allow_list);

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    match tls {
        Some(tls) => server.run_tls(bind_address, &tls, server_shutdown).await?,
        None => {
            let listener = TcpListener::bind(bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
