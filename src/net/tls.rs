//! TLS configuration and serving.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;

use crate::lifecycle::ShutdownListener;

/// Grace period for in-flight requests once TLS shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} file not found: {:?}", what, path),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Serve `router` over TLS until `shutdown` fires.
pub async fn serve_tls(
    router: Router,
    addr: SocketAddr,
    config: RustlsConfig,
    shutdown: ShutdownListener,
) -> Result<(), std::io::Error> {
    let handle = Handle::new();

    let drain = handle.clone();
    tokio::spawn(async move {
        shutdown.recv().await;
        drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
    });

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
}
