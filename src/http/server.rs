//! HTTP server setup and the query pipeline.
//!
//! # Responsibilities
//! - Create the Axum router (usage/query endpoint, health)
//! - Wire up middleware (request ID, tracing, body and concurrency limits)
//! - Run each request through credentials → parameters → validation →
//!   backend execution → marshalling
//! - Log every request on entry and every failure before responding

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        ConnectInfo, DefaultBodyLimit, Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::auth::Credentials;
use crate::backend::{QueryBackend, QueryExecutor, ResultTable, XmlaBackend};
use crate::config::{ProxyConfig, TlsConfig};
use crate::error::ProxyError;
use crate::http::query::QueryParams;
use crate::http::request::{make_request_span, propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::{ErrorResponse, QueryResponse, USAGE};
use crate::lifecycle::ShutdownListener;
use crate::net::tls::{load_tls_config, serve_tls};
use crate::observability::metrics;
use crate::query::{truncate_chars, LOGGED_QUERY_PREFIX};
use crate::security::{validate, AllowList, ValidationError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub allow_list: Arc<AllowList>,
    pub executor: QueryExecutor,
    pub max_body_size: usize,
}

/// HTTP server for the query proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that talks XMLA to the configured endpoints.
    pub fn new(config: ProxyConfig, allow_list: AllowList) -> Self {
        let backend = Arc::new(XmlaBackend::new(&config.backend));
        Self::with_backend(config, allow_list, backend)
    }

    /// Create a server with an explicit backend implementation.
    pub fn with_backend(
        config: ProxyConfig,
        allow_list: AllowList,
        backend: Arc<dyn QueryBackend>,
    ) -> Self {
        let state = AppState {
            allow_list: Arc::new(allow_list),
            executor: QueryExecutor::new(backend),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(query_handler).post(query_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                    .layer(propagate_request_id_layer())
                    .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections)),
            )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires; in-flight requests are drained.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.config.listener.max_connections,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        tracing::info!(
            address = %addr,
            max_connections = self.config.listener.max_connections,
            "HTTPS server starting"
        );

        serve_tls(self.router, addr, rustls, shutdown).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Main proxy handler: usage hint or query pipeline.
async fn query_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    params: Result<Query<QueryParams>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers);

    let (params, params_error) = match params {
        Ok(Query(params)) => (Some(params), None),
        Err(rejection) => (None, Some(ValidationError::MalformedParameters(rejection.body_text()))),
    };

    if method == Method::GET
        && !headers.contains_key(header::AUTHORIZATION)
        && params_error.is_none()
        && params.as_ref().is_some_and(is_empty)
    {
        tracing::debug!(request_id = %request_id, client_addr = %addr, "Serving usage hint");
        metrics::record_request(StatusCode::OK.as_u16(), start_time);
        return (StatusCode::OK, USAGE).into_response();
    }

    let params = params.unwrap_or_default();
    let body = read_body(body, state.max_body_size);
    let credentials = Credentials::from_headers(&headers);

    let query_text = params.query_text(body.as_deref().unwrap_or(""));
    tracing::info!(
        request_id = %request_id,
        client_addr = %addr,
        method = %method,
        server = params.server.as_deref().unwrap_or(""),
        db = params.db.as_deref().unwrap_or(""),
        locale_id = params.locale_identifier.as_deref().unwrap_or(""),
        application_name = params.application_name.as_deref().unwrap_or(""),
        timeout_secs = params.timeout.as_deref().unwrap_or(""),
        username = credentials.as_ref().map(Credentials::username).unwrap_or(""),
        query_len = query_text.chars().count(),
        query = truncate_chars(query_text, LOGGED_QUERY_PREFIX),
        "Received query request"
    );

    let result = run_pipeline(&state, &request_id, credentials, params, params_error, body).await;

    match result {
        Ok(table) => {
            metrics::record_request(StatusCode::OK.as_u16(), start_time);
            (StatusCode::OK, Json(QueryResponse::from(table))).into_response()
        }
        Err(error) => {
            let status = error.status();
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                kind = error.kind(),
                field = error.field().unwrap_or(""),
                error = %error,
                "Query request failed"
            );
            metrics::record_request(status.as_u16(), start_time);
            ErrorResponse { error, request_id }.into_response()
        }
    }
}

/// Credentials first, then parameters, then validation; the backend is only
/// reached once all of them pass.
async fn run_pipeline(
    state: &AppState,
    request_id: &str,
    credentials: Option<Credentials>,
    params: QueryParams,
    params_error: Option<ValidationError>,
    body: Result<String, ValidationError>,
) -> Result<ResultTable, ProxyError> {
    let credentials = credentials.ok_or(ProxyError::MissingCredentials)?;

    if let Some(e) = params_error {
        return Err(e.into());
    }
    let body = match body {
        Ok(body) => body,
        // a URI query makes an undecodable body irrelevant
        Err(ValidationError::QueryNotUtf8) if params.query.is_some() => String::new(),
        Err(e) => return Err(e.into()),
    };

    let request = params.into_request(&body)?;
    let validated = validate(request, credentials, &state.allow_list)?;

    Ok(state.executor.execute(&validated, request_id).await?)
}

/// Decode the buffered body. Limit and transport failures become validation
/// errors so they go through the same logging and error rendering.
fn read_body(body: Result<Bytes, BytesRejection>, limit: usize) -> Result<String, ValidationError> {
    match body {
        Ok(bytes) => String::from_utf8(bytes.to_vec()).map_err(|_| ValidationError::QueryNotUtf8),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ValidationError::BodyTooLarge { limit })
        }
        Err(rejection) => Err(ValidationError::BodyUnreadable(rejection.body_text())),
    }
}

fn is_empty(params: &QueryParams) -> bool {
    params.server.is_none()
        && params.db.is_none()
        && params.query.is_none()
        && params.locale_identifier.is_none()
        && params.application_name.is_none()
        && params.timeout.is_none()
}
