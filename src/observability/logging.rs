//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter applied when neither `RUST_LOG` nor the configured level parse.
const FALLBACK_FILTER: &str = "mdx_query_proxy=info,tower_http=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `observability.log_level`.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn filter_directive(level: &str) -> String {
    format!("mdx_query_proxy={level},tower_http={level}")
}
