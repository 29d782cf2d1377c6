use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::comments::{CACHE_ERROR_METRIC, CACHE_HIT_METRIC, CACHE_MISS_METRIC};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::REQUEST_DURATION_METRIC;

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            CACHE_HIT_METRIC,
            Unit::Count,
            "Comment reads served from the cache."
        );
        describe_counter!(
            CACHE_MISS_METRIC,
            Unit::Count,
            "Comment reads that fell through to the durable store."
        );
        describe_counter!(
            CACHE_ERROR_METRIC,
            Unit::Count,
            "Cache operations that failed and were ignored."
        );
        describe_histogram!(
            REQUEST_DURATION_METRIC,
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
