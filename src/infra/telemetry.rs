use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::feed::{
    METRIC_FEED_CACHE_ERROR, METRIC_FEED_CACHE_HIT, METRIC_FEED_CACHE_MISS, METRIC_FEED_FOLD,
    METRIC_FEED_PAGE_CLAMPED,
};
use crate::config::{LogFormat, LoggingSettings};

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
            METRIC_FEED_CACHE_HIT,
            Unit::Count,
            "Feed reads answered from the snapshot."
        );
        describe_counter!(
            METRIC_FEED_CACHE_MISS,
            Unit::Count,
            "Snapshot-shaped feed reads that fell through to the record store."
        );
        describe_counter!(
            METRIC_FEED_CACHE_ERROR,
            Unit::Count,
            "Feed cache operations that failed, labelled by kind."
        );
        describe_counter!(
            METRIC_FEED_PAGE_CLAMPED,
            Unit::Count,
            "Feed reads re-issued against the last page after overshooting."
        );
        describe_counter!(
            METRIC_FEED_FOLD,
            Unit::Count,
            "Background folds of new ads into the snapshot, labelled by outcome."
        );
    });
}
