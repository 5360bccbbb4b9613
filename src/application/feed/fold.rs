use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use metrics::counter;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::FeedCache;
use crate::domain::entities::AdvertisementRecord;

use super::METRIC_FEED_FOLD;

const SOURCE: &str = "listings::feed::fold";

/// How a background fold ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldOutcome {
    Applied { ad_id: Uuid, snapshot_len: usize },
    Failed { ad_id: Uuid, reason: String },
    TimedOut { ad_id: Uuid },
}

impl FoldOutcome {
    pub fn ad_id(&self) -> Uuid {
        match self {
            Self::Applied { ad_id, .. } | Self::Failed { ad_id, .. } | Self::TimedOut { ad_id } => {
                *ad_id
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Runs post-create folds on their own tasks, detached from the request that
/// triggered them.
#[derive(Clone)]
pub struct FoldDispatcher {
    cache: Arc<FeedCache>,
    timeout: Duration,
    in_flight: Arc<InFlight>,
    outcomes: Option<mpsc::UnboundedSender<FoldOutcome>>,
}

impl FoldDispatcher {
    pub fn new(cache: Arc<FeedCache>, timeout: Duration) -> Self {
        Self {
            cache,
            timeout,
            in_flight: Arc::new(InFlight::default()),
            outcomes: None,
        }
    }

    /// Report every finished fold on `sink`, in completion order.
    pub fn with_outcomes(mut self, sink: mpsc::UnboundedSender<FoldOutcome>) -> Self {
        self.outcomes = Some(sink);
        self
    }

    pub fn dispatch(&self, ad: AdvertisementRecord) {
        let guard = InFlightGuard::enter(&self.in_flight);
        let this = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let outcome = this.run(ad).await;
            this.report(outcome);
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait for outstanding folds. Returns `false` if some were still running at the deadline.
    pub async fn drain(&self, within: Duration) -> bool {
        let wait = async {
            loop {
                let idle = self.in_flight.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                idle.await;
            }
        };
        tokio::time::timeout(within, wait).await.is_ok()
    }

    async fn run(&self, ad: AdvertisementRecord) -> FoldOutcome {
        let ad_id = ad.id;
        match tokio::time::timeout(self.timeout, self.cache.fold(ad)).await {
            Ok(Ok(snapshot_len)) => FoldOutcome::Applied {
                ad_id,
                snapshot_len,
            },
            Ok(Err(err)) => FoldOutcome::Failed {
                ad_id,
                reason: err.to_string(),
            },
            Err(_) => FoldOutcome::TimedOut { ad_id },
        }
    }

    fn report(&self, outcome: FoldOutcome) {
        match &outcome {
            FoldOutcome::Applied {
                ad_id,
                snapshot_len,
            } => debug!(
                target = SOURCE,
                ad_id = %ad_id,
                snapshot_len,
                "Folded advertisement into feed snapshot"
            ),
            FoldOutcome::Failed { ad_id, reason } => warn!(
                target = SOURCE,
                ad_id = %ad_id,
                reason = %reason,
                "Feed fold failed; snapshot heals on TTL or next warm"
            ),
            FoldOutcome::TimedOut { ad_id } => warn!(
                target = SOURCE,
                ad_id = %ad_id,
                timeout_ms = self.timeout.as_millis() as u64,
                "Feed fold timed out"
            ),
        }

        counter!(METRIC_FEED_FOLD, "outcome" => outcome.label()).increment(1);

        if let Some(sink) = &self.outcomes {
            let _ = sink.send(outcome);
        }
    }
}
