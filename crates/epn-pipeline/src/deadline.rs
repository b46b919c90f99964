//! Deadline-bounded processing.
//!
//! The host gives each notification a hard wall-clock budget. Whatever
//! happens, something gets delivered: on timeout the original content is
//! presented with the envelope stripped. Presentation enrichment (asset
//! fetching lives host-side, behind [`Enricher`]) shares the same budget
//! and can only degrade richness, never delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::time::timeout;
use tracing::{debug, warn};

use epn_core::NotificationContent;

use crate::pipeline::{Outcome, Pipeline};

/// Boundary for host-supplied presentation enrichment (avatar fetch and the
/// like). Implementations must tolerate being cancelled at the deadline.
pub trait Enricher: Send + Sync {
    fn enrich<'a>(&'a self, content: &'a mut NotificationContent) -> BoxFuture<'a, ()>;
}

/// Run the pipeline under a processing budget.
///
/// The synchronous crypto runs on the blocking pool. If it outlives the
/// budget it is abandoned and the original, envelope-stripped content is
/// returned; the host tears the process down after delivery.
pub async fn process_with_deadline(
    pipeline: Arc<Pipeline>,
    content: NotificationContent,
    budget: Duration,
    enricher: Option<&dyn Enricher>,
) -> (NotificationContent, Outcome) {
    let started = Instant::now();

    let mut fallback = content.clone();
    fallback.strip_envelope();

    let worker = tokio::task::spawn_blocking(move || {
        let mut content = content;
        let outcome = pipeline.process(&mut content);
        (content, outcome)
    });

    let (mut content, outcome) = match timeout(budget, worker).await {
        Ok(Ok(done)) => done,
        Ok(Err(join_err)) => {
            warn!(error = %join_err, "processing task failed, presenting original content");
            return (
                fallback,
                Outcome::Fallback {
                    reason: "processing_failed",
                },
            );
        }
        Err(_) => {
            warn!(
                budget_ms = budget.as_millis() as u64,
                "deadline exceeded, presenting original content"
            );
            return (
                fallback,
                Outcome::Fallback {
                    reason: "deadline_exceeded",
                },
            );
        }
    };

    if let Some(enricher) = enricher {
        let remaining = budget.saturating_sub(started.elapsed());
        if timeout(remaining, enricher.enrich(&mut content)).await.is_err() {
            debug!("enrichment timed out, presenting unenriched content");
        }
    }

    (content, outcome)
}
