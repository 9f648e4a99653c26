use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::r#trait::{ReportInput, Reporter};

/// Per-sink result of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub posted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchSummary {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fan-out over the configured reporters. Not a reporter itself.
///
/// Every reporter runs concurrently; a failing or panicking reporter is
/// logged and recorded in the summary without affecting the others.
#[derive(Clone, Default)]
pub struct ReportDispatcher {
    reporters: Arc<Vec<Arc<dyn Reporter>>>,
}

impl ReportDispatcher {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self {
            reporters: Arc::new(reporters),
        }
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.reporters.iter().map(|r| r.name().to_string()).collect()
    }

    pub async fn dispatch(&self, input: &ReportInput) -> DispatchSummary {
        let posts = self.reporters.iter().map(|reporter| async move {
            let name = reporter.name().to_string();
            // Whatever a sink logs while posting stays inside this span.
            let span = tracing::info_span!("report_dispatch", reporter = %name);
            let result = AssertUnwindSafe(reporter.post_report(input))
                .catch_unwind()
                .instrument(span)
                .await;
            (name, result)
        });

        let mut summary = DispatchSummary::default();
        for (name, result) in join_all(posts).await {
            match result {
                Ok(Ok(())) => {
                    tracing::debug!(target: "autopilot.reporter", reporter = %name, "report posted");
                    summary.posted.push(name);
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        target: "autopilot.reporter",
                        reporter = %name,
                        error = %e,
                        "reporter failed"
                    );
                    summary.failed.push((name, e.to_string()));
                }
                Err(_) => {
                    tracing::error!(target: "autopilot.reporter", reporter = %name, "reporter panicked");
                    summary.failed.push((name, "panicked".to_string()));
                }
            }
        }
        summary
    }

    /// Fire-and-forget dispatch on the runtime. The caller is not expected to
    /// await the handle; tests and shutdown paths may.
    pub fn dispatch_detached(&self, input: ReportInput) -> JoinHandle<DispatchSummary> {
        let this = self.clone();
        tokio::spawn(async move { this.dispatch(&input).await })
    }
}
