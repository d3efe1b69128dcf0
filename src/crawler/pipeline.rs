//! Post-download processing pipeline
//!
//! Every successful download is handed to an ordered list of
//! [`PipelineStep`]s. Each step sees the same mutable [`FetchResult`] and may
//! halt the remaining steps for that result. Steps are isolated from each
//! other:
//! - an `Err` or a panic is reported and the next step runs
//! - a step exceeding its time bound is abandoned and its cancellation
//!   token fires

use crate::crawler::coordinator::Coordinator;
use crate::crawler::result::FetchResult;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Whether later steps see this result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Handle passed to a running step
pub struct StepContext<'a> {
    crawler: &'a Coordinator,
    cancellation: CancellationToken,
}

impl<'a> StepContext<'a> {
    pub fn new(crawler: &'a Coordinator, cancellation: CancellationToken) -> Self {
        Self {
            crawler,
            cancellation,
        }
    }

    /// The coordinator running this crawl, for queueing discovered links
    pub fn crawler(&self) -> &'a Coordinator {
        self.crawler
    }

    /// Cancelled when the step's time bound expires
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// A unit of post-download processing
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Name used in logs and error reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Upper bound on one call to [`process`](Self::process)
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Hint that this step does not depend on earlier steps' output
    ///
    /// [`PipelineRunner`] always runs steps in order; the hint is for
    /// executors that want to overlap independent steps.
    fn run_in_parallel(&self) -> bool {
        false
    }

    async fn process(&self, ctx: &StepContext<'_>, result: &mut FetchResult) -> anyhow::Result<Flow>;
}

/// Why a pipeline step did not finish normally
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step failed: {0}")]
    Failed(anyhow::Error),

    #[error("step panicked: {0}")]
    Panicked(String),

    #[error("step timed out after {0:?}")]
    TimedOut(Duration),
}

enum Outcome {
    Finished(std::thread::Result<anyhow::Result<Flow>>),
    TimedOut(Duration),
}

/// Runs pipeline steps in order over one result at a time
#[derive(Clone, Default)]
pub struct PipelineRunner {
    steps: Vec<Arc<dyn PipelineStep>>,
}

impl PipelineRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Arc<dyn PipelineStep>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Passes `result` through every step until one halts
    pub async fn run(&self, crawler: &Coordinator, result: &mut FetchResult) {
        for step in &self.steps {
            let token = CancellationToken::new();
            let ctx = StepContext::new(crawler, token.clone());

            let outcome = {
                let fut = AssertUnwindSafe(step.process(&ctx, result)).catch_unwind();
                match step.timeout() {
                    Some(limit) => match tokio::time::timeout(limit, fut).await {
                        Ok(finished) => Outcome::Finished(finished),
                        Err(_) => Outcome::TimedOut(limit),
                    },
                    None => Outcome::Finished(fut.await),
                }
            };

            let error = match outcome {
                Outcome::Finished(Ok(Ok(Flow::Continue))) => continue,
                Outcome::Finished(Ok(Ok(Flow::Halt))) => {
                    tracing::debug!(
                        "{} halted pipeline for {}",
                        step.name(),
                        result.step().uri()
                    );
                    break;
                }
                Outcome::Finished(Ok(Err(e))) => PipelineError::Failed(e),
                Outcome::Finished(Err(panic)) => PipelineError::Panicked(panic_message(panic)),
                Outcome::TimedOut(limit) => {
                    token.cancel();
                    PipelineError::TimedOut(limit)
                }
            };

            tracing::warn!(
                "Pipeline step {} failed for {}: {}",
                step.name(),
                result.step().uri(),
                error
            );
            crawler.report_pipeline_error(step.name(), result, &error).await;
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
