//! Retry policy and deadline for extraction strategies.
//!
//! `retry_with_backoff` runs a `Strategy` up to `max_attempts` times, sleeping
//! `attempt × base_delay` between tries, and surfaces the last error. Errors whose code
//! is not retryable stop the loop immediately. `with_deadline` races a future against
//! a wall-clock budget; the losing future is dropped, which cancels it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::diagnostics::context::ParsingContext;
use crate::diagnostics::error::{ErrorCode, ParserError};

/// One way of recovering text. Each attempt gets the document's context so the
/// strategy can log its own progress.
#[async_trait]
pub trait Strategy: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn run(&self, attempt: u32, ctx: &mut ParsingContext) -> Result<Self::Output, ParserError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `retry_attempts` counts retries, so the strategy runs `retry_attempts + 1` times.
    pub fn from_retries(retry_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: retry_attempts.saturating_add(1),
            base_delay,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

pub async fn retry_with_backoff<S: Strategy>(
    policy: RetryPolicy,
    strategy: &S,
    ctx: &mut ParsingContext,
) -> Result<S::Output, ParserError> {
    let max_attempts = policy.max_attempts.max(1);
    let name = strategy.name();
    let mut last_error: Option<ParserError> = None;

    for attempt in 1..=max_attempts {
        match strategy.run(attempt, ctx).await {
            Ok(value) => {
                if attempt > 1 {
                    ctx.info("ingest", format!("{name} succeeded on attempt {attempt}"));
                }
                return Ok(value);
            }
            Err(err) => {
                let err = err.with_detail("attempt", attempt).with_detail("strategy", name);
                let retryable = err.is_retryable();
                let err = ctx.record_error("ingest", &err);
                last_error = Some(err);

                if !retryable || attempt == max_attempts {
                    break;
                }
                let delay = policy.delay_after(attempt);
                ctx.warn(
                    "ingest",
                    format!(
                        "{name} attempt {attempt}/{max_attempts} failed, retrying after {}ms",
                        delay.as_millis()
                    ),
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ParserError::new(ErrorCode::UnknownError, format!("{name} produced no result"))
    }))
}

pub async fn with_deadline<T, Fut>(budget: Duration, fut: Fut) -> Result<T, ParserError>
where
    Fut: Future<Output = Result<T, ParserError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(ParserError::new(
            ErrorCode::TimeoutExceeded,
            format!("Extraction exceeded the {}ms deadline", budget.as_millis()),
        )
        .with_stage("ingest")
        .with_detail("timeout_ms", budget.as_millis())),
    }
}
