use rand::{SeedableRng, rngs::StdRng};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::errors::Error;
use crate::types::HttpMethod;

use super::{RetryOutcome, plan::RetryPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Fetch,
    Submit,
    Update,
    Remove,
}

impl From<HttpMethod> for OperationKind {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => OperationKind::Fetch,
            HttpMethod::Post => OperationKind::Submit,
            HttpMethod::Put | HttpMethod::Patch => OperationKind::Update,
            HttpMethod::Delete => OperationKind::Remove,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Fetch => write!(f, "fetch"),
            OperationKind::Submit => write!(f, "submit"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Remove => write!(f, "remove"),
        }
    }
}

/// Re-runs a fallible operation according to a [`RetryPlan`].
///
/// Only [`Error::is_retriable`] failures are retried; session and
/// authorization errors surface on the first attempt.
pub struct RetryCoordinator {
    plan: RetryPlan,
    rng: Mutex<StdRng>,
}

impl RetryCoordinator {
    pub fn new(plan: RetryPlan) -> Self {
        Self {
            plan,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn plan(&self) -> RetryPlan {
        self.plan.clone()
    }

    /// Runs `op` until it succeeds, fails with a non-retriable error, or the
    /// plan's attempts are spent. `op` receives the 1-based attempt number.
    pub async fn execute<F, Fut, T>(
        &self,
        operation: OperationKind,
        mut op: F,
    ) -> Result<(T, RetryOutcome), Error>
    where
        F: FnMut(u8) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, Error>> + Send,
    {
        let start = Instant::now();
        let mut attempt: u8 = 0;
        let result = loop {
            attempt += 1;
            let err = match op(attempt).await {
                Ok(value) => break Ok(value),
                Err(err) => err,
            };
            if attempt >= self.plan.max_attempts || !err.is_retriable() {
                break Err(err);
            }
            let delay = self.next_delay(attempt + 1).await;
            warn!(
                operation = %operation,
                attempt,
                max_attempts = self.plan.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retry.scheduling"
            );
            tokio::time::sleep(delay).await;
        };

        let outcome = RetryOutcome {
            operation,
            attempts: attempt,
            success: result.is_ok(),
            total_delay: start.elapsed(),
            last_error: result.as_ref().err().map(ToString::to_string),
        };
        outcome.log();
        result.map(|value| (value, outcome))
    }

    async fn next_delay(&self, attempt: u8) -> Duration {
        let mut rng = self.rng.lock().await;
        self.plan.delay_for_attempt(attempt, &mut *rng)
    }
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new(RetryPlan::default_plan())
    }
}
