use std::time::Duration;

use tracing::Level;
use tracing::event;

use super::OperationKind;

/// Summary of one retried operation, logged once it finishes.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub operation: OperationKind,
    pub attempts: u8,
    pub success: bool,
    pub total_delay: Duration,
    pub last_error: Option<String>,
}

impl RetryOutcome {
    pub fn log(&self) {
        if self.success {
            event!(
                Level::INFO,
                operation = %self.operation,
                attempts = self.attempts,
                total_delay_ms = self.total_delay.as_millis() as u64,
                "retry.outcome"
            );
        } else {
            event!(
                Level::WARN,
                operation = %self.operation,
                attempts = self.attempts,
                total_delay_ms = self.total_delay.as_millis() as u64,
                error = self.last_error.as_deref().unwrap_or("unknown"),
                "retry.outcome"
            );
        }
    }
}
