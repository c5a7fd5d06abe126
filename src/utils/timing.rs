use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "studio.timing";

/// Measures one wizard action from the moment the update arrives until its
/// handler returns. The completion line is written once, at the latest on drop.
#[derive(Debug)]
pub struct ActionTimer {
    action: String,
    chat_id: i64,
    step: &'static str,
    received_at: DateTime<Utc>,
    clock: Instant,
    outcome: &'static str,
    detail: Option<String>,
    finished: bool,
}

impl ActionTimer {
    pub fn new(action: &str, chat_id: i64, step: &'static str) -> Self {
        ActionTimer {
            action: action.to_string(),
            chat_id,
            step,
            received_at: Utc::now(),
            clock: Instant::now(),
            outcome: "success",
            detail: None,
            finished: false,
        }
    }

    pub fn mark_status(&mut self, outcome: &'static str, detail: Option<String>) {
        self.outcome = outcome;
        self.detail = detail;
    }

    pub fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        info!(
            target: TIMING_TARGET,
            event = "action_completed",
            action = %self.action,
            chat_id = self.chat_id,
            step = self.step,
            received_at = %self.received_at.to_rfc3339(),
            duration_ms = self.clock.elapsed().as_millis() as u64,
            outcome = self.outcome,
            detail = self.detail.as_deref().unwrap_or(""),
        );
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        self.finish();
    }
}

pub fn start_action_timer(action: &str, chat_id: i64, step: &'static str) -> ActionTimer {
    let timer = ActionTimer::new(action, chat_id, step);
    info!(
        target: TIMING_TARGET,
        event = "action_received",
        action = %timer.action,
        chat_id,
        step,
    );
    timer
}

/// Wraps one call to the generation service with request/response timing lines.
/// `metadata` is logged as compact JSON next to both lines.
pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let metadata = metadata.unwrap_or(JsonValue::Null);
    let clock = Instant::now();
    info!(
        target: TIMING_TARGET,
        event = "llm_request",
        provider,
        model,
        operation,
        metadata = %metadata,
    );

    let result = call().await;

    info!(
        target: TIMING_TARGET,
        event = "llm_response",
        provider,
        model,
        operation,
        duration_ms = clock.elapsed().as_millis() as u64,
        outcome = if result.is_ok() { "success" } else { "error" },
        metadata = %metadata,
    );
    result
}
