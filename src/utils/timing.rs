use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

pub const TIMING_TARGET: &str = "plant_id.timing";

/// Tracks one identification run from image handle to terminal state.
#[derive(Debug)]
pub struct RunTimer {
    run_id: String,
    image: String,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    completed: bool,
}

impl RunTimer {
    pub fn start(image: &str) -> Self {
        let timer = RunTimer {
            run_id: uuid::Uuid::new_v4().to_string(),
            image: image.to_string(),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            completed: false,
        };
        info!(
            target: TIMING_TARGET,
            "event=run_started run_id={} image={:?} started_at={}",
            timer.run_id,
            timer.image,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn transition(&self, state: impl Display) {
        debug!(
            run_id = %self.run_id,
            elapsed_s = self.started_perf.elapsed().as_secs_f64(),
            "Identification entered state {}",
            state
        );
    }

    pub fn complete(&mut self, state: impl Display, detail: &str) {
        if self.completed {
            return;
        }
        self.completed = true;
        info!(
            target: TIMING_TARGET,
            "event=run_completed run_id={} image={:?} started_at={} completed_at={} duration_s={:.3} state={} detail={}",
            self.run_id,
            self.image,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            self.started_perf.elapsed().as_secs_f64(),
            state,
            detail
        );
    }
}

/// Wraps one external call with request/response timing lines.
pub async fn log_call_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        "event=request provider={} model={} operation={} started_at={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339()
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    info!(
        target: TIMING_TARGET,
        "event=response provider={} model={} operation={} completed_at={} duration_s={:.3} status={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
        status
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_results_through() {
        let ok: Result<u8, String> = log_call_timing("p", "m", "op", || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: Result<u8, String> =
            log_call_timing("p", "m", "op", || async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }

    #[test]
    fn completes_once() {
        let mut timer = RunTimer::start("leaf.jpg");
        assert!(!timer.run_id().is_empty());
        timer.complete("Done", "first");
        timer.complete("Failed", "second");
        assert!(timer.completed);
    }
}
