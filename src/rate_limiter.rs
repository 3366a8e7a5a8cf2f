use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Client-side spacing of generative-AI calls.
///
/// Callers are serialized: each `acquire` waits until `min_interval` has
/// elapsed since the previous one. No queue or priority beyond the mutex.
#[derive(Debug)]
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next call slot and claim it.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::info!("Rate limiting: waiting {:.1}s before API call", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}
