//! Pacing and retry around generation calls.
//!
//! Each writer gets a gate: calls for the same writer run one at a time and
//! never closer together than the configured spacing. Transient failures are
//! retried with exponential backoff; everything else is returned at once so
//! the caller can fall back.

use crate::config::ThrottleConfig;
use crate::generation::{GenerationError, GenerationRequest, TextGenerator};
use crate::store::WriterId;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

type Gate = Arc<tokio::sync::Mutex<Option<Instant>>>;

/// Per-writer pacing plus retry policy.
pub struct Throttle {
    config: ThrottleConfig,
    gates: Mutex<HashMap<WriterId, Gate>>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn gate(&self, writer: &WriterId) -> Gate {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates.entry(writer.clone()).or_default().clone()
    }

    /// Delay before retry number `attempt` (1-based), with up to 25% jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base = self
            .config
            .base_backoff_ms
            .saturating_mul(exp)
            .min(self.config.max_backoff_ms);
        let jitter = if base >= 4 {
            rand::thread_rng().gen_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter).min(self.config.max_backoff_ms.max(base)))
    }

    /// Run `call` under the writer's gate with pacing and retries.
    pub async fn run<T, F, Fut>(&self, writer: &WriterId, mut call: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let gate = self.gate(writer);
        let mut last_call = gate.lock().await;
        let spacing = self.config.min_spacing();
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;

            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < spacing {
                    let wait = spacing - elapsed;
                    debug!(writer = %writer, wait_ms = wait.as_millis() as u64, "pacing generation call");
                    sleep(wait).await;
                }
            }
            *last_call = Some(Instant::now());

            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        writer = %writer,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient generation failure, retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(writer = %writer, attempt, error = %err, "retry budget exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// A generator whose calls go through a [`Throttle`].
#[derive(Clone)]
pub struct ThrottledGenerator {
    generator: Arc<dyn TextGenerator>,
    throttle: Arc<Throttle>,
}

impl ThrottledGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, throttle: Arc<Throttle>) -> Self {
        Self {
            generator,
            throttle,
        }
    }

    pub async fn generate(
        &self,
        writer: &WriterId,
        request: GenerationRequest,
    ) -> Result<String, GenerationError> {
        let generator = &self.generator;
        self.throttle
            .run(writer, || generator.generate(request.clone()))
            .await
    }
}
