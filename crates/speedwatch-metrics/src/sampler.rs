//! Measurement loop, the only caller of the probe.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use speedwatch_core::config::RetryBackoffConfig;
use speedwatch_core::{Measurement, MeasurementResult};
use speedwatch_probe::{Probe, ProbeResult};

use crate::mailbox::Publisher;

/// What to do between a failed cycle and the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Start the next cycle right away.
    #[default]
    Immediate,
    /// Double the pause after each consecutive failure, up to `max`.
    Backoff {
        initial: Duration,
        max: Duration,
        next: Duration,
    },
}

impl RetryPolicy {
    pub fn backoff(initial: Duration, max: Duration) -> Self {
        RetryPolicy::Backoff {
            initial,
            max,
            next: initial,
        }
    }

    pub fn from_config(config: Option<RetryBackoffConfig>) -> Self {
        match config {
            Some(c) => Self::backoff(c.initial.get(), c.max.get()),
            None => RetryPolicy::Immediate,
        }
    }

    /// Pause before the retry that follows a failure.
    pub fn on_failure(&mut self) -> Duration {
        match self {
            RetryPolicy::Immediate => Duration::ZERO,
            RetryPolicy::Backoff { max, next, .. } => {
                let delay = *next;
                *next = (*next * 2).min(*max);
                delay
            }
        }
    }

    pub fn on_success(&mut self) {
        if let RetryPolicy::Backoff { initial, next, .. } = self {
            *next = *initial;
        }
    }
}

/// Runs measurement cycles and hands successful results to the collector.
pub struct Sampler<P: Probe> {
    probe: P,
    publisher: Publisher<Measurement>,
    interval: Duration,
    retry: RetryPolicy,
}

impl<P: Probe> Sampler<P> {
    pub fn new(probe: P, publisher: Publisher<Measurement>, interval: Duration) -> Self {
        Self {
            probe,
            publisher,
            interval,
            retry: RetryPolicy::Immediate,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one full cycle without publishing.
    ///
    /// Steps run strictly in order and the first failure aborts the cycle.
    pub async fn run_cycle(&self) -> ProbeResult<MeasurementResult> {
        let target = self.probe.discover().await?;
        debug!(?target, "measurement target selected");

        let latency = self.probe.ping(&target).await?;
        debug!(?latency, "ping finished");

        let download_rate = self.probe.download(&target).await?;
        debug!(download_rate, "download finished");

        let upload_rate = self.probe.upload(&target).await?;
        debug!(upload_rate, "upload finished");

        Ok(MeasurementResult::new(latency, download_rate, upload_rate))
    }

    /// Run one cycle and publish it if it succeeded.
    ///
    /// Returns the pause to take before the next cycle.
    pub async fn sample_once(&mut self) -> Duration {
        match self.run_cycle().await {
            Ok(result) => {
                self.retry.on_success();
                info!(
                    latency_ms = result.latency.as_secs_f64() * 1000.0,
                    download_rate = result.download_rate,
                    upload_rate = result.upload_rate,
                    "measurement cycle succeeded"
                );
                self.publisher.publish(Measurement::now(result));
                self.interval
            }
            Err(e) => {
                let retry_in = self.retry.on_failure();
                warn!(stage = %e.stage(), error = %e, ?retry_in, "measurement cycle failed");
                retry_in
            }
        }
    }

    /// Run cycles until shutdown signal.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            retry = ?self.retry,
            "sampler started"
        );

        loop {
            let pause = tokio::select! {
                pause = self.sample_once() => pause,
                _ = shutdown.changed() => {
                    info!("sampler shutting down mid-cycle");
                    break;
                }
            };

            if pause.is_zero() {
                // Immediate retry still has to let other tasks run.
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => {
                    info!("sampler shutting down");
                    break;
                }
            }
        }
    }
}
