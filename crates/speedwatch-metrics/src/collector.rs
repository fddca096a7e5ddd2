//! Scrape-side collector.
//!
//! Answers every scrape within `handoff_wait`, whatever the sampler is
//! doing: a fresh measurement if one is handed off in time, otherwise the
//! last reported one (all-zero until the first success).

use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tracing::debug;

use speedwatch_core::{Measurement, MeasurementResult};

use crate::mailbox::{self, Mailbox};

/// The most recently reported measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LastKnown {
    pub result: MeasurementResult,
    /// `None` until a measurement has been reported.
    pub measured_at: Option<SystemTime>,
}

impl From<Measurement> for LastKnown {
    fn from(m: Measurement) -> Self {
        Self {
            result: m.result,
            measured_at: Some(m.completed_at),
        }
    }
}

/// What one scrape reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub result: MeasurementResult,
    pub measured_at: Option<SystemTime>,
    /// Wall-clock time of the collection request.
    pub scraped_at: SystemTime,
    /// Whether `result` was handed off during this scrape.
    pub fresh: bool,
}

impl Snapshot {
    /// Time between the measurement and this scrape.
    pub fn age(&self) -> Option<Duration> {
        let measured_at = self.measured_at?;
        Some(
            self.scraped_at
                .duration_since(measured_at)
                .unwrap_or_default(),
        )
    }
}

/// Consumer side of the sampler hand-off.
///
/// Safe to share across concurrent scrapes (`Arc<SpeedCollector>`).
#[derive(Debug)]
pub struct SpeedCollector {
    mailbox: Mutex<Mailbox<Measurement>>,
    last_known: Mutex<LastKnown>,
    handoff_wait: Duration,
}

impl SpeedCollector {
    pub fn new(mailbox: Mailbox<Measurement>, handoff_wait: Duration) -> Self {
        Self {
            mailbox: Mutex::new(mailbox),
            last_known: Mutex::new(LastKnown::default()),
            handoff_wait,
        }
    }

    pub fn handoff_wait(&self) -> Duration {
        self.handoff_wait
    }

    /// Collect the current snapshot. Never fails, never waits past
    /// `handoff_wait`.
    ///
    /// Overlapping scrapes take turns on the mailbox; one that cannot get
    /// it before its own deadline reports the last known value.
    pub async fn collect(&self) -> Snapshot {
        let deadline = mailbox::deadline_after(self.handoff_wait);

        // LastKnown is written before the mailbox is released, so hand-offs
        // land in the order they were taken.
        let slot = tokio::time::timeout_at(deadline, self.mailbox.lock()).await;
        let (reported, fresh) = match slot {
            Ok(mut slot) => {
                let handed_off = slot.recv_until(deadline).await;
                let mut last_known = self.last_known.lock().await;
                if let Some(measurement) = handed_off {
                    *last_known = LastKnown::from(measurement);
                }
                (*last_known, handed_off.is_some())
            }
            Err(_) => {
                debug!("mailbox held by a concurrent scrape, reporting last known");
                (*self.last_known.lock().await, false)
            }
        };

        debug!(
            fresh,
            latency_ns = reported.result.latency_nanos(),
            download_rate = reported.result.download_rate,
            upload_rate = reported.result.upload_rate,
            "scrape collected"
        );

        Snapshot {
            result: reported.result,
            measured_at: reported.measured_at,
            scraped_at: SystemTime::now(),
            fresh,
        }
    }

    /// Current LastKnown, without touching the mailbox.
    pub async fn last_known(&self) -> LastKnown {
        *self.last_known.lock().await
    }
}
