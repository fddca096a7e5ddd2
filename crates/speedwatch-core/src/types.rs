//! Measurement types shared by the probe, the sampler and the collector.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Outcome of one complete measurement cycle.
///
/// Always produced as a unit: latency and both rates come from the same
/// cycle. Rates are in bytes per second. `Default` is all-zero and is what
/// a scrape reports before the first cycle succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeasurementResult {
    #[serde(rename = "latency_ns", serialize_with = "serialize_nanos")]
    pub latency: Duration,
    pub download_rate: f64,
    pub upload_rate: f64,
}

impl MeasurementResult {
    pub fn new(latency: Duration, download_rate: f64, upload_rate: f64) -> Self {
        Self {
            latency,
            download_rate,
            upload_rate,
        }
    }

    /// Latency in nanoseconds, the unit the `latency` gauge is exported in.
    pub fn latency_nanos(&self) -> f64 {
        self.latency.as_nanos() as f64
    }
}

/// A successful cycle's result, stamped with its completion time.
///
/// This is the value that travels through the hand-off mailbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub result: MeasurementResult,
    pub completed_at: SystemTime,
}

impl Measurement {
    pub fn new(result: MeasurementResult, completed_at: SystemTime) -> Self {
        Self {
            result,
            completed_at,
        }
    }

    /// Stamp a result with the current wall-clock time.
    pub fn now(result: MeasurementResult) -> Self {
        Self::new(result, SystemTime::now())
    }
}

/// Milliseconds since the Unix epoch, zero for earlier instants.
pub fn epoch_millis(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn serialize_nanos<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}
