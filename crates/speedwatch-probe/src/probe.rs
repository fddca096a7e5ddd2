//! The measurement collaborator seam.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::error::ProbeResult;

/// One network measurement backend.
///
/// A cycle calls `discover` once and then `ping`, `download` and `upload`
/// in that order against the discovered target. Implementations do not
/// retry internally; the sampler owns the retry policy.
pub trait Probe: Send + Sync {
    /// A selected measurement endpoint, valid for one cycle.
    type Target: Debug + Send + Sync;

    /// Select the target for this cycle.
    fn discover(&self) -> impl Future<Output = ProbeResult<Self::Target>> + Send;

    /// Round-trip latency to the target.
    fn ping(&self, target: &Self::Target) -> impl Future<Output = ProbeResult<Duration>> + Send;

    /// Download throughput in bytes per second.
    fn download(&self, target: &Self::Target) -> impl Future<Output = ProbeResult<f64>> + Send;

    /// Upload throughput in bytes per second.
    fn upload(&self, target: &Self::Target) -> impl Future<Output = ProbeResult<f64>> + Send;
}
