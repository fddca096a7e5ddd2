//! speedwatch-probe — active network measurement.
//!
//! A measurement cycle runs four steps against one selected target:
//!
//! ```text
//! discover() → Target     lowest TCP connect time among candidates
//! ping(&Target)           minimum HTTP round trip over N requests
//! download(&Target)       bytes/sec streaming a GET body
//! upload(&Target)         bytes/sec for a POST of a fixed payload
//! ```
//!
//! The [`Probe`] trait is the seam the sampler drives; [`HttpProbe`] is the
//! production implementation over plain HTTP/1.1 (hyper).

pub mod error;
pub mod http_probe;
pub mod probe;

pub use error::{ProbeError, ProbeResult, Stage};
pub use http_probe::{HttpProbe, HttpTarget};
pub use probe::Probe;
