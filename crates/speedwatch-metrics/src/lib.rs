//! speedwatch-metrics — decouples slow network measurement from fast scrapes.
//!
//! # Architecture
//!
//! ```text
//! Sampler (background task)                SpeedCollector (per scrape)
//!   loop {                                   collect()
//!     discover → ping → download → upload      ├── wait ≤ handoff_wait on Mailbox
//!     ok  → Publisher::publish ──────────────▶ │     fresh → overwrite LastKnown
//!     err → retry (immediately by default)     │     none  → keep LastKnown
//!     sleep(interval)                          └── Snapshot → render_prometheus()
//!   }
//! ```
//!
//! The mailbox holds at most one pending [`Measurement`]; publishing never
//! blocks and replaces whatever the collector has not picked up yet.
//!
//! [`Measurement`]: speedwatch_core::Measurement

pub mod collector;
pub mod mailbox;
pub mod prometheus;
pub mod sampler;

pub use collector::{LastKnown, Snapshot, SpeedCollector};
pub use mailbox::{Mailbox, Publisher};
pub use prometheus::{CONTENT_TYPE, Gauge, gauges, render_prometheus};
pub use sampler::{RetryPolicy, Sampler};
