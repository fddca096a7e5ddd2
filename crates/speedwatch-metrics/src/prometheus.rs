//! Prometheus text exposition format.
//!
//! Renders a collector [`Snapshot`] as timestamped, label-free gauges:
//!
//! | Metric | Unit |
//! |---|---|
//! | `latency` | nanoseconds |
//! | `download_speed` | bytes per second |
//! | `upload_speed` | bytes per second |
//! | `measurement_age_seconds` | seconds (opt-in) |

use std::fmt::Write;

use speedwatch_core::config::{ExpositionConfig, TimestampSource};
use speedwatch_core::epoch_millis;

use crate::collector::Snapshot;

/// Content type for the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// One gauge sample ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub name: &'static str,
    pub help: &'static str,
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Turn a snapshot into gauges according to the exposition settings.
pub fn gauges(snapshot: &Snapshot, options: &ExpositionConfig) -> Vec<Gauge> {
    // Before the first measurement there is no measurement time to use.
    let stamped_at = match options.timestamp {
        TimestampSource::Scrape => snapshot.scraped_at,
        TimestampSource::Measurement => snapshot.measured_at.unwrap_or(snapshot.scraped_at),
    };
    let timestamp_ms = epoch_millis(stamped_at);

    let mut out = vec![
        Gauge {
            name: "latency",
            help: "Measured latency in nanoseconds.",
            value: snapshot.result.latency_nanos(),
            timestamp_ms,
        },
        Gauge {
            name: "download_speed",
            help: "Measured download speed in bytes per second.",
            value: snapshot.result.download_rate,
            timestamp_ms,
        },
        Gauge {
            name: "upload_speed",
            help: "Measured upload speed in bytes per second.",
            value: snapshot.result.upload_rate,
            timestamp_ms,
        },
    ];

    if options.staleness_gauge {
        if let Some(age) = snapshot.age() {
            out.push(Gauge {
                name: "measurement_age_seconds",
                help: "Seconds since the reported measurement completed.",
                value: age.as_secs_f64(),
                timestamp_ms: epoch_millis(snapshot.scraped_at),
            });
        }
    }

    out
}

/// Render a snapshot into Prometheus text format.
pub fn render_prometheus(snapshot: &Snapshot, options: &ExpositionConfig) -> String {
    let mut out = String::new();
    for gauge in gauges(snapshot, options) {
        let _ = writeln!(out, "# HELP {} {}", gauge.name, gauge.help);
        let _ = writeln!(out, "# TYPE {} gauge", gauge.name);
        let _ = writeln!(
            out,
            "{} {} {}",
            gauge.name,
            format_value(gauge.value),
            gauge.timestamp_ms
        );
    }
    out
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}
