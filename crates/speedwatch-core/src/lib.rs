//! speedwatch-core — types and configuration shared by the speedwatch crates.

pub mod config;
pub mod duration;
pub mod types;

pub use config::{ConfigError, SpeedwatchConfig};
pub use duration::{HumanDuration, parse_duration};
pub use types::*;
