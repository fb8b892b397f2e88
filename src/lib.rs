//! Emissionwatch - carbon-emission monitoring agent for industrial
//! air-quality sensors.
//!
//! The agent ingests one sensor sample per period (21 pollutant and
//! meteorological channels), predicts a carbon-emission scalar with a
//! pre-trained regression model, appends every sample to an append-only CSV
//! log, and sends an SMS alert when predicted emissions stay above the alert
//! threshold for a full run of consecutive cycles.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        emissionwatch                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌─────────┐  │
//! │  │  Sample  │──▶│ Normalizer │──▶│  Model  │──▶│ Tracker │  │
//! │  │  Source  │   │ (defaults) │   │ (linear)│   │ (runs)  │  │
//! │  └──────────┘   └────────────┘   └─────────┘   └────┬────┘  │
//! │       │                                             ▼       │
//! │  ┌──────────┐                                  ┌─────────┐  │
//! │  │  Sensor  │◀──────── append-only ──────────  │  Alert  │  │
//! │  │   Log    │──▶ /live-data, /trend            │  (SMS)  │  │
//! │  └──────────┘                                  └─────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stream loop ([`monitor::Monitor`]) is the sole writer of the log and
//! the tracker state; the HTTP handlers in [`server`] only read.

pub mod alert;
pub mod config;
pub mod features;
pub mod generator;
pub mod model;
pub mod monitor;
pub mod schema;
pub mod sensor_log;
pub mod server;
pub mod tracker;

// Re-export key types at crate root for convenience
pub use alert::{AlertDispatcher, DispatchError, MemoryDispatcher, TwilioClient, TwilioConfig};
pub use config::{Config, ConfigError};
pub use features::{normalize, normalize_series, FeatureVector, FEATURE_COUNT};
pub use generator::{SampleSource, SyntheticSensor};
pub use model::{EmissionModel, ModelArtifact, ModelError, Predictor};
pub use monitor::Monitor;
pub use schema::{Channel, Sample};
pub use sensor_log::{LogError, SensorLog};
pub use tracker::{ExceedanceTracker, GasLimitBank};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
