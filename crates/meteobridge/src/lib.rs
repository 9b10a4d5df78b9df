//! MeteoBridge Telemetry Bridge
//!
//! Polls a MeteoBridge weather-station gateway over TCP, parses its XML
//! sensor report, derives the quantities the gateway does not report,
//! converts everything to the configured measurement system and publishes
//! one driver update per active channel.
//!
//! # Architecture
//!
//! ```text
//! long tick ──► fetch ──► parse ──► compute ──► UnitSink ──► DriverPublisher
//!                 │          │         │            │
//!                 │ TCP/XML  │ records │ derived    │ convert, round, slot
//!                 │          │         │ rain totals│
//!                 │          │         │ p. trend   │
//!                 └──────────┴─────────┴────────────┘
//! ```
//!
//! # Modules
//!
//! - [`accumulation`]: Rain totals per calendar period.
//! - [`config`]: YAML configuration and the validated poll configuration.
//! - [`derived`]: Dewpoint, wind chill, heat index, sea-level pressure, trend.
//! - [`error`]: Unified error type.
//! - [`fetch`]: One request/response exchange with the gateway.
//! - [`node`]: Zenoh session, health heartbeat and driver publisher.
//! - [`parser`]: Sensor records from the gateway's XML document.
//! - [`poller`]: The poll cycle and its timer loop.
//! - [`profile`]: ISY node definitions for the active channels.
//! - [`sink`]: Unit conversion, rounding and driver updates.
//! - [`units`]: Categories, channel templates and units of measure.

pub mod accumulation;
pub mod config;
pub mod derived;
pub mod error;
pub mod fetch;
pub mod node;
pub mod parser;
pub mod poller;
pub mod profile;
pub mod sink;
pub mod units;

pub use config::{Config, DeviceConfig, PollConfig};
pub use error::{Error, Result};
pub use poller::{CycleOutcome, CycleState, Poller};
pub use sink::{DriverPublisher, DriverUpdate, SensorReading};
pub use units::{Category, MeasurementSystem, Uom};
