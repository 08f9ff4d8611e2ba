//! Topic metrics aggregation service.
//!
//! Collects streaming counters describing a message-queue topic's health
//! from monitor processes, derives rate, lag, and wait-time statistics,
//! and republishes raw and derived values to polling dashboard clients
//! over a newline-delimited text protocol.

pub mod clock;
pub mod config;
pub mod derive;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ServerConfig, TransformerSpec};
pub use derive::{CounterField, LagAggregator, RateEstimator, Transformer, WaitTimeEstimator};
pub use engine::MetricsEngine;
pub use error::{ConfigError, ProtocolError};
pub use protocol::{parse_request, Request, Response};
pub use server::MetricsServer;
pub use store::ValueStore;
