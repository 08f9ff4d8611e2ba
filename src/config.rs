//! Service configuration.
//!
//! Loaded from an optional TOML file with environment-variable overrides
//! for the bind address and port. The defaults reproduce the deployed
//! setup: port 9999 on all interfaces, with the `offsets` metric feeding
//! message-in/out rates, lag aggregation, and wait-time estimation.
//!
//! ```toml
//! bind_addr = "0.0.0.0"
//! port = 9999
//!
//! [[derived.offsets]]
//! kind = "rate"
//! name = "msgsin"
//! field = "tail"
//!
//! [[derived.offsets]]
//! kind = "lag"
//! name = "lags"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::clock::Clock;
use crate::derive::{CounterField, LagAggregator, RateEstimator, WaitTimeEstimator};
use crate::engine::MetricsEngine;
use crate::error::ConfigError;

/// Environment variables recognized as overrides.
pub const ENV_CONFIG_PATH: &str = "TOPIC_METRICS_CONFIG";
pub const ENV_BIND_ADDR: &str = "TOPIC_METRICS_BIND";
pub const ENV_PORT: &str = "TOPIC_METRICS_PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Raw metric name -> transformers invoked when it is set.
    pub derived: BTreeMap<String, Vec<TransformerSpec>>,
}

/// Wiring for one derived transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerSpec {
    /// Per-second + one-minute rate over a partition counter field.
    Rate { name: String, field: String },
    /// Min/max/mean/count over per-partition lag.
    Lag { name: String },
    /// Offset-interpolated consumer wait time.
    WaitTime { name: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        let offsets = vec![
            TransformerSpec::Rate {
                name: "msgsin".to_string(),
                field: "tail".to_string(),
            },
            TransformerSpec::Rate {
                name: "msgsout".to_string(),
                field: "committed".to_string(),
            },
            TransformerSpec::Lag {
                name: "lags".to_string(),
            },
            TransformerSpec::WaitTime {
                name: "wait_time".to_string(),
            },
        ];
        let mut derived = BTreeMap::new();
        derived.insert("offsets".to_string(), offsets);

        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 9999,
            derived,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => ServerConfig::default(),
        };

        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            config.bind_addr = addr;
        }
        if let Some(port) = std::env::var(ENV_PORT).ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject wiring that could only fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (metric, specs) in &self.derived {
            for spec in specs {
                if let TransformerSpec::Rate { field, .. } = spec {
                    if CounterField::parse(field).is_none() {
                        return Err(ConfigError::UnknownCounterField {
                            metric: metric.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Build the shared engine with every configured transformer wired up.
    pub fn build_engine(&self, clock: Arc<dyn Clock>) -> Result<MetricsEngine, ConfigError> {
        let mut engine = MetricsEngine::new(clock);
        for (metric, specs) in &self.derived {
            for spec in specs {
                match spec {
                    TransformerSpec::Rate { name, field } => {
                        let field = CounterField::parse(field).ok_or_else(|| {
                            ConfigError::UnknownCounterField {
                                metric: metric.clone(),
                                field: field.clone(),
                            }
                        })?;
                        engine.register(metric.clone(), Box::new(RateEstimator::new(name, field)));
                    }
                    TransformerSpec::Lag { name } => {
                        engine.register(metric.clone(), Box::new(LagAggregator::new(name)));
                    }
                    TransformerSpec::WaitTime { name } => {
                        engine.register(metric.clone(), Box::new(WaitTimeEstimator::new(name)));
                    }
                }
            }
        }
        Ok(engine)
    }
}
