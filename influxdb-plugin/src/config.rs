//! Plugin configuration.
//!
//! Layered with the `config` crate, later sources winning:
//! 1. built-in defaults
//! 2. `influxdb-plugin.toml` (or any supported format) in the working directory
//! 3. an explicit file passed to [`PluginCfg::load`]
//! 4. environment variables, e.g. `INFLUXDB_PLUGIN__INFLUX__HOST`

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    time::Duration,
};

use serde::Deserialize;

use crate::series::Precision;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PluginCfg {
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub influx: InfluxCfg,
    #[serde(default)]
    pub ingest: IngestCfg,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HttpCfg {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}
impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct InfluxCfg {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub precision: Precision,
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Provision the database and retry once when a write finds it missing.
    pub auto_create_database: bool,
}
impl Default for InfluxCfg {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8086,
            database: "agl-collector".into(),
            precision: Precision::Ns,
            timeout_ms: 5000,
            connect_timeout_ms: 2000,
            auto_create_database: true,
        }
    }
}

impl InfluxCfg {
    /// Base URL of the InfluxDB HTTP API. A host given with a scheme is
    /// used as-is.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.contains("://") {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct IngestCfg {
    /// Upper bound for an inbound payload and for one `/write` body.
    pub max_request_bytes: usize,
}
impl Default for IngestCfg {
    fn default() -> Self {
        Self {
            max_request_bytes: 1_000_000,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1234)
}

impl PluginCfg {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::from_builder(build_config(path, None)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.influx.host.is_empty(), "influx.host cannot be empty");
        anyhow::ensure!(self.influx.port != 0, "influx.port cannot be 0");
        anyhow::ensure!(
            !self.influx.database.is_empty(),
            "influx.database cannot be empty"
        );
        anyhow::ensure!(
            self.ingest.max_request_bytes > 0,
            "ingest.max_request_bytes must be positive"
        );
        Ok(())
    }

    fn from_builder(cfg: config::Config) -> anyhow::Result<Self> {
        Ok(cfg.try_deserialize()?)
    }
}

fn build_config(
    path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> anyhow::Result<config::Config> {
    use config::{Config, Environment, File};
    let mut builder =
        Config::builder().add_source(File::with_name("influxdb-plugin").required(false));
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(
        Environment::with_prefix("INFLUXDB_PLUGIN")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );
    Ok(builder.build()?)
}
