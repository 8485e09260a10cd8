//! InfluxDB plugin host.
//!
//! Loads the plugin against the configured InfluxDB instance and exposes its
//! verbs over HTTP on `http.bind` (default `127.0.0.1:1234`).
//!
//! # Configuration
//! | Source                                   | Example                              |
//! |------------------------------------------|--------------------------------------|
//! | `influxdb-plugin.toml` in the working dir | `[influx] host = "tsdb.local"`       |
//! | file named by `INFLUXDB_PLUGIN_CONFIG`    | `/etc/influxdb-plugin.toml`          |
//! | environment                              | `INFLUXDB_PLUGIN__INFLUX__PORT=8086` |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use influxdb_plugin::client::InfluxClient;
use influxdb_plugin::config::PluginCfg;
use influxdb_plugin::handlers::{self, AppState};
use influxdb_plugin::Plugin;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("influxdb_plugin=info".parse()?),
        )
        .json()
        .init();

    let cfg_path = std::env::var_os("INFLUXDB_PLUGIN_CONFIG").map(PathBuf::from);
    let cfg = PluginCfg::load(cfg_path.as_deref())?;
    cfg.validate()?;

    let client = InfluxClient::new(&cfg.influx, cfg.ingest.max_request_bytes)?;
    info!(
        url = client.base_url(),
        database = %cfg.influx.database,
        "connecting to InfluxDB"
    );

    let plugin = Plugin::load(
        Arc::new(client),
        cfg.influx.precision,
        cfg.influx.auto_create_database,
    )
    .await?;

    let state = Arc::new(AppState { plugin });
    let app = handlers::router(state, cfg.ingest.max_request_bytes);

    let listener = tokio::net::TcpListener::bind(cfg.http.bind).await?;
    info!(addr = %cfg.http.bind, "influxdb-plugin listening");

    axum::serve(listener, app).await?;

    Ok(())
}
