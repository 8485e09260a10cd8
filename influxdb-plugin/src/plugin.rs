//! The plugin: its load hook and the verbs it exposes to the host.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{PluginError, StoreError};
use crate::series::{Precision, Series};
use crate::store::TimeSeriesStore;
use crate::unpack::unpack_metric;

/// Outcome of the `write` verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Points accepted by the store.
    pub written: usize,
    /// Metrics that produced no writable series.
    pub skipped: usize,
}

pub struct Plugin {
    store: Arc<dyn TimeSeriesStore>,
    precision: Precision,
    auto_create_database: bool,
}

impl Plugin {
    /// Load hook: the plugin only comes up when the store answers its ping.
    pub async fn load(
        store: Arc<dyn TimeSeriesStore>,
        precision: Precision,
        auto_create_database: bool,
    ) -> Result<Self, PluginError> {
        if let Err(e) = store.ping().await {
            error!(error = %e, "InfluxDB not reachable, please start it");
            return Err(PluginError::Connectivity(e));
        }
        info!(database = store.database(), "influxdb plugin loaded");
        Ok(Self {
            store,
            precision,
            auto_create_database,
        })
    }

    pub fn database(&self) -> &str {
        self.store.database()
    }

    // ------------------------------------------------------------------ //
    //  Verbs                                                              //
    // ------------------------------------------------------------------ //

    pub async fn ping(&self) -> Result<(), PluginError> {
        match self.store.ping().await {
            Ok(()) => {
                info!("InfluxDB is up and running.");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "InfluxDB is offline.");
                Err(PluginError::Connectivity(e))
            }
        }
    }

    pub async fn create_database(&self) -> Result<(), PluginError> {
        match self.store.create_database().await {
            Ok(()) => {
                info!("Database '{}' created", self.database());
                Ok(())
            }
            Err(e) => {
                error!(error = %e, database = self.database(), "Can't create database.");
                Err(PluginError::Provisioning(e))
            }
        }
    }

    /// Unpack `payload` (one metric object, or an array of them) and write
    /// the resulting series.
    pub async fn write(&self, payload: &Value) -> Result<WriteSummary, PluginError> {
        let metrics = match payload {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        let (series, rejected): (Vec<Series>, Vec<Series>) = metrics
            .iter()
            .map(|m| unpack_metric(m, self.precision))
            .partition(|s| s.to_line_protocol().is_some());

        for s in &rejected {
            warn!(name = %s.name, "metric has no name or no field, skipped");
        }
        if series.is_empty() {
            return Err(PluginError::NothingToWrite);
        }

        let written = self.write_series(&series).await.map_err(|e| {
            error!(error = %e, database = self.database(), "write failed");
            PluginError::Write(e)
        })?;

        info!(written, skipped = rejected.len(), "metrics written");
        Ok(WriteSummary {
            written,
            skipped: rejected.len(),
        })
    }

    /// Write, provisioning the database first when the store reports it
    /// missing. Provisioning and the retried write each happen once.
    async fn write_series(&self, series: &[Series]) -> Result<usize, StoreError> {
        match self.store.write(series).await {
            Err(StoreError::DatabaseNotFound { database }) if self.auto_create_database => {
                warn!(%database, "database missing, creating it");
                self.store.create_database().await?;
                self.store.write(series).await
            }
            other => other,
        }
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
