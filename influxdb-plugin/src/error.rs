//! Error types.

use thiserror::Error;

/// Failure reported by a [`TimeSeriesStore`](crate::store::TimeSeriesStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("ping answered HTTP {status}, expected 204")]
    PingStatus { status: u16 },
    #[error("can't create database '{database}': {reason}")]
    Provisioning { database: String, reason: String },
    #[error("database '{database}' not found")]
    DatabaseNotFound { database: String },
    #[error("write to database '{database}' rejected with HTTP {status}: {body}")]
    WriteRejected {
        database: String,
        status: u16,
        body: String,
    },
    #[error("a single point needs {size} bytes but the request limit is {limit}")]
    PointTooLarge { size: usize, limit: usize },
    #[error("store is offline")]
    Offline,
}

/// Failure of a plugin verb, one variant per failure class the host sees.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("InfluxDB is offline")]
    Connectivity(#[source] StoreError),
    #[error("can't create database")]
    Provisioning(#[source] StoreError),
    #[error("write failed")]
    Write(#[source] StoreError),
    #[error("payload holds no writable series")]
    NothingToWrite,
}

impl PluginError {
    /// Error message followed by its whole source chain.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}
