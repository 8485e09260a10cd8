//! InfluxDB plugin: health check, database provisioning and metric writes
//! against an InfluxDB 1.x HTTP API.
//!
//! Incoming metrics are plain JSON objects; [`unpack::unpack_metric`]
//! sorts their keys into tags and fields and the result is written as
//! line protocol through a [`store::TimeSeriesStore`].

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod plugin;
pub mod series;
pub mod store;
pub mod unpack;

pub use error::{PluginError, StoreError};
pub use plugin::{Plugin, WriteSummary};
pub use series::{Precision, Scalar, Series};
