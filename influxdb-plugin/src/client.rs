//! InfluxDB 1.x HTTP API client.

use std::mem;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::InfluxCfg;
use crate::error::StoreError;
use crate::series::{Precision, Series};
use crate::store::TimeSeriesStore;

/// Thin wrapper around a [`reqwest::Client`] bound to one InfluxDB
/// instance and database.
pub struct InfluxClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    precision: Precision,
    max_request_bytes: usize,
}

impl InfluxClient {
    /// Build a client from the `[influx]` section. `max_request_bytes`
    /// bounds every `/write` body.
    pub fn new(cfg: &InfluxCfg, max_request_bytes: usize) -> Result<Self, StoreError> {
        let base_url = cfg.base_url();
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(cfg.connect_timeout())
            .build()
            .map_err(|source| StoreError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base_url,
            database: cfg.database.clone(),
            precision: cfg.precision,
            max_request_bytes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(
        &self,
        url: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), StoreError> {
        let transport = |source| StoreError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;
        Ok((status, body))
    }

    // ------------------------------------------------------------------ //
    //  Write                                                              //
    // ------------------------------------------------------------------ //

    async fn post_write(&self, body: String) -> Result<(), StoreError> {
        let url = self.endpoint("write");
        let req = self.http.post(&url).query(&[
            ("db", self.database.as_str()),
            ("precision", self.precision.as_str()),
        ]);
        let (status, text) = self.send(&url, req.body(body)).await?;

        match status {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND if text.contains("database not found") => {
                Err(StoreError::DatabaseNotFound {
                    database: self.database.clone(),
                })
            }
            other => Err(StoreError::WriteRejected {
                database: self.database.clone(),
                status: other.as_u16(),
                body: error_message(&text),
            }),
        }
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxClient {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let url = self.endpoint("ping");
        let (status, _) = self.send(&url, self.http.get(&url)).await?;
        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(StoreError::PingStatus {
                status: status.as_u16(),
            })
        }
    }

    async fn create_database(&self) -> Result<(), StoreError> {
        let url = self.endpoint("query");
        let statement = format!("CREATE DATABASE \"{}\"", quote_ident(&self.database));
        let req = self
            .http
            .post(&url)
            .query(&[("db", self.database.as_str())])
            .form(&[("q", statement.as_str())]);
        let (status, body) = self.send(&url, req).await?;

        if status != StatusCode::OK {
            return Err(StoreError::Provisioning {
                database: self.database.clone(),
                reason: format!("HTTP {}: {}", status.as_u16(), error_message(&body)),
            });
        }

        match statement_error(&body) {
            Some(e) if e.contains("already exists") => {
                debug!(database = %self.database, "database already exists");
                Ok(())
            }
            Some(e) => Err(StoreError::Provisioning {
                database: self.database.clone(),
                reason: e,
            }),
            None => {
                info!(database = %self.database, "CREATE DATABASE accepted");
                Ok(())
            }
        }
    }

    async fn write(&self, series: &[Series]) -> Result<usize, StoreError> {
        let lines: Vec<String> = series.iter().filter_map(Series::to_line_protocol).collect();
        let bodies = pack_lines(&lines, self.max_request_bytes)?;
        let requests = bodies.len();

        // Bodies already sent stay written if a later one fails.
        for body in bodies {
            self.post_write(body).await?;
        }

        debug!(points = lines.len(), requests, "write complete");
        Ok(lines.len())
    }
}

// ------------------------------------------------------------------ //
//  Helpers                                                            //
// ------------------------------------------------------------------ //

/// Escape an identifier for use inside double quotes in InfluxQL.
fn quote_ident(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Join lines into newline-separated bodies of at most `limit` bytes.
fn pack_lines(lines: &[String], limit: usize) -> Result<Vec<String>, StoreError> {
    let mut bodies = Vec::new();
    let mut current = String::new();

    for line in lines {
        if line.len() > limit {
            return Err(StoreError::PointTooLarge {
                size: line.len(),
                limit,
            });
        }
        if !current.is_empty() && current.len() + 1 + line.len() > limit {
            bodies.push(mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        bodies.push(current);
    }
    Ok(bodies)
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatementResult {
    error: Option<String>,
}

/// First error carried by a `/query` response body, if any.
fn statement_error(body: &str) -> Option<String> {
    let resp: QueryResponse = serde_json::from_str(body).ok()?;
    resp.error.or_else(|| resp.results.into_iter().find_map(|r| r.error))
}

/// `{"error": "..."}` bodies are reduced to their message.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.error,
        Err(_) => body.trim().to_string(),
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn packs_everything_into_one_body_when_it_fits() {
        let bodies = pack_lines(&lines(&["a v=1i", "b v=2i"]), 100).unwrap();
        assert_eq!(bodies, ["a v=1i\nb v=2i"]);
    }

    #[test]
    fn splits_at_the_limit() {
        // each line is 6 bytes; two lines plus separator is 13
        let bodies = pack_lines(&lines(&["a v=1i", "b v=2i", "c v=3i"]), 13).unwrap();
        assert_eq!(bodies, ["a v=1i\nb v=2i", "c v=3i"]);

        let bodies = pack_lines(&lines(&["a v=1i", "b v=2i", "c v=3i"]), 12).unwrap();
        assert_eq!(bodies, ["a v=1i", "b v=2i", "c v=3i"]);
    }

    #[test]
    fn oversized_line_is_an_error() {
        let err = pack_lines(&lines(&["a v=1i", "much longer v=2i"]), 8).unwrap_err();
        assert!(matches!(err, StoreError::PointTooLarge { size: 16, limit: 8 }));
    }

    #[test]
    fn no_lines_no_bodies() {
        assert!(pack_lines(&[], 10).unwrap().is_empty());
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(quote_ident(r#"we"ird\db"#), r#"we\"ird\\db"#);
    }

    #[test]
    fn statement_errors_are_found() {
        assert_eq!(statement_error(r#"{"results":[{"statement_id":0}]}"#), None);
        assert_eq!(
            statement_error(r#"{"results":[{"statement_id":0,"error":"boom"}]}"#).as_deref(),
            Some("boom")
        );
        assert_eq!(
            statement_error(r#"{"error":"missing required parameter \"q\""}"#).as_deref(),
            Some("missing required parameter \"q\"")
        );
        assert_eq!(statement_error("not json"), None);
    }

    #[test]
    fn error_bodies_are_reduced() {
        assert_eq!(error_message(r#"{"error":"unable to parse"}"#), "unable to parse");
        assert_eq!(error_message(" plain text \n"), "plain text");
    }
}
