use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::clock::ClockSample;
use crate::error::DriftError;

pub const DEFAULT_TIME_URL: &str = "https://worldtimeapi.org/api/timezone/Etc/UTC";
pub const DEFAULT_TIME_FIELD: &str = "datetime";

/// Anything able to produce one timed exchange with an authoritative clock.
pub trait TimeSource: Send + Sync {
    fn sample(&self) -> impl Future<Output = Result<ClockSample, DriftError>> + Send;
}

/// Time source reached with a single HTTP GET returning a JSON document.
#[derive(Clone, Debug)]
pub struct HttpTimeSource {
    client: Client,
    url: String,
    field: String,
    timeout: Duration,
}

impl HttpTimeSource {
    pub fn new(client: Client, url: impl Into<String>, field: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            field: field.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TimeSource for HttpTimeSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn sample(&self) -> Result<ClockSample, DriftError> {
        let exchange = async {
            let t0 = now_ms();
            let response = self.client.get(&self.url).send().await?;
            let t1 = now_ms();
            let status = response.status();
            if !status.is_success() {
                return Err(DriftError::Http(status.as_u16()));
            }
            let body: Value = response.json().await?;
            let server_ts = parse_server_timestamp(&body, &self.field)?;
            debug!(t0, t1, server_ts, "time source answered");
            Ok(ClockSample::new(t0, t1, server_ts))
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| DriftError::Timeout(self.timeout))?
    }
}

/// Current local wall clock in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Extract the server timestamp from a time source reply.
///
/// The field may hold epoch milliseconds (integer or float) or an RFC 3339
/// date-time string.
pub fn parse_server_timestamp(body: &Value, field: &str) -> Result<i64, DriftError> {
    let value = body
        .get(field)
        .ok_or_else(|| DriftError::Protocol(format!("missing field '{field}' in time source reply")))?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            .ok_or_else(|| DriftError::Protocol(format!("field '{field}' is not a usable number: {n}"))),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| DriftError::Protocol(format!("field '{field}' is not RFC 3339 ('{s}'): {e}"))),
        other => Err(DriftError::Protocol(format!(
            "field '{field}' has unsupported type: {other}"
        ))),
    }
}
