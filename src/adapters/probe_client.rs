//! Per provider latency probing strategies.
//!
//! Providers differ in how their endpoints can be reached: some expose a JSON
//! ping API reporting the latency themselves, others can only be timed as an
//! opaque request, and the rest are probed like a browser image load where
//! any HTTP answer proves the round trip completed.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::adapters::http::elapsed_ms;
use crate::adapters::time_source::now_ms;
use crate::domain::latency::{ProbeTarget, Provider};
use crate::error::DriftError;

/// Deadline applied to every single trial, whatever the strategy.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(3000);

const CACHE_BUST_PARAM: &str = "_cb";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// Endpoint answers with `{"latency_ms": ..}` measured on its side.
    ApiJson,
    /// Response content is ignored, only send-to-settle time counts.
    OpaqueFetch,
    /// Any HTTP answer counts as reached, timed until the body is read.
    ImageLoad { cache_bust: bool },
}

/// Strategy lookup by provider. `None` falls back to [`ProbeStrategy::ImageLoad`].
pub fn provider_strategy(provider: Provider) -> Option<ProbeStrategy> {
    match provider {
        Provider::Gcp => Some(ProbeStrategy::ApiJson),
        Provider::Aws | Provider::Azure => Some(ProbeStrategy::OpaqueFetch),
        Provider::Oracle => Some(ProbeStrategy::ImageLoad { cache_bust: true }),
        Provider::Contabo => None,
    }
}

impl ProbeStrategy {
    pub fn for_target(target: &ProbeTarget) -> Self {
        let http_scheme = Url::parse(&target.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        match provider_strategy(target.provider) {
            Some(strategy) if http_scheme => strategy,
            _ => ProbeStrategy::ImageLoad { cache_bust: false },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStrategy::ApiJson => "api-json",
            ProbeStrategy::OpaqueFetch => "opaque-fetch",
            ProbeStrategy::ImageLoad { .. } => "image-load",
        }
    }
}

/// Anything able to time one trial against a target.
pub trait Measure: Sync {
    fn measure(&self, target: &ProbeTarget) -> impl Future<Output = Result<u32, DriftError>> + Send;
}

/// Measures targets over HTTP using the provider specific strategy.
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: PROBE_TIMEOUT,
        }
    }

    async fn api_json(&self, url: &str) -> Result<u32, DriftError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriftError::Http(status.as_u16()));
        }
        let body: Value = response.json().await?;
        parse_reported_latency(&body)
    }

    async fn opaque_fetch(&self, url: &str) -> Result<u32, DriftError> {
        let start = Instant::now();
        let _response = self.client.get(url).send().await?;
        Ok(elapsed_ms(start))
    }

    async fn image_load(&self, url: &str, cache_bust: bool) -> Result<u32, DriftError> {
        let url = if cache_bust {
            with_cache_buster(url, now_ms())?
        } else {
            url.to_string()
        };
        let start = Instant::now();
        let response = self.client.get(&url).send().await?;
        // a failed body read still means the server answered
        let _ = response.bytes().await;
        Ok(elapsed_ms(start))
    }
}

impl Measure for HttpProber {
    #[instrument(skip(self, target), fields(id = %target.id))]
    async fn measure(&self, target: &ProbeTarget) -> Result<u32, DriftError> {
        let strategy = ProbeStrategy::for_target(target);
        let trial = async {
            match strategy {
                ProbeStrategy::ApiJson => self.api_json(&target.url).await,
                ProbeStrategy::OpaqueFetch => self.opaque_fetch(&target.url).await,
                ProbeStrategy::ImageLoad { cache_bust } => {
                    self.image_load(&target.url, cache_bust).await
                }
            }
        };
        let res = tokio::time::timeout(self.timeout, trial)
            .await
            .map_err(|_| DriftError::Timeout(self.timeout))
            .and_then(|r| r);
        debug!(strategy = strategy.as_str(), ?res, "trial settled");
        res
    }
}

/// Read the server side latency from an API ping reply.
pub fn parse_reported_latency(body: &Value) -> Result<u32, DriftError> {
    body.get("latency_ms")
        .and_then(Value::as_f64)
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms.round().min(u32::MAX as f64) as u32)
        .ok_or_else(|| DriftError::Protocol("reply has no usable 'latency_ms'".into()))
}

/// Append a cache busting query parameter, keeping any existing query.
pub fn with_cache_buster(url: &str, nonce: i64) -> Result<String, DriftError> {
    let mut parsed =
        Url::parse(url).map_err(|e| DriftError::Config(format!("invalid url '{url}': {e}")))?;
    parsed
        .query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &nonce.to_string());
    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::canned;
    use crate::domain::latency::Continent;
    use serde_json::json;

    fn target(provider: Provider, url: &str) -> ProbeTarget {
        ProbeTarget {
            id: "t".into(),
            provider,
            region: "r".into(),
            position: "p".into(),
            continent: Continent::Europe,
            country: "DE".into(),
            url: url.into(),
        }
    }

    #[test]
    fn strategies_follow_provider_table() {
        let url = "https://example.com/ping";
        assert_eq!(ProbeStrategy::for_target(&target(Provider::Gcp, url)), ProbeStrategy::ApiJson);
        assert_eq!(ProbeStrategy::for_target(&target(Provider::Aws, url)), ProbeStrategy::OpaqueFetch);
        assert_eq!(ProbeStrategy::for_target(&target(Provider::Azure, url)), ProbeStrategy::OpaqueFetch);
        assert_eq!(
            ProbeStrategy::for_target(&target(Provider::Oracle, url)),
            ProbeStrategy::ImageLoad { cache_bust: true }
        );
    }

    #[test]
    fn unknown_provider_or_scheme_falls_back_to_image_load() {
        assert_eq!(
            ProbeStrategy::for_target(&target(Provider::Contabo, "https://example.com/x.png")),
            ProbeStrategy::ImageLoad { cache_bust: false }
        );
        assert_eq!(
            ProbeStrategy::for_target(&target(Provider::Gcp, "ftp://example.com/ping")),
            ProbeStrategy::ImageLoad { cache_bust: false }
        );
    }

    #[test]
    fn cache_buster_is_appended_to_existing_query() {
        assert_eq!(
            with_cache_buster("https://example.com/img.png", 42).unwrap(),
            "https://example.com/img.png?_cb=42"
        );
        assert_eq!(
            with_cache_buster("https://example.com/img.png?a=1", 42).unwrap(),
            "https://example.com/img.png?a=1&_cb=42"
        );
        assert!(with_cache_buster("not a url", 1).is_err());
    }

    #[test]
    fn reported_latency_is_rounded() {
        assert_eq!(parse_reported_latency(&json!({"latency_ms": 41.6})).unwrap(), 42);
        assert_eq!(parse_reported_latency(&json!({"latency_ms": 7})).unwrap(), 7);
        assert!(parse_reported_latency(&json!({"latency": 7})).is_err());
        assert!(parse_reported_latency(&json!({"latency_ms": -3})).is_err());
    }

    #[tokio::test]
    async fn error_statuses_count_as_reached_for_timed_strategies() {
        let addr = canned::serve(canned::reply("404 Not Found", "")).await;
        let prober = HttpProber::new(canned::client());
        for provider in [Provider::Contabo, Provider::Oracle, Provider::Aws, Provider::Azure] {
            let res = prober.measure(&target(provider, &format!("http://{addr}/favicon.ico"))).await;
            assert!(res.is_ok(), "{provider}: {res:?}");
        }
    }

    #[tokio::test]
    async fn api_json_requires_success_status() {
        let addr = canned::serve(canned::reply("503 Service Unavailable", "{}")).await;
        let prober = HttpProber::new(canned::client());
        let res = prober.measure(&target(Provider::Gcp, &format!("http://{addr}/api/ping"))).await;
        assert!(matches!(res, Err(DriftError::Http(503))), "{res:?}");
    }

    #[tokio::test]
    async fn api_json_reports_server_latency() {
        let addr = canned::serve(canned::reply("200 OK", r#"{"latency_ms":12.4}"#)).await;
        let prober = HttpProber::new(canned::client());
        let res = prober.measure(&target(Provider::Gcp, &format!("http://{addr}/api/ping"))).await;
        assert_eq!(res.unwrap(), 12);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let addr = canned::hang().await;
        let prober = HttpProber::new(canned::client());
        let t = target(Provider::Aws, &format!("http://{addr}/ping"));
        let start = Instant::now();
        let res = prober.measure(&t).await;
        assert!(matches!(res, Err(DriftError::Timeout(d)) if d == PROBE_TIMEOUT), "{res:?}");
        assert!(start.elapsed() >= PROBE_TIMEOUT);

        let result = crate::services::latency::probe_target(&t, &prober).await;
        assert_eq!(result, crate::domain::latency::ProbeResult::Error);
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let addr = canned::closed().await;
        let prober = HttpProber::new(canned::client());
        let res = prober.measure(&target(Provider::Aws, &format!("http://{addr}/ping"))).await;
        assert!(matches!(res, Err(DriftError::Network(_))), "{res:?}");
    }
}
