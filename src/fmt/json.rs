use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::probe_client::ProbeStrategy;
use crate::domain::clock::{ClockEstimate, OffsetSeverity, SeverityLevel};
use crate::domain::latency::{ProbeResult, ProbeStatus, ProbeTarget};
use crate::error::DriftError;
use crate::services::latency::RunSummary;
use crate::stats::{FastestRegion, LatencyStats};

const SCHEMA_VERSION: u8 = 1;

#[derive(Serialize)]
pub struct JsonEstimate {
    pub schema_version: u8,
    pub run_ts: String,
    pub source: String,
    pub offset_ms: f64,
    pub uncertainty_ms: u64,
    pub round_trip_ms: u64,
    pub measured_at: String,
    pub server_time: String,
    pub severity: OffsetSeverity,
    pub level: SeverityLevel,
}

#[derive(Serialize)]
pub struct JsonProbe<'a> {
    pub id: &'a str,
    pub provider: String,
    pub region: &'a str,
    pub position: &'a str,
    pub continent: String,
    pub country: &'a str,
    pub strategy: &'static str,
    pub status: ProbeStatus,
    pub latency_ms: Option<u32>,
}

#[derive(Serialize)]
pub struct JsonRun<'a> {
    pub schema_version: u8,
    pub run_ts: String,
    pub results: Vec<JsonProbe<'a>>,
    pub summary: &'a RunSummary,
    pub stats: &'a LatencyStats,
    pub fastest: &'a [FastestRegion],
}

fn encode<T: Serialize>(value: &T, pretty: bool) -> Result<String, DriftError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

fn probe_entry<'a>(t: &'a ProbeTarget, r: &ProbeResult) -> JsonProbe<'a> {
    JsonProbe {
        id: &t.id,
        provider: t.provider.to_string(),
        region: &t.region,
        position: &t.position,
        continent: t.continent.to_string(),
        country: &t.country,
        strategy: ProbeStrategy::for_target(t).as_str(),
        status: r.status(),
        latency_ms: r.latency_ms(),
    }
}

/// Serialize a clock estimate observed at `local_now`.
pub fn estimate_to_json(
    est: &ClockEstimate,
    source: &str,
    local_now: DateTime<Utc>,
    pretty: bool,
) -> Result<String, DriftError> {
    let severity = est.severity();
    let doc = JsonEstimate {
        schema_version: SCHEMA_VERSION,
        run_ts: Utc::now().to_rfc3339(),
        source: source.to_string(),
        offset_ms: est.offset_ms,
        uncertainty_ms: est.uncertainty_ms,
        round_trip_ms: est.round_trip_ms,
        measured_at: est.measured_at.to_rfc3339(),
        server_time: est.server_now(local_now).to_rfc3339(),
        severity,
        level: severity.level(),
    };
    encode(&doc, pretty)
}

pub fn run_to_json(
    entries: &[(ProbeTarget, ProbeResult)],
    summary: &RunSummary,
    stats: &LatencyStats,
    fastest: &[FastestRegion],
    pretty: bool,
) -> Result<String, DriftError> {
    let run = JsonRun {
        schema_version: SCHEMA_VERSION,
        run_ts: Utc::now().to_rfc3339(),
        results: entries.iter().map(|(t, r)| probe_entry(t, r)).collect(),
        summary,
        stats,
        fastest,
    };
    encode(&run, pretty)
}

pub fn targets_to_json(targets: &[ProbeTarget], pretty: bool) -> Result<String, DriftError> {
    encode(&targets, pretty)
}
