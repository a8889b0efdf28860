use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::Serialize;

use crate::error::DriftError;

/// One request/response exchange with a time source, all values in epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSample {
    pub request_sent_at_ms: i64,
    pub response_received_at_ms: i64,
    pub server_timestamp_ms: i64,
}

impl ClockSample {
    pub fn new(t0: i64, t1: i64, server_ts: i64) -> Self {
        Self {
            request_sent_at_ms: t0,
            response_received_at_ms: t1,
            server_timestamp_ms: server_ts,
        }
    }

    pub fn round_trip_ms(&self) -> i64 {
        self.response_received_at_ms - self.request_sent_at_ms
    }

    /// Offset of the remote clock relative to the local one.
    ///
    /// Assumes symmetric network delay: the server stamped its reply at the
    /// midpoint of the round trip as observed locally.
    pub fn offset_ms(&self) -> f64 {
        self.server_timestamp_ms as f64 + self.round_trip_ms() as f64 / 2.0
            - self.response_received_at_ms as f64
    }

    /// Maximal one-way delay error under the symmetry assumption.
    pub fn uncertainty_ms(&self) -> u64 {
        (self.round_trip_ms().max(0) as u64).div_ceil(2)
    }

    /// Reduce the sample to an estimate, rejecting samples where the local clock went backwards.
    pub fn into_estimate(self) -> Result<ClockEstimate, DriftError> {
        if self.response_received_at_ms < self.request_sent_at_ms {
            return Err(DriftError::Protocol(format!(
                "local clock stepped backwards during request ({} < {})",
                self.response_received_at_ms, self.request_sent_at_ms
            )));
        }
        let measured_at = Utc
            .timestamp_millis_opt(self.response_received_at_ms)
            .single()
            .ok_or_else(|| {
                DriftError::Protocol(format!(
                    "local timestamp out of range: {}",
                    self.response_received_at_ms
                ))
            })?;
        Ok(ClockEstimate {
            offset_ms: self.offset_ms(),
            uncertainty_ms: self.uncertainty_ms(),
            round_trip_ms: self.round_trip_ms() as u64,
            measured_at,
        })
    }
}

/// Result of one successful synchronization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ClockEstimate {
    /// Positive when the remote clock is ahead of the local clock.
    pub offset_ms: f64,
    pub uncertainty_ms: u64,
    pub round_trip_ms: u64,
    pub measured_at: DateTime<Utc>,
}

impl ClockEstimate {
    /// Server time corresponding to the given local instant.
    pub fn server_now(&self, local_now: DateTime<Utc>) -> DateTime<Utc> {
        let micros = (self.offset_ms * 1000.0).round() as i64;
        local_now + ChronoDuration::microseconds(micros)
    }

    pub fn severity(&self) -> OffsetSeverity {
        OffsetSeverity::classify(self.offset_ms)
    }

    /// True when the local clock is behind the remote one.
    pub fn local_is_behind(&self) -> bool {
        self.offset_ms > 0.0
    }
}

/// Band of `|offset|` that drives user facing warnings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetSeverity {
    /// Below 50 ms.
    InSync,
    /// Below 30 s.
    Negligible,
    /// Below 5 min: time-based one time passwords may be rejected.
    OtpDrift,
    /// Below 1 h: token validity windows and event ordering are affected.
    TokenDrift,
    /// One hour or more: date dependent logic breaks.
    DateBreak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Negligible,
    Warn,
    Error,
}

pub const IN_SYNC_MS: f64 = 50.0;
pub const NEGLIGIBLE_MS: f64 = 30_000.0;
pub const OTP_DRIFT_MS: f64 = 300_000.0;
pub const TOKEN_DRIFT_MS: f64 = 3_600_000.0;

impl OffsetSeverity {
    pub fn classify(offset_ms: f64) -> Self {
        let abs = offset_ms.abs();
        if abs < IN_SYNC_MS {
            OffsetSeverity::InSync
        } else if abs < NEGLIGIBLE_MS {
            OffsetSeverity::Negligible
        } else if abs < OTP_DRIFT_MS {
            OffsetSeverity::OtpDrift
        } else if abs < TOKEN_DRIFT_MS {
            OffsetSeverity::TokenDrift
        } else {
            OffsetSeverity::DateBreak
        }
    }

    pub fn level(&self) -> SeverityLevel {
        match self {
            OffsetSeverity::InSync | OffsetSeverity::Negligible => SeverityLevel::Negligible,
            OffsetSeverity::OtpDrift | OffsetSeverity::TokenDrift => SeverityLevel::Warn,
            OffsetSeverity::DateBreak => SeverityLevel::Error,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            OffsetSeverity::InSync => "clock is in sync",
            OffsetSeverity::Negligible => "offset is negligible",
            OffsetSeverity::OtpDrift => "time-based one time passwords may fail",
            OffsetSeverity::TokenDrift => "token validity and event ordering may break",
            OffsetSeverity::DateBreak => "date dependent logic will break",
        }
    }
}
