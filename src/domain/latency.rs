use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DriftError;

/// Cloud provider hosting a probe endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "AWS", alias = "aws")]
    Aws,
    #[serde(rename = "GCP", alias = "gcp")]
    Gcp,
    #[serde(rename = "Azure", alias = "azure")]
    Azure,
    #[serde(rename = "Oracle", alias = "oracle")]
    Oracle,
    #[serde(rename = "Contabo", alias = "contabo")]
    Contabo,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Aws,
        Provider::Gcp,
        Provider::Azure,
        Provider::Oracle,
        Provider::Contabo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Gcp => "GCP",
            Provider::Azure => "Azure",
            Provider::Oracle => "Oracle",
            Provider::Contabo => "Contabo",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DriftError::Config(format!("unknown provider: '{s}'")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continent {
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "South America")]
    SouthAmerica,
    Europe,
    Asia,
    Oceania,
    Africa,
    #[serde(rename = "Middle East")]
    MiddleEast,
}

impl Continent {
    pub const ALL: [Continent; 7] = [
        Continent::NorthAmerica,
        Continent::SouthAmerica,
        Continent::Europe,
        Continent::Asia,
        Continent::Oceania,
        Continent::Africa,
        Continent::MiddleEast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::NorthAmerica => "North America",
            Continent::SouthAmerica => "South America",
            Continent::Europe => "Europe",
            Continent::Asia => "Asia",
            Continent::Oceania => "Oceania",
            Continent::Africa => "Africa",
            Continent::MiddleEast => "Middle East",
        }
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Continent {
    type Err = DriftError;

    /// Accepts the display name with or without spaces, dashes or underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Continent::ALL
            .into_iter()
            .find(|c| normalize(c.as_str()) == wanted)
            .ok_or_else(|| DriftError::Config(format!("unknown continent: '{s}'")))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Either every value or one concrete value, as used by catalog filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Selector<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Selector<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr<Err = DriftError>> FromStr for Selector<T> {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Selector::All)
        } else {
            s.parse().map(Selector::Only)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.pad("All"),
            Selector::Only(v) => v.fmt(f),
        }
    }
}

/// Static catalog entry describing one endpoint to probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub id: String,
    pub provider: Provider,
    pub region: String,
    /// Human readable location shown next to the region.
    pub position: String,
    pub continent: Continent,
    pub country: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Pending,
    Testing,
    Done,
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Pending => "pending",
            ProbeStatus::Testing => "testing",
            ProbeStatus::Done => "done",
            ProbeStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per target state of a latency run. The latency only exists once measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProbeResult {
    #[default]
    Pending,
    Testing,
    Done { latency_ms: u32 },
    Error,
}

impl ProbeResult {
    pub fn status(&self) -> ProbeStatus {
        match self {
            ProbeResult::Pending => ProbeStatus::Pending,
            ProbeResult::Testing => ProbeStatus::Testing,
            ProbeResult::Done { .. } => ProbeStatus::Done,
            ProbeResult::Error => ProbeStatus::Error,
        }
    }

    pub fn latency_ms(&self) -> Option<u32> {
        match self {
            ProbeResult::Done { latency_ms } => Some(*latency_ms),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProbeResult::Done { .. } | ProbeResult::Error)
    }

    /// Reduce the outcome of independent trials: the fastest success wins,
    /// no success at all is an error.
    pub fn from_trials(trials: &[Option<u32>]) -> Self {
        match trials.iter().flatten().min() {
            Some(&latency_ms) => ProbeResult::Done { latency_ms },
            None => ProbeResult::Error,
        }
    }
}
