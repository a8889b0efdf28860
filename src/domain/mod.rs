//! Plain data types shared by the measurement services and the formatters.

pub mod clock;
pub mod latency;
