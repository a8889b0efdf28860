use std::time::{Duration, Instant};

use reqwest::Client;

use crate::error::DriftError;

const USER_AGENT: &str = concat!("driftkit/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client.
///
/// No client level timeout is set: callers race each request against their
/// own `tokio::time::timeout` so that a timeout is reported the same way for
/// every strategy.
pub fn build_client() -> Result<Client, DriftError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| DriftError::Other(format!("http client: {e}")))
}

/// Elapsed time since `start` as whole milliseconds.
pub fn elapsed_ms(start: Instant) -> u32 {
    duration_to_ms(start.elapsed())
}

pub fn duration_to_ms(d: Duration) -> u32 {
    let ms = (d.as_secs_f64() * 1000.0).round();
    if ms >= u32::MAX as f64 { u32::MAX } else { ms as u32 }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_round_to_nearest_millisecond() {
        assert_eq!(duration_to_ms(Duration::from_micros(120_499)), 120);
        assert_eq!(duration_to_ms(Duration::from_micros(120_500)), 121);
        assert_eq!(duration_to_ms(Duration::ZERO), 0);
    }
}
