use serde::Serialize;

use crate::domain::latency::{ProbeResult, ProbeTarget, Provider};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub errors: usize,
    pub min_ms: u32,
    pub max_ms: u32,
    pub avg_ms: f64,
    pub median_ms: f64,
}

/// Aggregate the measured latencies; pending or testing entries are ignored.
pub fn compute_latency_stats(results: &[ProbeResult]) -> LatencyStats {
    let mut latencies: Vec<u32> = results.iter().filter_map(ProbeResult::latency_ms).collect();
    let errors = results.iter().filter(|r| **r == ProbeResult::Error).count();
    if latencies.is_empty() {
        return LatencyStats {
            errors,
            ..LatencyStats::default()
        };
    }
    latencies.sort_unstable();
    let count = latencies.len();
    let avg_ms = latencies.iter().map(|&l| l as f64).sum::<f64>() / count as f64;
    let median_ms = if count % 2 == 1 {
        latencies[count / 2] as f64
    } else {
        (latencies[count / 2 - 1] as f64 + latencies[count / 2] as f64) / 2.0
    };
    LatencyStats {
        count,
        errors,
        min_ms: latencies[0],
        max_ms: latencies[count - 1],
        avg_ms,
        median_ms,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestRegion {
    pub provider: Provider,
    pub id: String,
    pub position: String,
    pub latency_ms: u32,
}

/// Lowest latency target per provider, in provider order. Ties keep catalog order.
pub fn fastest_by_provider(entries: &[(ProbeTarget, ProbeResult)]) -> Vec<FastestRegion> {
    Provider::ALL
        .iter()
        .filter_map(|&provider| {
            entries
                .iter()
                .filter(|(t, _)| t.provider == provider)
                .filter_map(|(t, r)| r.latency_ms().map(|ms| (t, ms)))
                .min_by_key(|(_, ms)| *ms)
                .map(|(t, latency_ms)| FastestRegion {
                    provider,
                    id: t.id.clone(),
                    position: t.position.clone(),
                    latency_ms,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::latency::Continent;

    fn target(id: &str, provider: Provider) -> ProbeTarget {
        ProbeTarget {
            id: id.into(),
            provider,
            region: id.into(),
            position: format!("{id}-city"),
            continent: Continent::Asia,
            country: "JP".into(),
            url: "https://example.com".into(),
        }
    }

    fn done(ms: u32) -> ProbeResult {
        ProbeResult::Done { latency_ms: ms }
    }

    #[test]
    fn stats_over_done_results() {
        let stats = compute_latency_stats(&[
            done(30),
            ProbeResult::Error,
            done(10),
            ProbeResult::Pending,
            done(20),
            done(40),
        ]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.min_ms, 10);
        assert_eq!(stats.max_ms, 40);
        assert_eq!(stats.avg_ms, 25.0);
        assert_eq!(stats.median_ms, 25.0);
    }

    #[test]
    fn stats_handle_empty_input() {
        let stats = compute_latency_stats(&[]);
        assert_eq!(stats, LatencyStats::default());
        let stats = compute_latency_stats(&[ProbeResult::Error]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn fastest_region_per_provider() {
        let entries = vec![
            (target("a1", Provider::Aws), done(80)),
            (target("g1", Provider::Gcp), ProbeResult::Error),
            (target("a2", Provider::Aws), done(35)),
            (target("o1", Provider::Oracle), done(120)),
            (target("a3", Provider::Aws), done(35)),
        ];
        let fastest = fastest_by_provider(&entries);
        assert_eq!(fastest.len(), 2);
        assert_eq!(fastest[0].provider, Provider::Aws);
        assert_eq!(fastest[0].id, "a2");
        assert_eq!(fastest[0].latency_ms, 35);
        assert_eq!(fastest[1].provider, Provider::Oracle);
    }
}
