use chrono::{DateTime, Local, Utc};
use console::{StyledObject, style};

use crate::adapters::probe_client::ProbeStrategy;
use crate::domain::clock::{ClockEstimate, SeverityLevel};
use crate::domain::latency::{ProbeResult, ProbeTarget};
use crate::services::latency::RunSummary;
use crate::stats::{FastestRegion, LatencyStats};

/// Signed offset with explicit `+`.
pub fn format_offset(offset_ms: f64) -> String {
    format!("{:+.3} ms", offset_ms)
}

fn direction(est: &ClockEstimate) -> &'static str {
    if est.offset_ms == 0.0 {
        "clocks agree"
    } else if est.local_is_behind() {
        "local clock is behind"
    } else {
        "local clock is ahead"
    }
}

fn level_style<D>(level: SeverityLevel, value: D) -> StyledObject<D> {
    match level {
        SeverityLevel::Negligible => style(value).green(),
        SeverityLevel::Warn => style(value).yellow(),
        SeverityLevel::Error => style(value).red().bold(),
    }
}

/// Render a clock estimate as a labelled block.
pub fn render_estimate(est: &ClockEstimate, source: &str, local_now: DateTime<Utc>) -> String {
    let server_now = est.server_now(local_now);
    let severity = est.severity();
    format!(
        "{src_lbl} {src_val}\n\
         {srv_lbl} {srv_val}\n\
         {loc_lbl} {loc_val}\n\
         {off_lbl} {off_val} ({dir})\n\
         {unc_lbl} ±{unc_val} ms\n\
         {rtt_lbl} {rtt_val} ms\n\
         {sev_lbl} {sev_val}",
        src_lbl = style("Time Source:").cyan().bold(),
        src_val = style(source).green(),
        srv_lbl = style("Server Time:").cyan().bold(),
        srv_val = style(server_now.format("%Y-%m-%d %H:%M:%S%.3f UTC")).green(),
        loc_lbl = style("Local Time:").cyan().bold(),
        loc_val = style(DateTime::<Local>::from(local_now).format("%Y-%m-%d %H:%M:%S%.3f")).green(),
        off_lbl = style("Clock Offset:").cyan().bold(),
        off_val = format_offset(est.offset_ms),
        dir = direction(est),
        unc_lbl = style("Uncertainty:").cyan().bold(),
        unc_val = est.uncertainty_ms,
        rtt_lbl = style("Round Trip Delay:").cyan().bold(),
        rtt_val = est.round_trip_ms,
        sev_lbl = style("Status:").cyan().bold(),
        sev_val = level_style(severity.level(), severity.describe()),
    )
}

pub fn render_simple_estimate(est: &ClockEstimate) -> String {
    let severity = est.severity();
    format!(
        "{} ±{} ms {}",
        format_offset(est.offset_ms),
        est.uncertainty_ms,
        level_style(severity.level(), format!("{:?}", severity))
    )
}

/// One status line for the live clock, `None` before the first successful sync.
pub fn render_clock_line(est: Option<&ClockEstimate>, local_now: DateTime<Utc>) -> String {
    match est {
        Some(est) => format!(
            "{} {} (offset {} ±{} ms)",
            style("Server Time:").cyan().bold(),
            style(est.server_now(local_now).format("%H:%M:%S%.3f UTC")).green(),
            level_style(est.severity().level(), format_offset(est.offset_ms)),
            est.uncertainty_ms
        ),
        None => format!(
            "{} {} (not synchronized yet)",
            style("Local Time:").cyan().bold(),
            style(local_now.format("%H:%M:%S%.3f UTC")).yellow()
        ),
    }
}

fn status_cell(res: &ProbeResult) -> String {
    match res {
        ProbeResult::Pending => style("○ pending").dim().to_string(),
        ProbeResult::Testing => style("… testing").blue().to_string(),
        ProbeResult::Done { latency_ms } => style(format!("✓ {:>5} ms", latency_ms)).green().to_string(),
        ProbeResult::Error => style("✗ error").red().to_string(),
    }
}

/// Render the probe board as a table, one line per target.
pub fn render_board(entries: &[(ProbeTarget, ProbeResult)], verbose: bool) -> String {
    let mut out = String::new();
    for (t, r) in entries {
        out.push_str(&format!(
            "{:<8} {:<26} {:<18} {}",
            style(t.provider).bold(),
            t.id,
            t.position,
            status_cell(r)
        ));
        if verbose {
            out.push_str(&format!(
                "  [{} {} {}]",
                t.continent,
                t.country,
                ProbeStrategy::for_target(t).as_str()
            ));
        }
        out.push('\n');
    }
    out
}

pub fn render_simple_board(entries: &[(ProbeTarget, ProbeResult)]) -> String {
    entries
        .iter()
        .map(|(t, r)| match r.latency_ms() {
            Some(ms) => format!("{} {}", t.id, ms),
            None => format!("{} {}", t.id, r.status()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_summary(summary: &RunSummary, stats: &LatencyStats, fastest: &[FastestRegion]) -> String {
    let mut out = format!(
        "{} {} done, {} errors, {}/{} batches in {} ms",
        style("Run:").cyan().bold(),
        style(summary.done).green(),
        style(summary.errors).red(),
        summary.batches_run,
        summary.batches_total,
        summary.elapsed_ms
    );
    if summary.cancelled {
        out.push_str(&format!(" {}", style("(cancelled)").yellow()));
    }
    if stats.count > 0 {
        out.push_str(&format!(
            "\n{} min {} ms, max {} ms, avg {:.1} ms, median {:.1} ms",
            style("Latency:").cyan().bold(),
            stats.min_ms,
            stats.max_ms,
            stats.avg_ms,
            stats.median_ms
        ));
    }
    for f in fastest {
        out.push_str(&format!(
            "\n{} {} {} ({} ms)",
            style(format!("Fastest {}:", f.provider)).cyan().bold(),
            style(&f.id).green(),
            f.position,
            f.latency_ms
        ));
    }
    out
}

pub fn render_targets(targets: &[ProbeTarget]) -> String {
    let mut out = String::new();
    for t in targets {
        out.push_str(&format!(
            "{:<8} {:<26} {:<18} {:<14} {}  {}\n",
            style(t.provider).bold(),
            t.id,
            t.position,
            t.continent,
            t.country,
            style(&t.url).dim()
        ));
    }
    out.push_str(&format!("{} targets", targets.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ClockSample;
    use crate::domain::latency::{Continent, Provider};
    use chrono::TimeZone;
    use console::set_colors_enabled;

    fn target(id: &str) -> ProbeTarget {
        ProbeTarget {
            id: id.into(),
            provider: Provider::Azure,
            region: "westeurope".into(),
            position: "Netherlands".into(),
            continent: Continent::Europe,
            country: "NL".into(),
            url: "https://example.com".into(),
        }
    }

    #[test]
    fn offsets_carry_their_sign() {
        assert_eq!(format_offset(110.0), "+110.000 ms");
        assert_eq!(format_offset(-0.5), "-0.500 ms");
    }

    #[test]
    fn estimate_block_mentions_direction() {
        set_colors_enabled(false);
        let est = ClockSample::new(1000, 1100, 1160).into_estimate().unwrap();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let out = render_estimate(&est, "https://time.example", now);
        assert!(out.contains("+110.000 ms (local clock is behind)"), "{out}");
        assert!(out.contains("±50 ms"), "{out}");
        assert!(out.contains("2023-11-14 22:13:20.110 UTC"), "{out}");
    }

    #[test]
    fn simple_board_prints_latency_or_status() {
        let entries = vec![
            (target("a"), ProbeResult::Done { latency_ms: 12 }),
            (target("b"), ProbeResult::Error),
            (target("c"), ProbeResult::Pending),
        ];
        assert_eq!(render_simple_board(&entries), "a 12\nb error\nc pending");
    }

    #[test]
    fn clock_line_before_first_sync() {
        set_colors_enabled(false);
        let now = Utc.timestamp_millis_opt(0).unwrap();
        assert!(render_clock_line(None, now).contains("not synchronized yet"));
    }
}
