//! Latency accounting and the diagnostic line contract.
//!
//! Total system latency is the consumer-reported latency (ms) plus the tracking
//! source's own pipeline latency, which the source reports in seconds. One line
//! per accounted frame is written to the diagnostic log:
//!
//! ```text
//! System Latency: <total> ms. FC Latency: <reported>, Vicon Latency: <source>
//! ```
//!
//! The offline analyzer (`latency_analyse`) scans captured logs for those lines.

use regex::Regex;
use std::sync::OnceLock;

/// One accounted frame. Derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySample {
    pub reported_ms: f64,
    pub source_ms: f64,
    pub total_ms: f64,
}

impl LatencySample {
    /// `None` when the consumer did not report a latency (`reported_ms <= 0`).
    pub fn account(reported_ms: f64, source_latency_s: f64) -> Option<Self> {
        if reported_ms.is_nan() || reported_ms <= 0.0 {
            return None;
        }
        let source_ms = source_latency_s * 1000.0;
        Some(Self {
            reported_ms,
            source_ms,
            total_ms: reported_ms + source_ms,
        })
    }

    pub fn log_line(&self) -> String {
        format!(
            "System Latency: {} ms. FC Latency: {}, Vicon Latency: {}",
            self.total_ms, self.reported_ms, self.source_ms
        )
    }
}

fn latency_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"System Latency: ([\d.]+) ms\. FC Latency: ([\d.]+), Vicon Latency: ([\d.]+)",
        )
        .expect("latency line regex is valid")
    })
}

/// All latency lines in `text`, in order of appearance.
pub fn parse_latency_lines(text: &str) -> Vec<LatencySample> {
    latency_line_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let total_ms = caps[1].parse().ok()?;
            let reported_ms = caps[2].parse().ok()?;
            let source_ms = caps[3].parse().ok()?;
            Some(LatencySample {
                reported_ms,
                source_ms,
                total_ms,
            })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ColumnStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| ColumnStats {
            min,
            max,
            avg: sum / count as f64,
        })
    }
}

/// Per-column statistics over a set of latency lines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub system: ColumnStats,
    pub fc: ColumnStats,
    pub vicon: ColumnStats,
}

/// `None` when there are no samples.
pub fn summarize(samples: &[LatencySample]) -> Option<LatencySummary> {
    Some(LatencySummary {
        count: samples.len(),
        system: ColumnStats::from_values(samples.iter().map(|s| s.total_ms))?,
        fc: ColumnStats::from_values(samples.iter().map(|s| s.reported_ms))?,
        vicon: ColumnStats::from_values(samples.iter().map(|s| s.source_ms))?,
    })
}
