//! Agent Metrics Collection
//!
//! Counters, gauges and bounded histograms for agent and analysis activity.
//! Thread-safe for concurrent agent execution; shared via `Arc` and injected
//! into each agent rather than held globally.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = Arc::new(MetricsCollector::new());
//! metrics.increment_counter("agent_calls_total", 1, &[("agent", "recon")]);
//! metrics.record_histogram("agent_duration_seconds", 1.2, &[("agent", "recon")]);
//! println!("{}", metrics.prometheus());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::constants::metrics as metrics_constants;

pub const AGENT_CALLS: &str = "palmer_agent_calls_total";
pub const AGENT_SUCCESSES: &str = "palmer_agent_success_total";
pub const AGENT_FAILURES: &str = "palmer_agent_failure_total";
pub const AGENT_FALLBACKS: &str = "palmer_agent_fallback_total";
pub const AGENT_DURATION: &str = "palmer_agent_duration_seconds";
pub const ANALYSIS_DURATION: &str = "palmer_analysis_duration_seconds";
pub const ANALYSES_TOTAL: &str = "palmer_analyses_total";
pub const ACTIVE_ANALYSES: &str = "palmer_active_analyses";
/// 1 while an agent's circuit breaker is open
pub const AGENT_CIRCUIT_OPEN: &str = "palmer_agent_circuit_open";

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    at: Instant,
}

#[derive(Debug, Default)]
struct MetricsState {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    histograms: BTreeMap<String, VecDeque<Sample>>,
}

/// Thread-safe metrics collector.
pub struct MetricsCollector {
    start_time: Instant,
    histogram_capacity: usize,
    export_window: Duration,
    state: RwLock<MetricsState>,
}

/// Aggregate view of one histogram
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistogramSummary {
    pub count: usize,
    pub latest: Option<f64>,
    pub avg: Option<f64>,
    /// Average over samples inside the export window
    pub avg_recent: Option<f64>,
}

/// Snapshot of all metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
    pub uptime_seconds: f64,
}

/// Per-agent performance figures used by health reports
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PerformanceSummary {
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub fallbacks: u64,
    pub success_rate: f64,
    pub avg_duration_secs: Option<f64>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_limits(
            metrics_constants::HISTOGRAM_CAPACITY,
            Duration::from_secs(metrics_constants::EXPORT_WINDOW_SECS),
        )
    }

    pub fn with_limits(histogram_capacity: usize, export_window: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            histogram_capacity: histogram_capacity.max(1),
            export_window,
            state: RwLock::new(MetricsState::default()),
        }
    }

    pub fn increment_counter(&self, name: &str, value: u64, tags: &[(&str, &str)]) {
        let key = metric_key(name, tags);
        *self.write().counters.entry(key).or_insert(0) += value;
    }

    pub fn set_gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        let key = metric_key(name, tags);
        self.write().gauges.insert(key, value);
    }

    /// Add `delta` to a gauge, starting from zero
    pub fn adjust_gauge(&self, name: &str, delta: f64, tags: &[(&str, &str)]) {
        let key = metric_key(name, tags);
        *self.write().gauges.entry(key).or_insert(0.0) += delta;
    }

    /// Record a histogram sample, evicting the oldest past capacity
    pub fn record_histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        let key = metric_key(name, tags);
        let capacity = self.histogram_capacity;
        let mut state = self.write();
        let samples = state.histograms.entry(key).or_default();
        if samples.len() >= capacity {
            samples.pop_front();
        }
        samples.push_back(Sample {
            value,
            at: Instant::now(),
        });
    }

    pub fn record_analysis_duration(&self, duration: Duration) {
        self.record_histogram(ANALYSIS_DURATION, duration.as_secs_f64(), &[]);
    }

    /// Record the outcome of one resilient agent invocation
    pub fn record_agent_call(&self, agent_id: &str, duration: Duration, success: bool) {
        let tags = [("agent", agent_id)];
        self.increment_counter(AGENT_CALLS, 1, &tags);
        let outcome = if success {
            AGENT_SUCCESSES
        } else {
            AGENT_FAILURES
        };
        self.increment_counter(outcome, 1, &tags);
        self.record_histogram(AGENT_DURATION, duration.as_secs_f64(), &tags);
    }

    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> u64 {
        let key = metric_key(name, tags);
        self.read().counters.get(&key).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str, tags: &[(&str, &str)]) -> Option<f64> {
        let key = metric_key(name, tags);
        self.read().gauges.get(&key).copied()
    }

    pub fn histogram(&self, name: &str, tags: &[(&str, &str)]) -> Option<HistogramSummary> {
        let key = metric_key(name, tags);
        self.read()
            .histograms
            .get(&key)
            .map(|samples| self.summarize(samples))
    }

    pub fn agent_performance(&self, agent_id: &str) -> PerformanceSummary {
        let tags = [("agent", agent_id)];
        let total_calls = self.counter(AGENT_CALLS, &tags);
        let successes = self.counter(AGENT_SUCCESSES, &tags);
        let success_rate = if total_calls > 0 {
            successes as f64 / total_calls as f64
        } else {
            0.0
        };

        PerformanceSummary {
            total_calls,
            successes,
            failures: self.counter(AGENT_FAILURES, &tags),
            fallbacks: self.counter(AGENT_FALLBACKS, &tags),
            success_rate,
            avg_duration_secs: self.histogram(AGENT_DURATION, &tags).and_then(|h| h.avg),
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let state = self.read();
        MetricsSummary {
            counters: state.counters.clone(),
            gauges: state.gauges.clone(),
            histograms: state
                .histograms
                .iter()
                .map(|(k, v)| (k.clone(), self.summarize(v)))
                .collect(),
            uptime_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }

    /// Export in Prometheus text exposition format.
    ///
    /// Histograms are exported as `_avg`/`_count` gauges over samples inside
    /// the export window.
    pub fn prometheus(&self) -> String {
        let state = self.read();
        let mut lines = Vec::new();

        for (key, value) in &state.counters {
            lines.push(format!("# TYPE {} counter", base_name(key)));
            lines.push(format!("{} {}", render_key(key, ""), value));
        }

        for (key, value) in &state.gauges {
            lines.push(format!("# TYPE {} gauge", base_name(key)));
            lines.push(format!("{} {}", render_key(key, ""), value));
        }

        for (key, samples) in &state.histograms {
            let recent = self.recent_values(samples);
            if recent.is_empty() {
                continue;
            }
            let avg = recent.iter().sum::<f64>() / recent.len() as f64;
            let name = base_name(key);
            lines.push(format!("# TYPE {}_avg gauge", name));
            lines.push(format!("{} {}", render_key(key, "_avg"), avg));
            lines.push(format!("# TYPE {}_count gauge", name));
            lines.push(format!("{} {}", render_key(key, "_count"), recent.len()));
        }

        lines.push("# TYPE palmer_uptime_seconds gauge".to_string());
        lines.push(format!(
            "palmer_uptime_seconds {}",
            self.start_time.elapsed().as_secs_f64()
        ));

        lines.join("\n")
    }

    fn summarize(&self, samples: &VecDeque<Sample>) -> HistogramSummary {
        let recent = self.recent_values(samples);
        HistogramSummary {
            count: samples.len(),
            latest: samples.back().map(|s| s.value),
            avg: mean(samples.iter().map(|s| s.value)),
            avg_recent: mean(recent.into_iter()),
        }
    }

    fn recent_values(&self, samples: &VecDeque<Sample>) -> Vec<f64> {
        samples
            .iter()
            .filter(|s| s.at.elapsed() < self.export_window)
            .map(|s| s.value)
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, MetricsState> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::error!("Metrics RwLock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, MetricsState> {
        self.state.write().unwrap_or_else(|poisoned| {
            tracing::error!("Metrics RwLock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// `name` or `name{k="v",...}` with tags sorted by key
fn metric_key(name: &str, tags: &[(&str, &str)]) -> String {
    if tags.is_empty() {
        return name.to_string();
    }
    let mut sorted: Vec<_> = tags.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let labels: Vec<String> = sorted
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v.replace('"', "'")))
        .collect();
    format!("{}{{{}}}", name, labels.join(","))
}

fn base_name(key: &str) -> &str {
    key.split('{').next().unwrap_or(key)
}

/// Insert `suffix` between the metric name and its labels
fn render_key(key: &str, suffix: &str) -> String {
    match key.find('{') {
        Some(idx) => format!("{}{}{}", &key[..idx], suffix, &key[idx..]),
        None => format!("{}{}", key, suffix),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_with_tags() {
        let metrics = MetricsCollector::new();
        metrics.increment_counter("calls", 1, &[("agent", "a")]);
        metrics.increment_counter("calls", 2, &[("agent", "a")]);
        metrics.increment_counter("calls", 1, &[("agent", "b")]);

        assert_eq!(metrics.counter("calls", &[("agent", "a")]), 3);
        assert_eq!(metrics.counter("calls", &[("agent", "b")]), 1);
        assert_eq!(metrics.counter("calls", &[]), 0);
    }

    #[test]
    fn test_metric_key_sorts_tags() {
        assert_eq!(
            metric_key("m", &[("z", "1"), ("a", "2")]),
            "m{a=\"2\",z=\"1\"}"
        );
        assert_eq!(metric_key("m", &[]), "m");
    }

    #[test]
    fn test_gauges() {
        let metrics = MetricsCollector::new();
        metrics.set_gauge("g", 2.5, &[]);
        metrics.adjust_gauge(ACTIVE_ANALYSES, 1.0, &[]);
        metrics.adjust_gauge(ACTIVE_ANALYSES, 1.0, &[]);
        metrics.adjust_gauge(ACTIVE_ANALYSES, -1.0, &[]);

        assert_eq!(metrics.gauge("g", &[]), Some(2.5));
        assert_eq!(metrics.gauge(ACTIVE_ANALYSES, &[]), Some(1.0));
    }

    #[test]
    fn test_histogram_is_bounded() {
        let metrics = MetricsCollector::with_limits(3, Duration::from_secs(300));
        for v in 1..=5 {
            metrics.record_histogram("h", v as f64, &[]);
        }

        let h = metrics.histogram("h", &[]).unwrap();
        assert_eq!(h.count, 3);
        assert_eq!(h.latest, Some(5.0));
        assert_eq!(h.avg, Some(4.0));
    }

    #[test]
    fn test_agent_performance() {
        let metrics = MetricsCollector::new();
        metrics.record_agent_call("recon", Duration::from_millis(500), true);
        metrics.record_agent_call("recon", Duration::from_millis(1500), false);

        let perf = metrics.agent_performance("recon");
        assert_eq!(perf.total_calls, 2);
        assert_eq!(perf.successes, 1);
        assert_eq!(perf.failures, 1);
        assert!((perf.success_rate - 0.5).abs() < 1e-9);
        assert!((perf.avg_duration_secs.unwrap() - 1.0).abs() < 1e-9);

        assert_eq!(metrics.agent_performance("other"), PerformanceSummary::default());
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = MetricsCollector::new();
        metrics.increment_counter(ANALYSES_TOTAL, 1, &[]);
        metrics.record_histogram(AGENT_DURATION, 2.0, &[("agent", "recon")]);

        let text = metrics.prometheus();
        assert!(text.contains("# TYPE palmer_analyses_total counter"));
        assert!(text.contains("palmer_analyses_total 1"));
        assert!(text.contains("palmer_agent_duration_seconds_avg{agent=\"recon\"} 2"));
        assert!(text.contains("palmer_agent_duration_seconds_count{agent=\"recon\"} 1"));
        assert!(text.contains("palmer_uptime_seconds"));
    }

    #[test]
    fn test_summary_serializes() {
        let metrics = MetricsCollector::new();
        metrics.record_analysis_duration(Duration::from_secs(3));
        let json = serde_json::to_value(metrics.summary()).unwrap();
        assert_eq!(json["histograms"][ANALYSIS_DURATION]["count"], 1);
    }
}
