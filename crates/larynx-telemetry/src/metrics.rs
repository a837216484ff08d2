use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Type of metric.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// One metric value at snapshot time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<HistogramSummary>,
}

/// All metrics captured at one instant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub captured_at: String,
    pub samples: Vec<MetricSample>,
}

struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge that can go up or down; stored as f64 bits.
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn new() -> Self {
        Self {
            value: AtomicI64::new(0f64.to_bits() as i64),
        }
    }
    fn increment(&self, delta: f64) {
        loop {
            let current = self.value.load(Ordering::Relaxed);
            let next = f64::from_bits(current as u64) + delta;
            if self
                .value
                .compare_exchange_weak(
                    current,
                    next.to_bits() as i64,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }
    }
    fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed) as u64)
    }
}

/// Most recent observations kept for percentile computation.
const HISTOGRAM_WINDOW: usize = 1024;

/// Lifetime count and sum, percentiles over the last [`HISTOGRAM_WINDOW`]
/// observations.
struct Histogram {
    state: Mutex<HistogramState>,
}

struct HistogramState {
    window: Vec<f64>,
    next: usize,
    count: u64,
    sum: f64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            state: Mutex::new(HistogramState {
                window: Vec::new(),
                next: 0,
                count: 0,
                sum: 0.0,
            }),
        }
    }
    fn observe(&self, value: f64) {
        let mut state = self.state.lock();
        if state.window.len() < HISTOGRAM_WINDOW {
            state.window.push(value);
        } else {
            let slot = state.next;
            state.window[slot] = value;
        }
        state.next = (state.next + 1) % HISTOGRAM_WINDOW;
        state.count += 1;
        state.sum += value;
    }
    #[cfg(test)]
    fn retained(&self) -> usize {
        self.state.lock().window.len()
    }
    fn summary(&self) -> HistogramSummary {
        let (mut obs, count, sum) = {
            let state = self.state.lock();
            (state.window.clone(), state.count, state.sum)
        };
        if obs.is_empty() {
            return HistogramSummary::default();
        }
        obs.sort_by(|a, b| a.total_cmp(b));
        let len = obs.len();
        let at = |q: f64| obs[((len as f64 * q) as usize).min(len - 1)];
        HistogramSummary {
            count,
            sum,
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
        }
    }
}

/// Summary statistics from a histogram.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Metric key: name + labels sorted by label name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct MetricKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut sorted: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.to_string(),
            labels: sorted,
        }
    }

    fn labels_map(&self) -> HashMap<String, String> {
        self.labels.iter().cloned().collect()
    }
}

/// Thread-safe in-process metrics recorder.
#[derive(Default)]
pub struct MetricsRecorder {
    counters: RwLock<HashMap<MetricKey, Counter>>,
    gauges: RwLock<HashMap<MetricKey, Gauge>>,
    histograms: RwLock<HashMap<MetricKey, Histogram>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_inc(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        let key = MetricKey::new(name, labels);
        if let Some(counter) = self.counters.read().get(&key) {
            counter.increment(n);
            return;
        }
        self.counters
            .write()
            .entry(key)
            .or_insert_with(Counter::new)
            .increment(n);
    }

    pub fn gauge_inc(&self, name: &str, labels: &[(&str, &str)], delta: f64) {
        let key = MetricKey::new(name, labels);
        if let Some(gauge) = self.gauges.read().get(&key) {
            gauge.increment(delta);
            return;
        }
        self.gauges
            .write()
            .entry(key)
            .or_insert_with(Gauge::new)
            .increment(delta);
    }

    pub fn histogram_observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let key = MetricKey::new(name, labels);
        if let Some(histogram) = self.histograms.read().get(&key) {
            histogram.observe(value);
            return;
        }
        self.histograms
            .write()
            .entry(key)
            .or_insert_with(Histogram::new)
            .observe(value);
    }

    pub fn counter_get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = MetricKey::new(name, labels);
        self.counters.read().get(&key).map_or(0, Counter::get)
    }

    #[cfg(test)]
    fn gauge_get(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let key = MetricKey::new(name, labels);
        self.gauges.read().get(&key).map_or(0.0, Gauge::get)
    }

    #[cfg(test)]
    fn histogram_summary(&self, name: &str, labels: &[(&str, &str)]) -> HistogramSummary {
        let key = MetricKey::new(name, labels);
        self.histograms
            .read()
            .get(&key)
            .map(Histogram::summary)
            .unwrap_or_default()
    }

    /// Capture every metric, sorted by name.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut samples = Vec::new();

        for (key, counter) in self.counters.read().iter() {
            samples.push(MetricSample {
                name: key.name.clone(),
                labels: key.labels_map(),
                metric_type: MetricType::Counter,
                value: counter.get() as f64,
                summary: None,
            });
        }
        for (key, gauge) in self.gauges.read().iter() {
            samples.push(MetricSample {
                name: key.name.clone(),
                labels: key.labels_map(),
                metric_type: MetricType::Gauge,
                value: gauge.get(),
                summary: None,
            });
        }
        for (key, histogram) in self.histograms.read().iter() {
            let summary = histogram.summary();
            samples.push(MetricSample {
                name: key.name.clone(),
                labels: key.labels_map(),
                metric_type: MetricType::Histogram,
                value: summary.count as f64,
                summary: Some(summary),
            });
        }

        samples.sort_by(|a, b| a.name.cmp(&b.name));
        MetricsSnapshot {
            captured_at: Utc::now().to_rfc3339(),
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counter_basic() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("generate.requests.total", &[("outcome", "success")], 1);
        recorder.counter_inc("generate.requests.total", &[("outcome", "success")], 1);
        recorder.counter_inc("generate.requests.total", &[("outcome", "unavailable")], 1);

        assert_eq!(recorder.counter_get("generate.requests.total", &[("outcome", "success")]), 2);
        assert_eq!(
            recorder.counter_get("generate.requests.total", &[("outcome", "unavailable")]),
            1
        );
        assert_eq!(recorder.counter_get("generate.requests.total", &[("outcome", "failure")]), 0);
    }

    #[test]
    fn gauge_increment() {
        let recorder = MetricsRecorder::new();
        recorder.gauge_inc("generate.in_flight", &[], 1.0);
        recorder.gauge_inc("generate.in_flight", &[], 1.0);
        recorder.gauge_inc("generate.in_flight", &[], -1.0);
        assert_eq!(recorder.gauge_get("generate.in_flight", &[]), 1.0);
    }

    #[test]
    fn histogram_observations() {
        let recorder = MetricsRecorder::new();
        let labels = &[("strategy", "rules")];
        for v in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0] {
            recorder.histogram_observe("generate.duration_ms", labels, v);
        }

        let summary = recorder.histogram_summary("generate.duration_ms", labels);
        assert_eq!(summary.count, 10);
        assert_eq!(summary.sum, 550.0);
        assert!(summary.p50 >= 50.0 && summary.p50 <= 60.0);
        assert!(summary.p95 >= 90.0);
    }

    #[test]
    fn histogram_retention_is_bounded() {
        let recorder = MetricsRecorder::new();
        for i in 0..200_000 {
            recorder.histogram_observe("generate.duration_ms", &[], f64::from(i % 100));
        }
        let key = MetricKey::new("generate.duration_ms", &[]);
        let retained = recorder.histograms.read().get(&key).map(Histogram::retained);
        assert_eq!(retained, Some(HISTOGRAM_WINDOW));

        let summary = recorder.histogram_summary("generate.duration_ms", &[]);
        assert_eq!(summary.count, 200_000);
        assert_eq!(summary.sum, 2000.0 * 4950.0);
        assert!(summary.p50 >= 40.0 && summary.p50 <= 60.0);
    }

    #[test]
    fn histogram_percentiles_track_recent_window() {
        let recorder = MetricsRecorder::new();
        for _ in 0..HISTOGRAM_WINDOW {
            recorder.histogram_observe("latency", &[], 1000.0);
        }
        for _ in 0..HISTOGRAM_WINDOW {
            recorder.histogram_observe("latency", &[], 5.0);
        }
        let summary = recorder.histogram_summary("latency", &[]);
        assert_eq!(summary.p99, 5.0);
        assert_eq!(summary.count, 2 * HISTOGRAM_WINDOW as u64);
    }

    #[test]
    fn histogram_empty() {
        let recorder = MetricsRecorder::new();
        assert_eq!(recorder.histogram_summary("nonexistent", &[]), HistogramSummary::default());
    }

    #[test]
    fn label_ordering_independent() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("m", &[("a", "1"), ("b", "2")], 1);
        recorder.counter_inc("m", &[("b", "2"), ("a", "1")], 1);
        assert_eq!(recorder.counter_get("m", &[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn snapshot_lists_all_kinds() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("generate.tokens.total", &[("strategy", "model")], 42);
        recorder.gauge_inc("generate.in_flight", &[], 0.0);
        recorder.histogram_observe("generate.duration_ms", &[], 12.5);

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.samples.len(), 3);
        let names: Vec<&str> = snapshot.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["generate.duration_ms", "generate.in_flight", "generate.tokens.total"]);

        let tokens = &snapshot.samples[2];
        assert_eq!(tokens.metric_type, MetricType::Counter);
        assert_eq!(tokens.value, 42.0);
        assert_eq!(tokens.labels.get("strategy").map(String::as_str), Some("model"));
        assert!(snapshot.samples[0].summary.is_some());
    }

    #[test]
    fn concurrent_counter_increments() {
        let recorder = Arc::new(MetricsRecorder::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        r.counter_inc("concurrent", &[], 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(recorder.counter_get("concurrent", &[]), 8000);
    }
}
