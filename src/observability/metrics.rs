//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Track request counters, latency histograms, and gauges by label tuple
//! - Expose a Prometheus-compatible text snapshot
//! - Stay correct under unbounded concurrent writers
//!
//! # Metrics
//! - `http_requests_total` (counter): total requests by method, path, outcome
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_requests_active` (gauge): requests currently in flight
//!
//! # Design Decisions
//! - Counters and gauges are atomics; no lost updates, no locks on the hot path
//! - Each histogram series sits behind its own mutex so a snapshot never
//!   observes a torn (count, sum, buckets) triple
//! - Series are created lazily on first observation; none are ever deleted
//! - Export output is sorted (name, then labels) so two exports with no
//!   intervening writes are byte-identical

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;

/// Bucket boundaries for latency histograms, in seconds.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Identity of one time series: metric name plus its label tuple.
///
/// Labels are sorted at construction so `[("a","1"),("b","2")]` and
/// `[("b","2"),("a","1")]` address the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }

    /// Render the label tuple as `{k="v",...}`, or empty for no labels.
    fn render_labels(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }
        let inner = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{}}}", inner)
    }

    /// Like `render_labels`, but with an `le` bucket label prepended.
    fn render_labels_with_le(&self, le: &str) -> String {
        let mut parts = vec![format!("le=\"{}\"", le)];
        parts.extend(self.labels.iter().map(|(k, v)| format!("{}=\"{}\"", k, v)));
        format!("{{{}}}", parts.join(","))
    }
}

/// One histogram series: per-bucket counts plus running count and sum.
///
/// Buckets hold non-cumulative counts internally; export accumulates them,
/// which makes the cumulative-monotonic invariant hold by construction.
#[derive(Debug)]
struct HistogramSeries {
    buckets: Vec<u64>,
    count: u64,
    sum: f64,
}

impl HistogramSeries {
    fn new() -> Self {
        Self {
            buckets: vec![0; LATENCY_BUCKETS.len()],
            count: 0,
            sum: 0.0,
        }
    }

    fn observe(&mut self, value: f64) {
        for (i, bound) in LATENCY_BUCKETS.iter().enumerate() {
            if value <= *bound {
                self.buckets[i] += 1;
                break;
            }
        }
        // Values above the last bound land only in the implicit +Inf bucket.
        self.count += 1;
        self.sum += value;
    }
}

/// Process-wide metrics registry.
///
/// One instance is created at startup and handed to every component that
/// records metrics. All mutation operations are total: an unknown metric
/// name creates the series rather than failing.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<SeriesKey, AtomicU64>,
    gauges: DashMap<SeriesKey, AtomicI64>,
    histograms: DashMap<SeriesKey, Mutex<HistogramSeries>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to a counter, creating the series on first use.
    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)], delta: u64) {
        let key = SeriesKey::new(name, labels);
        self.counters
            .entry(key)
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Record one observation into a histogram series.
    pub fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let key = SeriesKey::new(name, labels);
        let series = self
            .histograms
            .entry(key)
            .or_insert_with(|| Mutex::new(HistogramSeries::new()));
        // Poisoning only happens if a panic occurred mid-observe; the data
        // is still structurally sound, so keep serving it.
        let mut guard = match series.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.observe(value);
    }

    /// Set a gauge to an absolute value (last write wins).
    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: i64) {
        let key = SeriesKey::new(name, labels);
        self.gauges
            .entry(key)
            .or_default()
            .store(value, Ordering::Relaxed);
    }

    /// Adjust a gauge by a signed delta.
    pub fn add_to_gauge(&self, name: &str, labels: &[(&str, &str)], delta: i64) {
        let key = SeriesKey::new(name, labels);
        self.gauges
            .entry(key)
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value of a counter series, or 0 if it does not exist.
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = SeriesKey::new(name, labels);
        self.counters
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Current value of a gauge series, or 0 if it does not exist.
    pub fn gauge_value(&self, name: &str, labels: &[(&str, &str)]) -> i64 {
        let key = SeriesKey::new(name, labels);
        self.gauges
            .get(&key)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of a counter across all label tuples sharing `name`.
    pub fn counter_family_sum(&self, name: &str) -> u64 {
        self.counters
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Render all series in Prometheus text exposition format.
    ///
    /// Reads never mutate registry state. Each series value is read
    /// atomically (or under its mutex), so no single series is ever torn,
    /// though series written concurrently with the export may reflect any
    /// prefix of their writes.
    pub fn export(&self) -> String {
        let mut out = String::new();

        // Counters, grouped by family in sorted order.
        let mut counters: BTreeMap<SeriesKey, u64> = BTreeMap::new();
        for entry in self.counters.iter() {
            counters.insert(entry.key().clone(), entry.value().load(Ordering::Relaxed));
        }
        let mut last_family = "";
        for (key, value) in &counters {
            if key.name != last_family {
                let _ = writeln!(out, "# TYPE {} counter", key.name);
            }
            let _ = writeln!(out, "{}{} {}", key.name, key.render_labels(), value);
            last_family = &key.name;
        }

        // Gauges.
        let mut gauges: BTreeMap<SeriesKey, i64> = BTreeMap::new();
        for entry in self.gauges.iter() {
            gauges.insert(entry.key().clone(), entry.value().load(Ordering::Relaxed));
        }
        let mut last_family = "";
        for (key, value) in &gauges {
            if key.name != last_family {
                let _ = writeln!(out, "# TYPE {} gauge", key.name);
            }
            let _ = writeln!(out, "{}{} {}", key.name, key.render_labels(), value);
            last_family = &key.name;
        }

        // Histograms: cumulative buckets, then sum and count.
        let mut histogram_keys: Vec<SeriesKey> =
            self.histograms.iter().map(|e| e.key().clone()).collect();
        histogram_keys.sort();
        let mut last_family = String::new();
        for key in histogram_keys {
            let Some(series) = self.histograms.get(&key) else {
                continue;
            };
            let (buckets, count, sum) = {
                let guard = match series.lock() {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
                (guard.buckets.clone(), guard.count, guard.sum)
            };

            if key.name != last_family {
                let _ = writeln!(out, "# TYPE {} histogram", key.name);
                last_family = key.name.clone();
            }

            let mut cumulative = 0u64;
            for (i, bound) in LATENCY_BUCKETS.iter().enumerate() {
                cumulative += buckets[i];
                let _ = writeln!(
                    out,
                    "{}_bucket{} {}",
                    key.name,
                    key.render_labels_with_le(&bound.to_string()),
                    cumulative
                );
            }
            let _ = writeln!(
                out,
                "{}_bucket{} {}",
                key.name,
                key.render_labels_with_le("+Inf"),
                count
            );
            let _ = writeln!(out, "{}_sum{} {}", key.name, key.render_labels(), sum);
            let _ = writeln!(out, "{}_count{} {}", key.name, key.render_labels(), count);
        }

        out
    }
}
