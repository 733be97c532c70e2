//! Performance monitoring for gateway and vault operations
//!
//! Aggregates timed observations into per-operation statistics, classifies
//! overall health, and produces advisory recommendations:
//! - [`PerformanceMonitor::start_timer`] returns a guard that records exactly
//!   one measurement per logical operation, across every exit path
//! - Accessors return defensive copies, never the live aggregates
//! - [`PerformanceMonitor::generate_report`] and
//!   [`PerformanceMonitor::export_metrics`] produce point-in-time snapshots
//!   suitable for logging sinks
//!
//! The monitor observes; it never fails an operation. Recording paths have no
//! error returns.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Latency threshold applied when no per-operation threshold is configured
const DEFAULT_THRESHOLD: Duration = Duration::from_secs(1);

/// Per-operation aggregate statistics.
///
/// Returned by value from every accessor; mutating a copy has no effect on
/// the monitor's own state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetric {
    /// Operation name the aggregate is keyed by
    pub name: String,
    /// Number of observations
    pub count: u64,
    /// Cumulative duration across all observations
    pub total_duration: Duration,
    /// Shortest observed duration
    pub min_duration: Duration,
    /// Longest observed duration
    pub max_duration: Duration,
    /// Mean duration (`total / count`)
    pub avg_duration: Duration,
    /// Most recent observed duration
    pub last_duration: Duration,
    /// Observations flagged as errors
    pub errors: u64,
    /// Wall-clock time of the most recent observation
    pub last_updated: DateTime<Utc>,
}

impl OperationMetric {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            avg_duration: Duration::ZERO,
            last_duration: Duration::ZERO,
            errors: 0,
            last_updated: Utc::now(),
        }
    }

    fn observe(&mut self, duration: Duration, is_error: bool) {
        if self.count == 0 {
            self.min_duration = duration;
            self.max_duration = duration;
        } else {
            self.min_duration = self.min_duration.min(duration);
            self.max_duration = self.max_duration.max(duration);
        }
        self.count += 1;
        self.total_duration += duration;
        self.avg_duration =
            Duration::from_secs_f64(self.total_duration.as_secs_f64() / self.count as f64);
        self.last_duration = duration;
        if is_error {
            self.errors += 1;
        }
        self.last_updated = Utc::now();
    }

    /// Percentage of observations that were not errors
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            100.0
        } else {
            (self.count - self.errors) as f64 / self.count as f64 * 100.0
        }
    }
}

/// Overall health classification derived from aggregate error and slow rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthRating {
    /// Error rate < 5% and slow-operation rate < 20%
    Excellent,
    /// Error rate < 10% and slow-operation rate < 40%
    Good,
    /// Error rate < 20% and slow-operation rate < 60%
    Fair,
    /// Anything worse
    Poor,
    /// No operations recorded yet
    NoData,
}

impl fmt::Display for HealthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::NoData => "no data",
        };
        f.write_str(label)
    }
}

/// Point-in-time report produced by [`PerformanceMonitor::generate_report`]
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Time since the monitor was created
    pub uptime: Duration,
    /// Total observations across all operations
    pub total_operations: u64,
    /// Overall health classification
    pub health: HealthRating,
    /// Copies of every tracked metric, ordered by operation name
    pub metrics: Vec<OperationMetric>,
    /// Advisory findings; never automatically actioned
    pub recommendations: Vec<String>,
}

/// Aggregate counters included in [`MetricsExport`]
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    /// Distinct operation names tracked
    pub tracked_operations: usize,
    /// Total observations
    pub total_operations: u64,
    /// Total error observations
    pub total_errors: u64,
    /// Percentage of observations that were not errors
    pub overall_success_rate: f64,
}

/// Serializable snapshot for external metrics/logging sinks
#[derive(Debug, Clone, Serialize)]
pub struct MetricsExport {
    /// Snapshot wall-clock time
    pub timestamp: DateTime<Utc>,
    /// Time since the monitor was created
    pub uptime: Duration,
    /// Overall health classification
    pub health: HealthRating,
    /// Copies of every tracked metric, ordered by operation name
    pub metrics: Vec<OperationMetric>,
    /// Advisory findings
    pub recommendations: Vec<String>,
    /// Aggregate counters
    pub summary: SummaryStats,
}

/// Timer guard returned by [`PerformanceMonitor::start_timer`].
///
/// Records exactly one measurement: either when [`Self::stop`] consumes the
/// guard with an explicit error flag, or as a success when the guard is
/// dropped on an exit path that never reached `stop`. A second stop is
/// unrepresentable, so doubled observations cannot occur.
#[derive(Debug)]
pub struct OperationTimer<'m> {
    monitor: &'m PerformanceMonitor,
    name: String,
    started: Instant,
    armed: bool,
}

impl OperationTimer<'_> {
    /// Record the elapsed time with the given error flag
    pub fn stop(mut self, is_error: bool) {
        self.armed = false;
        self.monitor
            .record_metric(&self.name, self.started.elapsed(), is_error);
    }

    /// Elapsed time so far, without recording
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.monitor
                .record_metric(&self.name, self.started.elapsed(), false);
        }
    }
}

/// Performance monitor for instrumented call sites
#[derive(Debug)]
pub struct PerformanceMonitor {
    started: Instant,
    metrics: RwLock<HashMap<String, OperationMetric>>,
    thresholds: RwLock<HashMap<String, Duration>>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    /// Create a monitor with default per-class thresholds
    pub fn new() -> Self {
        let mut thresholds = HashMap::new();
        // Operation classes with expectations far from the global default.
        thresholds.insert("vault.health_check".to_string(), Duration::from_millis(250));
        thresholds.insert("vault.search".to_string(), Duration::from_secs(2));
        thresholds.insert("gateway.stream_get".to_string(), Duration::from_secs(5));

        Self {
            started: Instant::now(),
            metrics: RwLock::new(HashMap::new()),
            thresholds: RwLock::new(thresholds),
        }
    }

    /// Begin timing an operation; the returned guard records on stop or drop
    pub fn start_timer(&self, operation: impl Into<String>) -> OperationTimer<'_> {
        OperationTimer {
            monitor: self,
            name: operation.into(),
            started: Instant::now(),
            armed: true,
        }
    }

    /// Record a measurement taken by the caller
    pub fn record_metric(&self, operation: &str, duration: Duration, is_error: bool) {
        let mut metrics = self.metrics.write();
        metrics
            .entry(operation.to_string())
            .or_insert_with(|| OperationMetric::new(operation))
            .observe(duration, is_error);
    }

    /// Copy of one operation's aggregate, if it has been observed
    pub fn metric(&self, operation: &str) -> Option<OperationMetric> {
        self.metrics.read().get(operation).cloned()
    }

    /// Copies of all aggregates, ordered by operation name
    pub fn all_metrics(&self) -> Vec<OperationMetric> {
        let mut metrics: Vec<OperationMetric> = self.metrics.read().values().cloned().collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }

    /// Set the latency threshold for one operation
    pub fn set_threshold(&self, operation: impl Into<String>, threshold: Duration) {
        self.thresholds.write().insert(operation.into(), threshold);
    }

    /// Threshold for an operation, falling back to the global default
    pub fn threshold(&self, operation: &str) -> Duration {
        self.thresholds
            .read()
            .get(operation)
            .copied()
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    /// Produce a point-in-time report with health and recommendations
    pub fn generate_report(&self) -> PerformanceReport {
        let metrics = self.all_metrics();
        let total_operations = metrics.iter().map(|m| m.count).sum();

        PerformanceReport {
            generated_at: Utc::now(),
            uptime: self.started.elapsed(),
            total_operations,
            health: self.classify(&metrics),
            recommendations: self.recommendations(&metrics),
            metrics,
        }
    }

    /// Produce a serializable snapshot for an external sink
    pub fn export_metrics(&self) -> MetricsExport {
        let metrics = self.all_metrics();
        let total_operations: u64 = metrics.iter().map(|m| m.count).sum();
        let total_errors: u64 = metrics.iter().map(|m| m.errors).sum();
        let overall_success_rate = if total_operations == 0 {
            100.0
        } else {
            (total_operations - total_errors) as f64 / total_operations as f64 * 100.0
        };

        MetricsExport {
            timestamp: Utc::now(),
            uptime: self.started.elapsed(),
            health: self.classify(&metrics),
            recommendations: self.recommendations(&metrics),
            summary: SummaryStats {
                tracked_operations: metrics.len(),
                total_operations,
                total_errors,
                overall_success_rate,
            },
            metrics,
        }
    }

    /// Discard all aggregates. Thresholds and uptime are preserved.
    pub fn reset(&self) {
        self.metrics.write().clear();
    }

    fn classify(&self, metrics: &[OperationMetric]) -> HealthRating {
        let total: u64 = metrics.iter().map(|m| m.count).sum();
        if total == 0 {
            return HealthRating::NoData;
        }

        let errors: u64 = metrics.iter().map(|m| m.errors).sum();
        let error_rate = errors as f64 / total as f64;
        let slow = metrics
            .iter()
            .filter(|m| m.avg_duration > self.threshold(&m.name))
            .count();
        let slow_rate = slow as f64 / metrics.len() as f64;

        if error_rate < 0.05 && slow_rate < 0.20 {
            HealthRating::Excellent
        } else if error_rate < 0.10 && slow_rate < 0.40 {
            HealthRating::Good
        } else if error_rate < 0.20 && slow_rate < 0.60 {
            HealthRating::Fair
        } else {
            HealthRating::Poor
        }
    }

    fn recommendations(&self, metrics: &[OperationMetric]) -> Vec<String> {
        let mut findings = Vec::new();

        for metric in metrics {
            let success_rate = metric.success_rate();
            if success_rate < 90.0 {
                findings.push(format!(
                    "Operation '{}' success rate is {:.1}% (below 90%); investigate failures",
                    metric.name, success_rate
                ));
            }
            let threshold = self.threshold(&metric.name);
            if metric.avg_duration > threshold {
                findings.push(format!(
                    "Operation '{}' averages {:?} against a {:?} threshold; consider caching or a longer timeout tier",
                    metric.name, metric.avg_duration, threshold
                ));
            }
            if metric.min_duration > Duration::ZERO
                && metric.max_duration >= metric.min_duration * 10
            {
                findings.push(format!(
                    "Operation '{}' shows high variance (min {:?}, max {:?})",
                    metric.name, metric.min_duration, metric.max_duration
                ));
            }
        }

        if findings.is_empty() && !metrics.is_empty() {
            findings.push("All tracked operations are within acceptable limits".to_string());
        }
        findings
    }
}
