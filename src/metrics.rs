//! Usage metrics for the dashboard: uploads, scored rows and attribution
//! requests.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector shared by all request handlers
pub struct DashboardMetrics {
    /// Uploads that produced a batch
    pub uploads_scored: AtomicU64,
    /// Uploads rejected with an error
    pub uploads_failed: AtomicU64,
    /// Rows scored across all batches
    pub rows_scored: AtomicU64,
    /// Rows predicted fraud across all batches
    pub rows_flagged: AtomicU64,
    /// Attribution requests that completed
    pub explanations: AtomicU64,
    /// Attribution requests that failed
    pub explanation_errors: AtomicU64,
    /// Upload scoring times (in microseconds)
    scoring_times: RwLock<Vec<u64>>,
    /// Attribution times (in microseconds)
    explain_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl DashboardMetrics {
    pub fn new() -> Self {
        Self {
            uploads_scored: AtomicU64::new(0),
            uploads_failed: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            rows_flagged: AtomicU64::new(0),
            explanations: AtomicU64::new(0),
            explanation_errors: AtomicU64::new(0),
            scoring_times: RwLock::new(Vec::with_capacity(1000)),
            explain_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored upload
    pub fn record_upload(&self, elapsed: Duration, probabilities: &[f64], flagged: usize) {
        self.uploads_scored.fetch_add(1, Ordering::Relaxed);
        self.rows_scored
            .fetch_add(probabilities.len() as u64, Ordering::Relaxed);
        self.rows_flagged.fetch_add(flagged as u64, Ordering::Relaxed);
        push_sample(&self.scoring_times, elapsed);

        if let Ok(mut buckets) = self.score_buckets.write() {
            for p in probabilities {
                let bucket = (p * 10.0).clamp(0.0, 9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    pub fn record_upload_failure(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an attribution request
    pub fn record_explanation(&self, elapsed: Duration, ok: bool) {
        if ok {
            self.explanations.fetch_add(1, Ordering::Relaxed);
            push_sample(&self.explain_times, elapsed);
        } else {
            self.explanation_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn scoring_stats(&self) -> LatencyStats {
        LatencyStats::from_samples(&self.scoring_times)
    }

    pub fn explain_stats(&self) -> LatencyStats {
        LatencyStats::from_samples(&self.explain_times)
    }

    pub fn score_distribution(&self) -> [u64; 10] {
        self.score_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Point-in-time copy for the health endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            uploads_scored: self.uploads_scored.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            rows_scored: self.rows_scored.load(Ordering::Relaxed),
            rows_flagged: self.rows_flagged.load(Ordering::Relaxed),
            explanations: self.explanations.load(Ordering::Relaxed),
            explanation_errors: self.explanation_errors.load(Ordering::Relaxed),
            scoring: self.scoring_stats(),
            explain: self.explain_stats(),
            score_distribution: self.score_distribution(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let s = self.snapshot();
        let flag_rate = if s.rows_scored > 0 {
            (s.rows_flagged as f64 / s.rows_scored as f64) * 100.0
        } else {
            0.0
        };

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             JOB FRAUD DASHBOARD - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Uploads Scored: {:>8}  │  Uploads Failed: {:>8}         ║",
            s.uploads_scored, s.uploads_failed
        );
        info!(
            "║ Rows Scored:    {:>8}  │  Flagged: {:>6.1}%               ║",
            s.rows_scored, flag_rate
        );
        info!(
            "║ Explanations:   {:>8}  │  Failed: {:>8}                 ║",
            s.explanations, s.explanation_errors
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Scoring (μs): mean={:>7} p50={:>7} p95={:>7} p99={:>7} ║",
            s.scoring.mean_us, s.scoring.p50_us, s.scoring.p95_us, s.scoring.p99_us
        );
        info!(
            "║ Explain (μs): mean={:>7} p50={:>7} p95={:>7} p99={:>7} ║",
            s.explain.mean_us, s.explain.p50_us, s.explain.p95_us, s.explain.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        let total: u64 = s.score_distribution.iter().sum();
        for (i, &count) in s.score_distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_sample(samples: &RwLock<Vec<u64>>, elapsed: Duration) {
    if let Ok(mut times) = samples.write() {
        times.push(elapsed.as_micros() as u64);
        // Keep only the most recent half once full
        if times.len() > MAX_SAMPLES {
            times.drain(0..MAX_SAMPLES / 2);
        }
    }
}

/// Latency percentiles over the retained samples
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &RwLock<Vec<u64>>) -> Self {
        let mut sorted = match samples.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return Self::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        Self {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }
}

/// Serializable view of the counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub uploads_scored: u64,
    pub uploads_failed: u64,
    pub rows_scored: u64,
    pub rows_flagged: u64,
    pub explanations: u64,
    pub explanation_errors: u64,
    pub scoring: LatencyStats,
    pub explain: LatencyStats,
    pub score_distribution: [u64; 10],
}

/// Prints a summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<DashboardMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<DashboardMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task. An interval of zero disables it.
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
