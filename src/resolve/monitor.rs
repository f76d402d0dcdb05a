//! In-process resolution timings: per-stage counts, latency, target misses
//! and the slowest questions seen since start-up.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use super::types::Fingerprint;
use super::Stage;

/// How many slow resolutions are kept for inspection.
pub const SLOWEST_KEPT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SlowQuery {
    pub fingerprint: Fingerprint,
    pub stage: Stage,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub total: usize,
    /// Resolutions per stage name, only for stages that occurred.
    pub by_stage: BTreeMap<&'static str, usize>,
    pub mean_elapsed: Duration,
    pub max_elapsed: Duration,
    pub target_misses: usize,
    /// Slowest first.
    pub slowest: Vec<SlowQuery>,
}

#[derive(Default)]
struct Totals {
    total: usize,
    by_stage: BTreeMap<&'static str, usize>,
    elapsed_sum: Duration,
    max_elapsed: Duration,
    target_misses: usize,
    slowest: Vec<SlowQuery>,
}

#[derive(Default)]
pub struct PerformanceMonitor {
    totals: Mutex<Totals>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, fingerprint: &Fingerprint, stage: Stage, elapsed: Duration, target_met: bool) {
        let mut totals = self.totals.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        totals.total += 1;
        *totals.by_stage.entry(stage.as_str()).or_insert(0) += 1;
        totals.elapsed_sum += elapsed;
        totals.max_elapsed = totals.max_elapsed.max(elapsed);
        if !target_met {
            totals.target_misses += 1;
        }

        let slow_enough = totals.slowest.len() < SLOWEST_KEPT
            || totals.slowest.last().is_some_and(|s| elapsed > s.elapsed);
        if slow_enough {
            totals.slowest.push(SlowQuery {
                fingerprint: fingerprint.clone(),
                stage,
                elapsed,
            });
            totals.slowest.sort_by(|a, b| b.elapsed.cmp(&a.elapsed));
            totals.slowest.truncate(SLOWEST_KEPT);
        }
    }

    pub fn snapshot(&self) -> PerformanceStats {
        let totals = self.totals.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mean_elapsed = if totals.total == 0 {
            Duration::ZERO
        } else {
            totals.elapsed_sum / totals.total as u32
        };
        PerformanceStats {
            total: totals.total,
            by_stage: totals.by_stage.clone(),
            mean_elapsed,
            max_elapsed: totals.max_elapsed,
            target_misses: totals.target_misses,
            slowest: totals.slowest.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = PerformanceMonitor::new().snapshot();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.mean_elapsed, Duration::ZERO);
        assert!(stats.slowest.is_empty());
    }

    #[test]
    fn test_aggregates_stages_latency_and_misses() {
        let monitor = PerformanceMonitor::new();
        monitor.record(&Fingerprint::of("a"), Stage::Cache, ms(10), true);
        monitor.record(&Fingerprint::of("b"), Stage::BroadSearch, ms(3000), true);
        monitor.record(&Fingerprint::of("c"), Stage::Generative, ms(9000), false);
        monitor.record(&Fingerprint::of("d"), Stage::Cache, ms(20), true);

        let stats = monitor.snapshot();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_stage.get("cache"), Some(&2));
        assert_eq!(stats.by_stage.get("generative"), Some(&1));
        assert_eq!(stats.by_stage.get("patch"), None);
        assert_eq!(stats.mean_elapsed, ms(3007) + Duration::from_micros(500));
        assert_eq!(stats.max_elapsed, ms(9000));
        assert_eq!(stats.target_misses, 1);
        assert_eq!(stats.slowest[0].fingerprint, Fingerprint::of("c"));
        assert_eq!(stats.slowest[0].stage, Stage::Generative);
    }

    #[test]
    fn test_keeps_only_the_slowest() {
        let monitor = PerformanceMonitor::new();
        for i in 0..(SLOWEST_KEPT as u64 + 3) {
            monitor.record(&Fingerprint::of(&i.to_string()), Stage::FastLocal, ms(i * 100), true);
        }
        let slowest = monitor.snapshot().slowest;
        assert_eq!(slowest.len(), SLOWEST_KEPT);
        assert_eq!(slowest[0].elapsed, ms((SLOWEST_KEPT as u64 + 2) * 100));
        assert!(slowest.windows(2).all(|w| w[0].elapsed >= w[1].elapsed));
        assert!(slowest.iter().all(|s| s.elapsed >= ms(300)));
    }
}
