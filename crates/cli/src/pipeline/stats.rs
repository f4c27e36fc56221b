//! Survey run statistics.

use std::time::Duration;

use contracts::CalibrationBaseline;
use dispatcher::MetricsSnapshot;
use observability::SurveyStatsAggregator;

/// Statistics from a survey run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Session id stamped on every snapshot
    pub session_id: String,

    /// Total duration of the run, calibration included
    pub duration: Duration,

    /// Baseline captured at startup
    pub calibration: Option<CalibrationBaseline>,

    /// Last analysis tick
    pub last_tick: u64,

    /// Snapshots dropped because the orchestrator output queue was full
    pub snapshots_dropped: u64,

    /// Per-activity `(name, iterations, faults)`
    pub activities: Vec<(&'static str, u64, u64)>,

    /// Per-sink counters
    pub sinks: Vec<(String, MetricsSnapshot)>,

    /// Activities that missed the shutdown deadline
    pub stuck_activities: Vec<String>,

    /// Aggregated snapshot statistics
    pub survey: SurveyStatsAggregator,
}

impl PipelineStats {
    /// Snapshots received per second
    pub fn snapshot_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.survey.total_snapshots as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Total faults across every activity
    pub fn total_faults(&self) -> u64 {
        self.activities.iter().map(|(_, _, faults)| faults).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        println!("Session {}", self.session_id);
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Ticks: {}", self.last_tick);
        println!("  Snapshot rate: {:.2}/s", self.snapshot_rate());
        println!("  Snapshots dropped: {}", self.snapshots_dropped);
        if let Some(baseline) = self.calibration {
            println!(
                "  Calibration: {:.3} g, {:.1} mm to ground, {}",
                baseline.accel_baseline_g, baseline.ground_distance_baseline_mm, baseline.orientation
            );
        }

        println!("\nActivities:");
        for (name, iterations, faults) in &self.activities {
            println!("  {name}: {iterations} iterations, {faults} faults");
        }
        if !self.stuck_activities.is_empty() {
            println!("  did not stop in time: {}", self.stuck_activities.join(", "));
        }

        println!("\nSinks:");
        for (name, metrics) in &self.sinks {
            println!("  {name}: {metrics}");
        }

        println!("\n{}", self.survey.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            duration: Duration::from_secs(4),
            activities: vec![("scan", 40, 1), ("analysis", 20, 2)],
            survey: SurveyStatsAggregator {
                total_snapshots: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(stats.snapshot_rate(), 2.5);
        assert_eq!(stats.total_faults(), 3);
    }

    #[test]
    fn test_zero_duration() {
        assert_eq!(PipelineStats::default().snapshot_rate(), 0.0);
    }
}
