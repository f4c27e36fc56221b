//! 路面质量指标收集模块
//!
//! 基于 `FusionSnapshot` 收集和统计融合核心的运行指标。

use std::collections::HashMap;

use contracts::{FusionSnapshot, RoadQuality, Severity, SnapshotTrigger};
use metrics::{counter, gauge, histogram};

/// 从 FusionSnapshot 记录指标
///
/// 每次分析周期或轨迹触发产生快照时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_snapshot_metrics;
///
/// let snapshot = store.snapshot(SnapshotTrigger::Analysis);
/// record_snapshot_metrics(&snapshot);
/// ```
pub fn record_snapshot_metrics(snapshot: &FusionSnapshot) {
    let trigger = match snapshot.trigger {
        SnapshotTrigger::Analysis => "analysis",
        SnapshotTrigger::Track => "track",
    };
    counter!("road_quality_snapshots_total", "trigger" => trigger).increment(1);
    gauge!("road_quality_last_tick").set(snapshot.tick as f64);

    // 路面质量
    let quality = &snapshot.quality;
    gauge!("road_quality_score").set(f64::from(quality.quality_score));
    counter!(
        "road_quality_classifications_total",
        "quality" => quality.quality.as_str()
    )
    .increment(1);
    if quality.quality.is_measured() {
        histogram!("road_quality_roughness_index").record(quality.roughness_index);
        histogram!("road_quality_score_hist").record(f64::from(quality.quality_score));
    }
    gauge!("road_quality_ground_points").set(quality.ground_points as f64);

    // 异常
    for event in &snapshot.anomalies {
        counter!(
            "road_quality_anomalies_total",
            "kind" => event.kind.as_str(),
            "severity" => event.severity.as_str()
        )
        .increment(1);
        histogram!(
            "road_quality_anomaly_magnitude_mm",
            "kind" => event.kind.as_str()
        )
        .record(event.magnitude_mm);
    }

    // 电池
    gauge!("road_quality_battery_percentage").set(snapshot.battery.percentage);
    gauge!("road_quality_low_battery").set(if snapshot.low_battery { 1.0 } else { 0.0 });

    gauge!("road_quality_gps_valid").set(if snapshot.gps.is_some() { 1.0 } else { 0.0 });
}

/// 记录采集活动的单次读取
pub fn record_sample_ingested(source: &str, present: bool) {
    let status = if present { "present" } else { "missing" };
    counter!(
        "road_quality_samples_total",
        "source" => source.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录活动迭代失败
pub fn record_activity_fault(activity: &str) {
    counter!(
        "road_quality_activity_faults_total",
        "activity" => activity.to_string()
    )
    .increment(1);
}

/// 记录快照分发
pub fn record_snapshot_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "road_quality_snapshots_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录队列满导致的快照丢弃
pub fn record_snapshot_dropped(sink_name: &str) {
    counter!(
        "road_quality_snapshots_dropped_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录分析耗时
pub fn record_analysis_latency_ms(latency_ms: f64) {
    histogram!("road_quality_analysis_latency_ms").record(latency_ms);
}

/// 勘测统计聚合器
///
/// 在内存中聚合快照，运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SurveyStatsAggregator {
    /// 快照总数
    pub total_snapshots: u64,

    /// 轨迹触发的快照数
    pub track_snapshots: u64,

    /// 带有效定位的快照数
    pub snapshots_with_fix: u64,

    /// 低电量状态下的快照数
    pub low_battery_snapshots: u64,

    /// 各质量等级出现次数
    pub quality_counts: HashMap<RoadQuality, u64>,

    /// 各类异常次数
    pub anomaly_counts: HashMap<String, u64>,

    /// 高严重度异常次数
    pub high_severity: u64,

    /// 质量分数统计 (仅实测)
    pub score_stats: RunningStats,

    /// 粗糙度统计 (仅实测)
    pub roughness_stats: RunningStats,

    /// 电量统计
    pub battery_stats: RunningStats,
}

impl SurveyStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, snapshot: &FusionSnapshot) {
        self.total_snapshots += 1;
        if snapshot.trigger == SnapshotTrigger::Track {
            self.track_snapshots += 1;
        }
        if snapshot.gps.is_some() {
            self.snapshots_with_fix += 1;
        }
        if snapshot.low_battery {
            self.low_battery_snapshots += 1;
        }

        let quality = &snapshot.quality;
        *self.quality_counts.entry(quality.quality).or_insert(0) += 1;
        if quality.quality.is_measured() {
            self.score_stats.push(f64::from(quality.quality_score));
            self.roughness_stats.push(quality.roughness_index);
        }

        for event in &snapshot.anomalies {
            *self
                .anomaly_counts
                .entry(event.kind.as_str().to_string())
                .or_insert(0) += 1;
            if event.severity == Severity::High {
                self.high_severity += 1;
            }
        }

        self.battery_stats.push(snapshot.battery.percentage);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> SurveySummary {
        let total_anomalies = self.anomaly_counts.values().sum();
        let mut quality_counts: Vec<_> = self.quality_counts.iter().collect();
        quality_counts.sort_by_key(|(q, _)| std::cmp::Reverse(q.score()));
        SurveySummary {
            total_snapshots: self.total_snapshots,
            track_snapshots: self.track_snapshots,
            fix_rate: percent(self.snapshots_with_fix, self.total_snapshots),
            low_battery_snapshots: self.low_battery_snapshots,
            quality_counts: quality_counts
                .into_iter()
                .map(|(q, n)| (q.as_str().to_string(), *n))
                .collect(),
            total_anomalies,
            high_severity: self.high_severity,
            anomaly_counts: self.anomaly_counts.clone(),
            quality_score: StatsSummary::from(&self.score_stats),
            roughness: StatsSummary::from(&self.roughness_stats),
            battery_percentage: StatsSummary::from(&self.battery_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// 勘测摘要
#[derive(Debug, Clone, Default)]
pub struct SurveySummary {
    pub total_snapshots: u64,
    pub track_snapshots: u64,
    pub fix_rate: f64,
    pub low_battery_snapshots: u64,
    pub quality_counts: Vec<(String, u64)>,
    pub total_anomalies: u64,
    pub high_severity: u64,
    pub anomaly_counts: HashMap<String, u64>,
    pub quality_score: StatsSummary,
    pub roughness: StatsSummary,
    pub battery_percentage: StatsSummary,
}

impl std::fmt::Display for SurveySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Survey Summary ===")?;
        writeln!(
            f,
            "Snapshots: {} ({} track)",
            self.total_snapshots, self.track_snapshots
        )?;
        writeln!(f, "GPS fix rate: {:.2}%", self.fix_rate)?;
        writeln!(f, "Low battery snapshots: {}", self.low_battery_snapshots)?;
        writeln!(f, "Quality score: {}", self.quality_score)?;
        writeln!(f, "Roughness index: {}", self.roughness)?;
        writeln!(f, "Battery (%): {}", self.battery_percentage)?;

        if !self.quality_counts.is_empty() {
            writeln!(f, "Quality classes:")?;
            for (quality, count) in &self.quality_counts {
                writeln!(f, "  {}: {}", quality, count)?;
            }
        }

        writeln!(
            f,
            "Anomalies: {} ({} high severity)",
            self.total_anomalies, self.high_severity
        )?;
        let mut kinds: Vec<_> = self.anomaly_counts.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            writeln!(f, "  {}: {}", kind, count)?;
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AnomalyEvent, AnomalyKind, BatteryStatus, RoadQualityMetrics};
    use std::collections::BTreeSet;

    fn measured(quality: RoadQuality, roughness: f64) -> RoadQualityMetrics {
        RoadQualityMetrics {
            quality,
            quality_score: quality.score(),
            roughness_index: roughness,
            ground_points: 20,
            ..Default::default()
        }
    }

    fn event(kind: AnomalyKind, severity: Severity) -> AnomalyEvent {
        AnomalyEvent {
            kind,
            magnitude_mm: 40.0,
            width_cm: 2,
            severity,
            sample_indices: BTreeSet::from([3, 4]),
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SurveyStatsAggregator::new();

        aggregator.update(&FusionSnapshot {
            quality: measured(RoadQuality::Good, 2.0),
            anomalies: vec![
                event(AnomalyKind::Pothole, Severity::High),
                event(AnomalyKind::Crack, Severity::Medium),
            ],
            battery: BatteryStatus::default(),
            ..Default::default()
        });
        aggregator.update(&FusionSnapshot {
            trigger: SnapshotTrigger::Track,
            low_battery: true,
            ..Default::default()
        });

        assert_eq!(aggregator.total_snapshots, 2);
        assert_eq!(aggregator.track_snapshots, 1);
        assert_eq!(aggregator.low_battery_snapshots, 1);
        assert_eq!(aggregator.high_severity, 1);
        assert_eq!(aggregator.anomaly_counts.get("pothole"), Some(&1));
        assert_eq!(aggregator.quality_counts.get(&RoadQuality::Unknown), Some(&1));
        // unknown quality is not a measurement
        assert_eq!(aggregator.score_stats.count(), 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SurveyStatsAggregator::new();
        for roughness in [0.5, 2.0] {
            let quality = if roughness < 1.0 {
                RoadQuality::Excellent
            } else {
                RoadQuality::Good
            };
            aggregator.update(&FusionSnapshot {
                quality: measured(quality, roughness),
                anomalies: vec![event(AnomalyKind::Bump, Severity::Medium)],
                ..Default::default()
            });
        }

        let summary = aggregator.summary();
        assert_eq!(summary.total_anomalies, 2);
        assert_eq!(summary.fix_rate, 0.0);

        let output = format!("{}", summary);
        assert!(output.contains("Snapshots: 2 (0 track)"));
        assert!(output.contains("bump: 2"));
        assert!(output.contains("excellent: 1"));
    }

    #[test]
    fn test_reset() {
        let mut aggregator = SurveyStatsAggregator::new();
        aggregator.update(&FusionSnapshot::default());
        aggregator.reset();
        assert_eq!(aggregator.total_snapshots, 0);
        assert_eq!(format!("{}", aggregator.summary().quality_score), "N/A");
    }
}
