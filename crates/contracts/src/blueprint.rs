//! SurveyBlueprint - Config Loader 输出
//!
//! 描述完整的测量配置：地面窗口、分析阈值、检测参数、运动补偿、标定、节拍、电池、历史容量、输出路由。
//! 所有字段都有默认值，空配置文件即为合法配置。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的测量配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SurveyBlueprint {
    /// 配置版本
    pub version: ConfigVersion,

    /// 车辆信息
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    /// 地面点距离窗口 (分析器与检测器共用)
    #[validate(nested)]
    pub ground: GroundWindow,

    /// 路面质量分析参数
    #[validate(nested)]
    pub analyzer: AnalyzerConfig,

    /// 异常检测参数
    #[validate(nested)]
    pub detector: DetectorConfig,

    /// 运动补偿参数
    #[validate(nested)]
    pub compensation: CompensationConfig,

    /// 启动标定参数
    #[validate(nested)]
    pub calibration: CalibrationConfig,

    /// 各活动节拍
    #[validate(nested)]
    pub cadence: CadenceConfig,

    /// 电池告警阈值
    #[validate(nested)]
    pub battery: BatteryConfig,

    /// 历史缓存容量
    #[validate(nested)]
    pub history: HistoryConfig,

    /// 输出路由配置
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// 车辆信息
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VehicleConfig {
    /// 唯一标识符
    #[validate(length(min = 1))]
    pub id: String,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            id: "survey-vehicle".to_string(),
        }
    }
}

/// 地面点距离窗口，开区间 (min, max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GroundWindow {
    #[validate(range(min = 0.0))]
    pub min_distance_mm: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub max_distance_mm: f64,
}

impl Default for GroundWindow {
    fn default() -> Self {
        Self {
            min_distance_mm: 50.0,
            max_distance_mm: 1000.0,
        }
    }
}

impl GroundWindow {
    /// 距离是否在窗口内 (不含端点)
    pub fn contains(&self, distance_mm: f64) -> bool {
        distance_mm > self.min_distance_mm && distance_mm < self.max_distance_mm
    }
}

/// 粗糙度分级阈值 (严格递增)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QualityThresholds {
    #[validate(range(exclusive_min = 0.0))]
    pub excellent: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub good: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub fair: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub poor: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: 1.0,
            good: 3.0,
            fair: 7.0,
            poor: 15.0,
        }
    }
}

impl QualityThresholds {
    /// 阈值是否严格递增
    pub fn is_ascending(&self) -> bool {
        self.excellent < self.good && self.good < self.fair && self.fair < self.poor
    }
}

/// 路面质量分析参数
///
/// 角度使用有符号表示，正下方为 0，315..360 映射为 -45..0。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnalyzerConfig {
    #[validate(range(min = -180.0, max = 180.0))]
    pub min_angle_deg: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub max_angle_deg: f64,

    /// 有效测量所需的最少地面点数
    #[validate(range(min = 1))]
    pub min_valid_samples: usize,

    #[validate(nested)]
    pub thresholds: QualityThresholds,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_angle_deg: -45.0,
            max_angle_deg: 45.0,
            min_valid_samples: 10,
            thresholds: QualityThresholds::default(),
        }
    }
}

/// 角度区间 [from_deg, to_deg]，取值于 [0, 360]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct AngleRange {
    #[validate(range(min = 0.0, max = 360.0))]
    pub from_deg: f64,

    #[validate(range(min = 0.0, max = 360.0))]
    pub to_deg: f64,
}

impl AngleRange {
    pub const fn new(from_deg: f64, to_deg: f64) -> Self {
        Self { from_deg, to_deg }
    }

    /// `angle_deg` 需已归一化到 [0, 360)
    pub fn contains(&self, angle_deg: f64) -> bool {
        angle_deg >= self.from_deg && angle_deg <= self.to_deg
    }
}

/// 异常检测参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DetectorConfig {
    /// 窄波束角度区间 (任一区间命中即保留)
    #[validate(length(min = 1), nested)]
    pub bands: Vec<AngleRange>,

    /// 检测所需的最少地面点数
    #[validate(range(min = 1))]
    pub min_ground_points: usize,

    /// 聚类时相邻索引的最大间隔
    pub max_gap: usize,

    /// 坑洞阈值 (比基线更远，mm)
    #[validate(range(exclusive_min = 0.0))]
    pub pothole_threshold_mm: f64,

    /// 凸起阈值 (比基线更近，mm)
    #[validate(range(exclusive_min = 0.0))]
    pub bump_threshold_mm: f64,

    /// 裂缝阈值 (相邻点距离跳变，mm)
    #[validate(range(exclusive_min = 0.0))]
    pub crack_threshold_mm: f64,

    /// 坑洞深度超过此值判为高严重度
    #[validate(range(exclusive_min = 0.0))]
    pub high_pothole_depth_mm: f64,

    /// 凸起高度超过此值判为高严重度
    #[validate(range(exclusive_min = 0.0))]
    pub high_bump_height_mm: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bands: vec![AngleRange::new(355.0, 359.0), AngleRange::new(0.0, 5.0)],
            min_ground_points: 10,
            max_gap: 2,
            pothole_threshold_mm: 30.0,
            bump_threshold_mm: 20.0,
            crack_threshold_mm: 15.0,
            high_pothole_depth_mm: 50.0,
            high_bump_height_mm: 30.0,
        }
    }
}

impl DetectorConfig {
    /// 归一化角度是否落在任一窄波束区间内
    pub fn in_band(&self, angle_deg: f64) -> bool {
        self.bands.iter().any(|band| band.contains(angle_deg))
    }
}

/// 运动补偿参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CompensationConfig {
    pub enabled: bool,

    /// 距正下方多少度以内的点参与补偿
    #[validate(range(min = 0.0, max = 180.0))]
    pub band_half_width_deg: f64,

    /// 名义采样间隔 Δt (秒)
    #[validate(range(exclusive_min = 0.0))]
    pub sample_interval_s: f64,
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            band_half_width_deg: 10.0,
            sample_interval_s: 0.1,
        }
    }
}

/// 启动标定参数 (车辆静止)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CalibrationConfig {
    /// 加速度采样次数
    #[validate(range(min = 1))]
    pub accel_samples: usize,

    /// 加速度采样间隔 (毫秒)
    pub accel_interval_ms: u64,

    /// 扫描采样次数
    #[validate(range(min = 1))]
    pub scan_samples: usize,

    /// 扫描采样间隔 (毫秒)
    pub scan_interval_ms: u64,

    /// 地面基线使用的正下方半角 (度)
    #[validate(range(min = 0.0, max = 180.0))]
    pub ground_band_half_width_deg: f64,

    /// 无加速度数据时的重力基线 (g)
    pub default_accel_baseline_g: f64,

    /// 无扫描数据时的地面距离基线 (mm)
    #[validate(range(exclusive_min = 0.0))]
    pub default_ground_distance_mm: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            accel_samples: 50,
            accel_interval_ms: 10,
            scan_samples: 10,
            scan_interval_ms: 100,
            ground_band_half_width_deg: 5.0,
            default_accel_baseline_g: 1.0,
            default_ground_distance_mm: 300.0,
        }
    }
}

/// 各活动节拍 (毫秒)，均须 > 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CadenceConfig {
    #[validate(range(min = 1))]
    pub scan_ms: u64,

    #[validate(range(min = 1))]
    pub fix_ms: u64,

    #[validate(range(min = 1))]
    pub accel_ms: u64,

    #[validate(range(min = 1))]
    pub analysis_ms: u64,

    #[validate(range(min = 1))]
    pub battery_ms: u64,

    /// 轨迹点推送间隔
    #[validate(range(min = 1))]
    pub track_interval_ms: u64,

    /// 关停等待上限
    #[validate(range(min = 1))]
    pub shutdown_timeout_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            scan_ms: 50,
            fix_ms: 200,
            accel_ms: 100,
            analysis_ms: 500,
            battery_ms: 5_000,
            track_interval_ms: 10_000,
            shutdown_timeout_ms: 2_000,
        }
    }
}

impl CadenceConfig {
    pub fn scan(&self) -> Duration {
        Duration::from_millis(self.scan_ms)
    }

    pub fn fix(&self) -> Duration {
        Duration::from_millis(self.fix_ms)
    }

    pub fn accel(&self) -> Duration {
        Duration::from_millis(self.accel_ms)
    }

    pub fn analysis(&self) -> Duration {
        Duration::from_millis(self.analysis_ms)
    }

    pub fn battery(&self) -> Duration {
        Duration::from_millis(self.battery_ms)
    }

    pub fn track_interval(&self) -> Duration {
        Duration::from_millis(self.track_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// 电池告警阈值 (百分比)
///
/// 低于 `low_pct` 时告警并锁存，高于 `recover_pct` 时解除。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BatteryConfig {
    #[validate(range(min = 0.0, max = 100.0))]
    pub low_pct: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub recover_pct: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            low_pct: 10.0,
            recover_pct: 15.0,
        }
    }
}

/// 历史缓存容量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HistoryConfig {
    #[validate(range(min = 1))]
    pub accel_window: usize,

    #[validate(range(min = 1))]
    pub score_history: usize,

    #[validate(range(min = 1))]
    pub anomaly_history: usize,

    /// Orchestrator -> Dispatcher 快照队列容量
    #[validate(range(min = 1))]
    pub snapshot_queue: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            accel_window: 100,
            score_history: 100,
            anomaly_history: 100,
            snapshot_queue: 64,
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            queue_capacity: default_queue_capacity(),
            params: HashMap::new(),
        }
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 危险告警 (按严重度分级)
    Alert,
}
