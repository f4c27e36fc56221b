//! 模拟数据源
//!
//! 用于无硬件环境的台架运行与测试。所有随机量来自带种子的 `StdRng`，
//! 相同种子产生相同序列。

use std::sync::Arc;

use chrono::Utc;
use contracts::{
    AccelSample, AccelSource, FixSource, GpsFix, RangeSample, ScanFrame, ScanSource,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::metrics::IngestionMetrics;

/// 模拟扫描配置
#[derive(Debug, Clone)]
pub struct SimulatedScanConfig {
    /// 随机种子
    pub seed: u64,

    /// 角分辨率 (度)
    pub angle_step_deg: f64,

    /// 平整路面距离 (mm)
    pub road_distance_mm: f64,

    /// 路面噪声幅度 (mm, 均匀分布 ±)
    pub noise_mm: f64,

    /// 每隔多少帧注入一个坑洞 (None 不注入)
    pub pothole_every: Option<u64>,

    /// 坑洞深度 (mm)
    pub pothole_depth_mm: f64,

    /// 每隔多少帧返回空帧 (None 从不)
    pub empty_every: Option<u64>,
}

impl Default for SimulatedScanConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            angle_step_deg: 1.0,
            road_distance_mm: 300.0,
            noise_mm: 1.0,
            pothole_every: None,
            pothole_depth_mm: 60.0,
            empty_every: None,
        }
    }
}

/// 模拟扫描源
///
/// 正下方 ±45° 内为路面，其余方向为远处环境回波。
pub struct SimulatedScanSource {
    name: String,
    config: SimulatedScanConfig,
    rng: StdRng,
    frame_count: u64,
    metrics: Arc<IngestionMetrics>,
}

impl SimulatedScanSource {
    pub fn new(config: SimulatedScanConfig) -> Self {
        Self {
            name: "simulated_scan".to_string(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            frame_count: 0,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// 生成下一帧 (同步版本)
    pub fn generate(&mut self) -> ScanFrame {
        self.frame_count += 1;
        let n = self.frame_count;

        if self.config.empty_every.is_some_and(|k| k > 0 && n % k == 0) {
            return ScanFrame::empty();
        }
        let with_pothole = self.config.pothole_every.is_some_and(|k| k > 0 && n % k == 0);

        let step = self.config.angle_step_deg.max(0.1);
        let noise_mm = self.config.noise_mm.abs();
        let count = (360.0 / step).floor() as usize;
        let mut samples = Vec::with_capacity(count);

        for i in 0..count {
            let angle = i as f64 * step;
            let signed = contracts::signed_angle(angle);
            let distance = if signed.abs() <= 45.0 {
                let noise = self.rng.random_range(-noise_mm..=noise_mm);
                let dip = if with_pothole && (0.0..=3.0).contains(&signed) {
                    self.config.pothole_depth_mm
                } else {
                    0.0
                };
                self.config.road_distance_mm + noise + dip
            } else {
                self.rng.random_range(1500.0..=4000.0)
            };
            samples.push(RangeSample::new(angle, distance));
        }

        trace!(frame = n, points = samples.len(), with_pothole, "Simulated scan");
        ScanFrame::new(samples)
    }
}

impl ScanSource for SimulatedScanSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_frame(&mut self) -> ScanFrame {
        let frame = self.generate();
        if frame.is_empty() {
            self.metrics.record_missing();
        } else {
            self.metrics.record_received();
        }
        frame
    }
}

/// 按顺序循环回放给定帧
pub struct ReplayScanSource {
    name: String,
    frames: Vec<ScanFrame>,
    cursor: usize,
}

impl ReplayScanSource {
    pub fn new(frames: Vec<ScanFrame>) -> Self {
        Self {
            name: "replay_scan".to_string(),
            frames,
            cursor: 0,
        }
    }
}

impl ScanSource for ReplayScanSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_frame(&mut self) -> ScanFrame {
        if self.frames.is_empty() {
            return ScanFrame::empty();
        }
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor += 1;
        frame
    }
}

/// 模拟定位源配置
#[derive(Debug, Clone)]
pub struct SimulatedFixConfig {
    pub start_lat: f64,
    pub start_lon: f64,
    pub alt: f64,
    /// 每次定位的经纬度增量 (度)
    pub step_deg: f64,
    /// 首次有效定位前的空读次数
    pub warmup_reads: u32,
    pub sat_count: u32,
}

impl Default for SimulatedFixConfig {
    fn default() -> Self {
        Self {
            start_lat: 52.0907,
            start_lon: 5.1214,
            alt: 5.0,
            step_deg: 0.000_01,
            warmup_reads: 2,
            sat_count: 9,
        }
    }
}

/// 模拟定位源
///
/// 沿东北方向匀速移动，启动时先返回若干次 `None` 模拟未定位。
pub struct SimulatedFixSource {
    name: String,
    config: SimulatedFixConfig,
    reads: u64,
    fixes: u64,
}

impl SimulatedFixSource {
    pub fn new(config: SimulatedFixConfig) -> Self {
        Self {
            name: "simulated_fix".to_string(),
            config,
            reads: 0,
            fixes: 0,
        }
    }
}

impl Default for SimulatedFixSource {
    fn default() -> Self {
        Self::new(SimulatedFixConfig::default())
    }
}

impl FixSource for SimulatedFixSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_fix(&mut self) -> Option<GpsFix> {
        self.reads += 1;
        if self.reads <= u64::from(self.config.warmup_reads) {
            return None;
        }
        let offset = self.fixes as f64 * self.config.step_deg;
        self.fixes += 1;
        Some(GpsFix {
            timestamp: Utc::now(),
            lat: self.config.start_lat + offset,
            lon: self.config.start_lon + offset,
            alt: self.config.alt,
            sat_count: self.config.sat_count,
        })
    }
}

/// 模拟加速度源
///
/// 静止重力读数加均匀噪声；可按周期返回 `None` 模拟总线读失败。
pub struct SimulatedAccelSource {
    name: String,
    rng: StdRng,
    gravity_g: f64,
    noise_g: f64,
    missing_every: Option<u64>,
    reads: u64,
}

impl SimulatedAccelSource {
    pub fn new(seed: u64, gravity_g: f64, noise_g: f64) -> Self {
        Self {
            name: "simulated_accel".to_string(),
            rng: StdRng::seed_from_u64(seed),
            gravity_g,
            noise_g: noise_g.abs(),
            missing_every: None,
            reads: 0,
        }
    }

    /// 每 `k` 次读取返回一次 `None`
    pub fn with_missing_every(mut self, k: u64) -> Self {
        self.missing_every = Some(k);
        self
    }
}

impl Default for SimulatedAccelSource {
    fn default() -> Self {
        Self::new(11, 1.0, 0.02)
    }
}

impl AccelSource for SimulatedAccelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Option<AccelSample> {
        self.reads += 1;
        if self
            .missing_every
            .is_some_and(|k| k > 0 && self.reads % k == 0)
        {
            return None;
        }
        let noise = self.rng.random_range(-self.noise_g..=self.noise_g);
        Some(AccelSample::new(self.gravity_g + noise))
    }
}
