//! 电池数据源
//!
//! - `SysfsBattery`: 读取 `/sys/class/power_supply/<name>`
//! - `SimulatedBattery`: 线性放电模型，用于台架运行与测试

use std::path::{Path, PathBuf};
use std::time::Duration;

use contracts::{BatteryStatus, BatterySource};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{IngestionError, Result};

/// 默认 sysfs 路径
pub const DEFAULT_SYSFS_PATH: &str = "/sys/class/power_supply/battery";

/// 从满电到耗尽的分钟数 / 100
const MINUTES_PER_PERCENT: f64 = 1.8;

/// 按电量估算剩余分钟
pub fn estimate_runtime_minutes(percentage: f64) -> u32 {
    (percentage.clamp(0.0, 100.0) * MINUTES_PER_PERCENT) as u32
}

/// sysfs 电池读取
pub struct SysfsBattery {
    name: String,
    dir: PathBuf,
    last: BatteryStatus,
}

impl SysfsBattery {
    /// 目录存在时返回数据源
    pub async fn detect(dir: impl AsRef<Path>) -> Option<Self> {
        let dir = dir.as_ref();
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => Some(Self {
                name: "sysfs_battery".to_string(),
                dir: dir.to_path_buf(),
                last: BatteryStatus::default(),
            }),
            _ => {
                debug!(path = %dir.display(), "No sysfs battery");
                None
            }
        }
    }

    /// 读取一次完整状态
    pub async fn read(&self) -> Result<BatteryStatus> {
        let percentage: f64 = self.read_value("capacity").await?;
        let voltage = match self.read_value::<f64>("voltage_now").await {
            // sysfs reports microvolts
            Ok(uv) => uv / 1_000_000.0,
            Err(_) => self.last.voltage,
        };
        let charging = match self.read_string("status").await {
            Ok(status) => status.eq_ignore_ascii_case("charging"),
            Err(_) => false,
        };
        let percentage = percentage.clamp(0.0, 100.0);
        Ok(BatteryStatus {
            percentage,
            voltage,
            charging,
            estimated_runtime_minutes: estimate_runtime_minutes(percentage),
        })
    }

    async fn read_string(&self, field: &str) -> Result<String> {
        let path = self.dir.join(field);
        tokio::fs::read_to_string(&path)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| IngestionError::unavailable(&self.name, format!("{}: {e}", path.display())))
    }

    async fn read_value<T>(&self, field: &str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.read_string(field).await?;
        raw.parse()
            .map_err(|e: T::Err| IngestionError::parse(&self.name, field, e.to_string()))
    }
}

impl BatterySource for SysfsBattery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&mut self) -> BatteryStatus {
        match self.read().await {
            Ok(status) => {
                self.last = status;
                status
            }
            Err(e) => {
                warn!(
                    source = %self.name,
                    error = %e,
                    last_percentage = self.last.percentage,
                    "Battery read failed, keeping last known status"
                );
                self.last
            }
        }
    }
}

/// 模拟电池
///
/// 每经过 `drain_interval` 下降 `drain_step` 个百分点，电压在 3.7V..4.5V 线性变化。
pub struct SimulatedBattery {
    name: String,
    status: BatteryStatus,
    last_update: Instant,
    drain_interval: Duration,
    drain_step: f64,
}

impl SimulatedBattery {
    /// 满电，0.1% / 30s
    pub fn new() -> Self {
        Self::with_drain(100.0, Duration::from_secs(30), 0.1)
    }

    pub fn with_drain(start_percentage: f64, drain_interval: Duration, drain_step: f64) -> Self {
        let percentage = start_percentage.clamp(0.0, 100.0);
        Self {
            name: "simulated_battery".to_string(),
            status: BatteryStatus {
                percentage,
                voltage: Self::voltage_for(percentage),
                charging: false,
                estimated_runtime_minutes: estimate_runtime_minutes(percentage),
            },
            last_update: Instant::now(),
            drain_interval,
            drain_step,
        }
    }

    /// 3.7V 空电，4.5V 满电
    pub fn voltage_for(percentage: f64) -> f64 {
        3.7 + percentage / 100.0 * 0.8
    }

    /// 以给定时刻推进放电模型
    pub fn status_at(&mut self, now: Instant) -> BatteryStatus {
        if now.saturating_duration_since(self.last_update) > self.drain_interval {
            let percentage = (self.status.percentage - self.drain_step).max(0.0);
            self.status = BatteryStatus {
                percentage,
                voltage: Self::voltage_for(percentage),
                charging: false,
                estimated_runtime_minutes: estimate_runtime_minutes(percentage),
            };
            self.last_update = now;
        }
        self.status
    }
}

impl Default for SimulatedBattery {
    fn default() -> Self {
        Self::new()
    }
}

impl BatterySource for SimulatedBattery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&mut self) -> BatteryStatus {
        self.status_at(Instant::now())
    }
}
