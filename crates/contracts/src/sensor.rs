//! 传感器读数 - Acquisition 输出
//!
//! 已解码的标量读数：测距扫描、定位、加速度、电池。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个测距回波
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSample {
    /// 角度 (度)，构造时归一化到 [0, 360)
    pub angle_deg: f64,

    /// 距离 (毫米)
    pub distance_mm: f64,
}

impl RangeSample {
    pub fn new(angle_deg: f64, distance_mm: f64) -> Self {
        Self {
            angle_deg: normalize_angle(angle_deg),
            distance_mm,
        }
    }

    /// Angle mapped into (-180, 180], so 315..360 becomes -45..0.
    pub fn signed_angle(&self) -> f64 {
        signed_angle(self.angle_deg)
    }
}

/// Wrap any angle into [0, 360).
pub fn normalize_angle(angle_deg: f64) -> f64 {
    let wrapped = angle_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Map an angle into (-180, 180].
pub fn signed_angle(angle_deg: f64) -> f64 {
    let a = normalize_angle(angle_deg);
    if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// 一次 (完整或部分) 旋转的扫描帧
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanFrame {
    pub samples: Vec<RangeSample>,
}

impl ScanFrame {
    pub fn new(samples: Vec<RangeSample>) -> Self {
        Self { samples }
    }

    /// Empty frame, returned by sources that had nothing this tick
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl FromIterator<RangeSample> for ScanFrame {
    fn from_iter<I: IntoIterator<Item = RangeSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// GPS 定位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// 定位时间
    pub timestamp: DateTime<Utc>,

    /// 纬度 (度)
    pub lat: f64,

    /// 经度 (度)
    pub lon: f64,

    /// 海拔 (米)
    pub alt: f64,

    /// 可见卫星数
    pub sat_count: u32,
}

/// 含重力的垂直加速度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    /// 单位 g
    pub z_g: f64,
}

impl AccelSample {
    pub fn new(z_g: f64) -> Self {
        Self { z_g }
    }
}

/// 电池状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// 电量百分比 [0, 100]
    pub percentage: f64,

    /// 电压 (V)
    pub voltage: f64,

    /// 是否充电中
    pub charging: bool,

    /// 预计剩余时间 (分钟)
    pub estimated_runtime_minutes: u32,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self {
            percentage: 100.0,
            voltage: 5.0,
            charging: false,
            estimated_runtime_minutes: 180,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle_wraps() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(360.0), 0.0);
        assert_eq!(normalize_angle(370.0), 10.0);
        assert_eq!(normalize_angle(-10.0), 350.0);
        assert!(normalize_angle(-1e-18) < 360.0);
    }

    #[test]
    fn test_signed_angle() {
        assert_eq!(signed_angle(315.0), -45.0);
        assert_eq!(signed_angle(359.0), -1.0);
        assert_eq!(signed_angle(45.0), 45.0);
        assert_eq!(signed_angle(180.0), 180.0);
        assert_eq!(signed_angle(181.0), -179.0);
    }

    #[test]
    fn test_range_sample_normalizes_on_construction() {
        let s = RangeSample::new(-5.0, 300.0);
        assert_eq!(s.angle_deg, 355.0);
        assert_eq!(s.signed_angle(), -5.0);
    }

    #[test]
    fn test_battery_default() {
        let b = BatteryStatus::default();
        assert_eq!(b.percentage, 100.0);
        assert_eq!(b.estimated_runtime_minutes, 180);
        assert!(!b.charging);
    }
}
