//! 电池看门狗
//!
//! 低电量告警带滞回：低于 `low_pct` 时锁存，高于 `recover_pct` 时解除。

use std::sync::Arc;

use contracts::{BatteryConfig, BatterySource};
use tracing::{info, warn};

use crate::activity::Activity;
use crate::error::FusionError;
use crate::store::StateStore;

/// 锁存状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryTransition {
    /// 进入低电量
    Latched,
    /// 电量恢复
    Recovered,
}

/// 低电量滞回锁存
#[derive(Debug, Clone, Copy)]
pub struct LowBatteryLatch {
    low_pct: f64,
    recover_pct: f64,
    latched: bool,
}

impl LowBatteryLatch {
    pub fn new(config: &BatteryConfig) -> Self {
        Self {
            low_pct: config.low_pct,
            recover_pct: config.recover_pct,
            latched: false,
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// 输入新电量，返回状态变化 (若有)
    pub fn update(&mut self, percentage: f64) -> Option<BatteryTransition> {
        if !self.latched && percentage < self.low_pct {
            self.latched = true;
            Some(BatteryTransition::Latched)
        } else if self.latched && percentage > self.recover_pct {
            self.latched = false;
            Some(BatteryTransition::Recovered)
        } else {
            None
        }
    }
}

/// 电池轮询活动
pub struct BatteryWatchdog<B> {
    source: B,
    store: Arc<StateStore>,
    latch: LowBatteryLatch,
}

impl<B: BatterySource> BatteryWatchdog<B> {
    pub fn new(source: B, store: Arc<StateStore>, config: &BatteryConfig) -> Self {
        Self {
            source,
            store,
            latch: LowBatteryLatch::new(config),
        }
    }
}

impl<B: BatterySource + Send + 'static> Activity for BatteryWatchdog<B> {
    fn name(&self) -> &'static str {
        "battery"
    }

    async fn iterate(&mut self, iteration: u64) -> Result<(), FusionError> {
        let status = self.source.status().await;

        match self.latch.update(status.percentage) {
            Some(BatteryTransition::Latched) => warn!(
                source = self.source.name(),
                tick = iteration,
                percentage = status.percentage,
                voltage = status.voltage,
                runtime_min = status.estimated_runtime_minutes,
                "Low battery"
            ),
            Some(BatteryTransition::Recovered) => info!(
                source = self.source.name(),
                tick = iteration,
                percentage = status.percentage,
                "Battery recovered"
            ),
            None => {}
        }

        self.store.update_battery(status, self.latch.is_latched());
        Ok(())
    }
}
