//! ICM-20948 加速度计适配器
//!
//! 总线本身 (I2C 传输) 由外部提供，这里只负责寄存器语义：
//! 身份探测、唤醒、Z 轴高低字节读取与换算。

use std::sync::Arc;

use contracts::{AccelSample, AccelSource};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::retry::RetryPolicy;

/// ICM-20948 寄存器 (bank 0)
pub mod registers {
    /// 默认 I2C 地址 (AD0 拉高)
    pub const DEFAULT_ADDRESS: u8 = 0x69;
    pub const WHO_AM_I: u8 = 0x00;
    pub const PWR_MGMT_1: u8 = 0x06;
    pub const ACCEL_ZOUT_H: u8 = 0x31;
    pub const ACCEL_ZOUT_L: u8 = 0x32;

    /// WHO_AM_I 期望值
    pub const DEVICE_ID: u8 = 0xEA;

    /// 清除睡眠位
    pub const WAKE: u8 = 0x00;

    /// ±2g 量程下每 g 的计数
    pub const COUNTS_PER_G: f64 = 16384.0;
}

/// 单字节寄存器总线
///
/// 实现方负责底层传输；每次调用都应是短时同步操作。
pub trait RegisterBus: Send {
    fn read_register(&mut self, address: u8, register: u8) -> std::io::Result<u8>;

    fn write_register(&mut self, address: u8, register: u8, value: u8) -> std::io::Result<()>;
}

/// 大端 16 位补码换算为 g
pub fn decode_accel_z(high: u8, low: u8) -> f64 {
    f64::from(i16::from_be_bytes([high, low])) / registers::COUNTS_PER_G
}

/// ICM-20948 Z 轴加速度源
pub struct Icm20948<B> {
    name: String,
    bus: B,
    address: u8,
    retry: RetryPolicy,
    metrics: Arc<IngestionMetrics>,
    initialized: bool,
}

impl<B: RegisterBus> Icm20948<B> {
    /// 使用默认地址与重试策略
    pub fn new(bus: B) -> Self {
        Self {
            name: "icm20948".to_string(),
            bus,
            address: registers::DEFAULT_ADDRESS,
            retry: RetryPolicy::default(),
            metrics: Arc::new(IngestionMetrics::new()),
            initialized: false,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 探测设备身份并唤醒
    pub async fn init(&mut self) -> Result<()> {
        let found = self.read_byte(registers::WHO_AM_I).await?;
        if found != registers::DEVICE_ID {
            self.initialized = false;
            return Err(IngestionError::DeviceMismatch {
                device: self.name.clone(),
                expected: registers::DEVICE_ID,
                found,
            });
        }
        self.write_byte(registers::PWR_MGMT_1, registers::WAKE)
            .await?;
        self.initialized = true;
        info!(device = %self.name, address = self.address, "Accelerometer initialized");
        Ok(())
    }

    /// 读取一次 Z 轴加速度 (g)
    pub async fn read_z(&mut self) -> Result<f64> {
        let high = self.read_byte(registers::ACCEL_ZOUT_H).await?;
        let low = self.read_byte(registers::ACCEL_ZOUT_L).await?;
        Ok(decode_accel_z(high, low))
    }

    async fn read_byte(&mut self, register: u8) -> Result<u8> {
        let address = self.address;
        let bus = &mut self.bus;
        let outcome = self
            .retry
            .run("register_read", || bus.read_register(address, register))
            .await;
        match outcome {
            Ok(attempted) => {
                let extra = attempted.attempts.saturating_sub(1);
                self.metrics.record_retries(extra);
                if extra > 0 {
                    counter!("road_quality_adapter_retries_total", "source" => "accel")
                        .increment(u64::from(extra));
                }
                Ok(attempted.value)
            }
            Err(e) => {
                self.metrics.record_failure();
                debug!(device = %self.name, register, error = %e, "Register read failed");
                Err(IngestionError::BusRead {
                    device: self.name.clone(),
                    register,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn write_byte(&mut self, register: u8, value: u8) -> Result<()> {
        let address = self.address;
        let bus = &mut self.bus;
        self.retry
            .run("register_write", || {
                bus.write_register(address, register, value)
            })
            .await
            .map(|_| ())
            .map_err(|e| IngestionError::BusWrite {
                device: self.name.clone(),
                register,
                message: e.to_string(),
            })
    }
}

impl<B: RegisterBus> AccelSource for Icm20948<B> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Option<AccelSample> {
        match self.read_z().await {
            Ok(z_g) => {
                self.metrics.record_received();
                Some(AccelSample::new(z_g))
            }
            Err(e) => {
                self.metrics.record_missing();
                warn!(device = %self.name, error = %e, "Accelerometer sample missing");
                None
            }
        }
    }
}
