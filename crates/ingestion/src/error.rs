//! Ingestion 错误类型
//!
//! 只在适配器内部流转；对外 (核心) 表现为空帧或 `None`。

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 寄存器读取失败
    #[error("bus read failed on {device} register 0x{register:02x}: {message}")]
    BusRead {
        /// 设备名称
        device: String,
        /// 寄存器地址
        register: u8,
        /// 错误消息
        message: String,
    },

    /// 寄存器写入失败
    #[error("bus write failed on {device} register 0x{register:02x}: {message}")]
    BusWrite {
        /// 设备名称
        device: String,
        /// 寄存器地址
        register: u8,
        /// 错误消息
        message: String,
    },

    /// 重试耗尽
    #[error("{operation} gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// 操作名称
        operation: String,
        /// 尝试次数
        attempts: u32,
        /// 最后一次错误
        last_error: String,
    },

    /// 设备身份不匹配
    #[error("unexpected device id on {device}: expected 0x{expected:02x}, found 0x{found:02x}")]
    DeviceMismatch {
        /// 设备名称
        device: String,
        /// 期望的 WHO_AM_I
        expected: u8,
        /// 读到的值
        found: u8,
    },

    /// 数据源不可用
    #[error("source {source_name} unavailable: {message}")]
    Unavailable {
        /// 数据源名称
        source_name: String,
        /// 错误消息
        message: String,
    },

    /// 读数解析失败
    #[error("failed to parse {field} from {source_name}: {message}")]
    Parse {
        /// 数据源名称
        source_name: String,
        /// 字段名
        field: String,
        /// 错误消息
        message: String,
    },
}

impl IngestionError {
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn parse(
        source_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<IngestionError> for contracts::ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Unavailable {
                source_name,
                message,
            } => contracts::ContractError::source_unavailable(source_name, message),
            other => contracts::ContractError::Other(other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
