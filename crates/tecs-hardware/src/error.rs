//! 硬件层错误类型定义

use thiserror::Error;

/// 硬件驱动错误
///
/// 区分两类错误：
/// - **瞬态错误**（`is_transient() == true`）：I/O 失败、超时、设备断开。
///   控制循环会把该单元标记为故障，丢弃驱动句柄，并在下一个检查周期重连。
/// - **误用错误**：参数非法、操作不支持、配置了未知的硬件类型。
///   这类错误不会因为重试而消失，只记录日志，不降级单元。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// 未找到设备（定位失败）
    #[error("Device not found: {0}")]
    NotFound(String),

    /// 设备 I/O 错误
    #[error("Device I/O error: {0}")]
    Io(String),

    /// 设备响应超时
    #[error("Device timeout")]
    Timeout,

    /// 设备已断开
    #[error("Device disconnected")]
    Disconnected,

    /// 设备不支持该操作
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// 参数非法（如温度超出范围）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 配置中的硬件类型没有注册后端
    #[error("Unknown hardware class: {0}")]
    UnknownClass(String),
}

impl HardwareError {
    /// 是否为瞬态错误（重连后可能恢复）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HardwareError::NotFound(_)
                | HardwareError::Io(_)
                | HardwareError::Timeout
                | HardwareError::Disconnected
        )
    }
}
