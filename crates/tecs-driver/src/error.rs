//! 驱动层错误类型定义

use tecs_hardware::HardwareError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 硬件错误
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// 守护进程不管理该单元
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// 控制线程已停止（shutdown 之后）
    #[error("Control loop is not running")]
    LoopStopped,

    /// 控制线程启动失败
    #[error("Control thread error: {0}")]
    ControlThread(String),

    /// 等待新状态超时
    #[error("Operation timeout")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::UnknownUnit("ut9".to_string());
        assert_eq!(format!("{}", err), "Unknown unit: ut9");

        let err = DriverError::LoopStopped;
        assert_eq!(format!("{}", err), "Control loop is not running");

        let err = DriverError::ControlThread("spawn failed".to_string());
        assert!(format!("{}", err).contains("spawn failed"));

        let err = DriverError::Timeout;
        assert_eq!(format!("{}", err), "Operation timeout");
    }

    #[test]
    fn test_from_hardware_error() {
        let err: DriverError = HardwareError::Timeout.into();
        assert!(matches!(err, DriverError::Hardware(HardwareError::Timeout)));
        assert!(format!("{}", err).contains("Device timeout"));
    }
}
