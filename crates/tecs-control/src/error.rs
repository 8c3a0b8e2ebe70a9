//! 控制层错误类型

use tecs_driver::DriverError;
use thiserror::Error;

/// 命令处理错误
///
/// 只有前置条件不满足和参数非法会作为调用结果返回给调用方；
/// 硬件故障体现在快照的 `bad_hardware` 中，不在这里出现。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 当前状态不允许该命令（未入队）
    #[error("{0}")]
    Precondition(String),

    /// 参数非法（未入队）
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// 守护进程不管理该单元
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// 驱动层错误（守护进程已停止、等待超时等）
    #[error(transparent)]
    Driver(DriverError),
}

impl ControlError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, ControlError::Precondition(_))
    }
}

impl From<DriverError> for ControlError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::UnknownUnit(unit) => ControlError::UnknownUnit(unit),
            other => ControlError::Driver(other),
        }
    }
}
