//! 硬件单元接口
//!
//! 控制循环只通过 [`HardwareUnit`] 与设备交互。一个单元持有一个可空的驱动句柄：
//! 启动时为空，`connect()` 成功后存在，任何 I/O 失败后被 `disconnect()` 丢弃，
//! 下一个检查周期重新连接。

use crate::command::Command;
use serde::Serialize;
use std::fmt::Debug;
use tecs_hardware::HardwareError;

pub trait HardwareUnit: Send + 'static {
    /// 该单元接受的命令
    type Command: Command;
    /// `get_info()` 产生的、随快照发布的状态
    type Status: Clone + Debug + Serialize + Send + Sync + 'static;

    /// 单元名（守护进程内唯一）
    fn name(&self) -> &str;

    /// 驱动句柄是否存在
    fn is_connected(&self) -> bool;

    /// 定位并打开设备
    ///
    /// 设备不存在时返回 `HardwareError::NotFound`。
    fn connect(&mut self) -> Result<(), HardwareError>;

    /// 丢弃驱动句柄
    fn disconnect(&mut self);

    /// 最近一次连接得到的序列号
    fn serial_number(&self) -> Option<String>;

    /// 读取设备状态
    fn get_info(&mut self) -> Result<Self::Status, HardwareError>;

    /// 执行一条命令
    fn execute(&mut self, command: Self::Command) -> Result<(), HardwareError>;

    /// 单元存在随时间变化的状态（如曝光倒计时、电机运动）时返回 true，
    /// 控制循环会在每个周期刷新它的状态
    fn needs_refresh(&self) -> bool {
        false
    }
}
