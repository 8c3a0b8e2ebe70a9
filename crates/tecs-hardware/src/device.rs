//! 设备能力接口
//!
//! 每个设备族一个 trait。厂商协议（FLI、ASA 等）各自实现，
//! 具体实现由配置中的 `class` 通过 [`Backends`](crate::Backends) 选择，
//! 调用方从不对具体类型做判断。
//!
//! 所有方法都接受 `&mut self`：设备是有状态、不可重入的，
//! 只允许拥有它的控制线程调用。

use crate::error::HardwareError;
use crate::types::{CameraInfo, DomeInfo, FilterWheelInfo, FocuserInfo, FrameType, MountInfo};
use std::time::Duration;

/// 相机
pub trait Camera: Send {
    /// 设备序列号
    fn serial_number(&self) -> &str;

    /// 读取相机状态
    fn get_info(&mut self) -> Result<CameraInfo, HardwareError>;

    /// 设置下一次曝光的时长与帧类型
    fn set_exposure(&mut self, exptime: Duration, frametype: FrameType)
    -> Result<(), HardwareError>;

    /// 开始曝光（使用 `set_exposure` 设置的参数）
    fn start_exposure(&mut self) -> Result<(), HardwareError>;

    /// 中止当前曝光
    fn abort_exposure(&mut self) -> Result<(), HardwareError>;

    /// 设置制冷目标温度（摄氏度）
    fn set_temperature(&mut self, celsius: f64) -> Result<(), HardwareError>;

    /// 设置像素合并
    fn set_binning(&mut self, hbin: u32, vbin: u32) -> Result<(), HardwareError>;

    /// 清空读出队列
    fn clear_queue(&mut self) -> Result<(), HardwareError>;
}

/// 调焦器
pub trait Focuser: Send {
    fn serial_number(&self) -> &str;

    fn get_info(&mut self) -> Result<FocuserInfo, HardwareError>;

    /// 相对移动（非阻塞，通过 `get_info().steps_remaining` 观察进度）
    fn step_motor(&mut self, steps: i64) -> Result<(), HardwareError>;

    /// 回零
    fn home(&mut self) -> Result<(), HardwareError>;

    /// 停在当前位置
    fn stop(&mut self) -> Result<(), HardwareError>;
}

/// 滤光片轮
pub trait FilterWheel: Send {
    fn serial_number(&self) -> &str;

    fn get_info(&mut self) -> Result<FilterWheelInfo, HardwareError>;

    /// 转到指定槽位（非阻塞）
    fn set_filter_pos(&mut self, pos: usize) -> Result<(), HardwareError>;

    fn home(&mut self) -> Result<(), HardwareError>;
}

/// 赤道仪
pub trait Mount: Send {
    fn serial_number(&self) -> &str;

    fn get_info(&mut self) -> Result<MountInfo, HardwareError>;

    /// 指向目标（赤经：小时，赤纬：度），到达后自动跟踪
    fn slew_to_radec(&mut self, ra: f64, dec: f64) -> Result<(), HardwareError>;

    /// 开始恒星跟踪
    fn track(&mut self) -> Result<(), HardwareError>;

    /// 停止一切运动
    fn halt(&mut self) -> Result<(), HardwareError>;

    /// 停放
    fn park(&mut self) -> Result<(), HardwareError>;

    /// 解除停放（进入 Stopped）
    fn unpark(&mut self) -> Result<(), HardwareError>;
}

/// 圆顶（开合式）
pub trait Dome: Send {
    fn serial_number(&self) -> &str;

    fn get_info(&mut self) -> Result<DomeInfo, HardwareError>;

    /// 开始打开（非阻塞，通过 `get_info().status` 观察进度）
    fn open(&mut self) -> Result<(), HardwareError>;

    /// 开始关闭
    fn close(&mut self) -> Result<(), HardwareError>;

    /// 停在当前位置
    fn halt(&mut self) -> Result<(), HardwareError>;
}
