//! # TeCS Hardware
//!
//! 硬件抽象层：设备族能力接口、后端注册表、错误类型和模拟设备。
//!
//! - [`Camera`] / [`Focuser`] / [`FilterWheel`] / [`Mount`] / [`Dome`]：设备能力 trait
//! - [`Backends`]：按配置中的 `class` 选择实现
//! - [`fake`]：基于时间的模拟设备与故障注入
//!
//! 本层不涉及线程：所有设备对象由上层控制线程独占。

mod backend;
mod device;
mod error;
pub mod fake;
mod types;

pub use backend::{Backends, Locator};
pub use device::{Camera, Dome, FilterWheel, Focuser, Mount};
pub use error::HardwareError;
pub use types::{
    CameraInfo, DeviceSpec, DomeInfo, DomeStatus, FilterWheelInfo, FocuserInfo, FrameType,
    MountInfo, MountStatus,
};
