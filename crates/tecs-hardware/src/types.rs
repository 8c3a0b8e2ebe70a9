//! 设备信息与公共类型
//!
//! 每个设备族的 `get_info()` 返回一个强类型的信息结构体，
//! 由控制循环转换为对外发布的状态。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 设备描述（来自站点配置）
///
/// `class` 选择后端实现（如 `"fake"`），`serial` 用于定位具体设备。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub class: String,
    pub serial: String,
}

impl DeviceSpec {
    pub fn new(class: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            serial: serial.into(),
        }
    }

    /// 模拟设备
    pub fn fake(serial: impl Into<String>) -> Self {
        Self::new("fake", serial)
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.serial)
    }
}

/// 相机帧类型（快门打开 / 关闭）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    #[default]
    Normal,
    Dark,
}

/// 相机信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub serial_number: String,
    /// 曝光是否进行中
    pub exposing: bool,
    /// 剩余曝光时间（秒）
    pub time_left: f64,
    /// CCD 温度（摄氏度）
    pub ccd_temp: f64,
    /// 底座温度（摄氏度）
    pub base_temp: f64,
    /// 制冷功率（百分比）
    pub cooler_power: f64,
    /// (水平, 垂直) 合并
    pub binning: (u32, u32),
    /// 读出队列中的图像数
    pub queued_images: u32,
}

/// 调焦器信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocuserInfo {
    pub serial_number: String,
    /// 当前步进位置
    pub position: i64,
    /// 最大行程
    pub limit: i64,
    /// 剩余步数（0 表示静止）
    pub steps_remaining: i64,
    pub internal_temp: f64,
    pub external_temp: f64,
}

/// 滤光片轮信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterWheelInfo {
    pub serial_number: String,
    /// 当前滤光片槽位
    pub filter_pos: usize,
    /// 槽位总数
    pub num_positions: usize,
    /// 步进电机位置
    pub stepper_position: i64,
    pub steps_remaining: i64,
    /// 自上电以来是否已回零
    pub homed: bool,
}

/// 赤道仪状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountStatus {
    Parked,
    Stopped,
    Tracking,
    Slewing,
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MountStatus::Parked => "Parked",
            MountStatus::Stopped => "Stopped",
            MountStatus::Tracking => "Tracking",
            MountStatus::Slewing => "Slewing",
        };
        f.write_str(s)
    }
}

/// 赤道仪信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountInfo {
    pub serial_number: String,
    pub status: MountStatus,
    /// 赤经（小时）
    pub ra: f64,
    /// 赤纬（度）
    pub dec: f64,
    /// 当前指向目标（仅在 Slewing 时存在）
    pub target: Option<(f64, f64)>,
}

/// 圆顶状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomeStatus {
    Closed,
    /// 停在中途（被 halt 打断）
    PartOpen,
    Open,
    Opening,
    Closing,
}

impl DomeStatus {
    pub fn is_moving(self) -> bool {
        matches!(self, DomeStatus::Opening | DomeStatus::Closing)
    }
}

impl fmt::Display for DomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DomeStatus::Closed => "Closed",
            DomeStatus::PartOpen => "Part open",
            DomeStatus::Open => "Open",
            DomeStatus::Opening => "Opening",
            DomeStatus::Closing => "Closing",
        };
        f.write_str(s)
    }
}

/// 圆顶信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomeInfo {
    pub serial_number: String,
    pub status: DomeStatus,
    /// 开启比例（0 全关，1 全开）
    pub open_fraction: f64,
}
