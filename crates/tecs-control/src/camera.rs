//! 相机守护进程
//!
//! 一个守护进程管理一个接口上所有望远镜的相机（每台望远镜一个单元）。
//!
//! 曝光状态机：
//!
//! ```text
//!   Idle ──start_exposure──▶ Exposing
//!    ▲                          │
//!    └──── 到时 / abort ────────┘
//! ```
//!
//! - `start_exposure`（take_image / take_dark / take_bias）只在 Idle 且没有排队中的曝光时接受
//! - `abort_exposure` 只在 Exposing（或曝光已排队）时入队，否则为空操作
//! - 曝光结束只由控制线程在刷新状态时发现

use crate::dispatch::{Refusal, connected, dispatch, reject};
use crate::error::ControlError;
use crate::handle::DaemonHandle;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tecs_driver::{Command, Daemon, DaemonBuilder, HardwareUnit, LoopConfig};
use tecs_hardware::{Backends, Camera, DeviceSpec, FrameType, HardwareError};

/// 制冷目标温度允许范围（摄氏度）
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = -55.0..=45.0;

/// 曝光种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureKind {
    Image,
    Dark,
    Bias,
}

impl ExposureKind {
    fn frametype(self) -> FrameType {
        match self {
            ExposureKind::Image => FrameType::Normal,
            ExposureKind::Dark | ExposureKind::Bias => FrameType::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureState {
    Idle,
    Exposing,
}

/// 相机状态（随快照发布）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraStatus {
    pub exposure: ExposureState,
    /// 剩余曝光时间（秒）
    pub time_left: f64,
    /// 最近一次曝光的参数
    pub exptime: f64,
    pub kind: Option<ExposureKind>,
    pub ccd_temp: f64,
    pub base_temp: f64,
    pub target_temp: Option<f64>,
    pub cooler_power: f64,
    pub binning: (u32, u32),
    pub queued_images: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommand {
    StartExposure { exptime: Duration, kind: ExposureKind },
    AbortExposure,
    SetTemperature(f64),
    SetBinning(u32, u32),
    ClearQueue,
}

impl Command for CameraCommand {
    fn name(&self) -> &'static str {
        match self {
            CameraCommand::StartExposure { .. } => "start_exposure",
            CameraCommand::AbortExposure => "abort_exposure",
            CameraCommand::SetTemperature(_) => "set_temperature",
            CameraCommand::SetBinning(..) => "set_binning",
            CameraCommand::ClearQueue => "clear_queue",
        }
    }
}

/// 一台望远镜的相机
pub struct CameraUnit {
    name: String,
    spec: DeviceSpec,
    backends: Arc<Backends<dyn Camera>>,
    device: Option<Box<dyn Camera>>,
    serial: Option<String>,
    exposing: bool,
    exptime: Duration,
    kind: Option<ExposureKind>,
    target_temp: Option<f64>,
}

impl CameraUnit {
    pub fn new(name: impl Into<String>, spec: DeviceSpec, backends: Arc<Backends<dyn Camera>>) -> Self {
        Self {
            name: name.into(),
            spec,
            backends,
            device: None,
            serial: None,
            exposing: false,
            exptime: Duration::ZERO,
            kind: None,
            target_temp: None,
        }
    }

    fn device(&mut self) -> Result<&mut Box<dyn Camera>, HardwareError> {
        self.device.as_mut().ok_or(HardwareError::Disconnected)
    }
}

impl HardwareUnit for CameraUnit {
    type Command = CameraCommand;
    type Status = CameraStatus;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    fn connect(&mut self) -> Result<(), HardwareError> {
        let device = self
            .backends
            .locate(&self.spec)?
            .ok_or_else(|| HardwareError::NotFound(self.spec.to_string()))?;
        self.serial = Some(device.serial_number().to_string());
        self.device = Some(device);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.device = None;
        self.exposing = false;
    }

    fn serial_number(&self) -> Option<String> {
        self.serial.clone()
    }

    fn get_info(&mut self) -> Result<CameraStatus, HardwareError> {
        let info = self.device()?.get_info()?;
        self.exposing = info.exposing;
        Ok(CameraStatus {
            exposure: if info.exposing {
                ExposureState::Exposing
            } else {
                ExposureState::Idle
            },
            time_left: info.time_left,
            exptime: self.exptime.as_secs_f64(),
            kind: self.kind,
            ccd_temp: info.ccd_temp,
            base_temp: info.base_temp,
            target_temp: self.target_temp,
            cooler_power: info.cooler_power,
            binning: info.binning,
            queued_images: info.queued_images,
        })
    }

    fn execute(&mut self, command: CameraCommand) -> Result<(), HardwareError> {
        match command {
            CameraCommand::StartExposure { exptime, kind } => {
                let device = self.device()?;
                device.set_exposure(exptime, kind.frametype())?;
                device.start_exposure()?;
                self.exptime = exptime;
                self.kind = Some(kind);
                self.exposing = true;
            },
            CameraCommand::AbortExposure => {
                self.device()?.abort_exposure()?;
                self.exposing = false;
            },
            CameraCommand::SetTemperature(celsius) => {
                self.device()?.set_temperature(celsius)?;
                self.target_temp = Some(celsius);
            },
            CameraCommand::SetBinning(h, v) => self.device()?.set_binning(h, v)?,
            CameraCommand::ClearQueue => self.device()?.clear_queue()?,
        }
        Ok(())
    }

    fn needs_refresh(&self) -> bool {
        self.exposing
    }
}

/// 相机守护进程
pub struct CameraDaemon {
    daemon: Daemon<CameraUnit>,
    run_number: AtomicU64,
    info_timeout: Duration,
}

impl DaemonHandle for CameraDaemon {
    type Unit = CameraUnit;

    fn daemon(&self) -> &Daemon<CameraUnit> {
        &self.daemon
    }

    fn info_timeout(&self) -> Duration {
        self.info_timeout
    }
}

impl CameraDaemon {
    /// 启动控制线程
    ///
    /// `units`：(望远镜名, 相机描述)
    pub fn spawn(
        id: &str,
        units: impl IntoIterator<Item = (String, DeviceSpec)>,
        backends: Backends<dyn Camera>,
        config: LoopConfig,
    ) -> Result<Self, ControlError> {
        let backends = Arc::new(backends);
        let daemon = DaemonBuilder::new(id)
            .units(
                units
                    .into_iter()
                    .map(|(name, spec)| CameraUnit::new(name, spec, backends.clone())),
            )
            .config(config)
            .spawn()?;
        Ok(Self {
            daemon,
            run_number: AtomicU64::new(0),
            info_timeout: Duration::from_secs(5),
        })
    }

    /// `get_info(force = true)` 的等待上限
    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    /// 拍摄图像
    pub fn take_image(&self, exptime: f64, units: &[String]) -> Result<String, ControlError> {
        self.start_exposure(exptime, ExposureKind::Image, units)
    }

    /// 拍摄暗场
    pub fn take_dark(&self, exptime: f64, units: &[String]) -> Result<String, ControlError> {
        self.start_exposure(exptime, ExposureKind::Dark, units)
    }

    /// 拍摄本底（零秒暗场）
    pub fn take_bias(&self, units: &[String]) -> Result<String, ControlError> {
        self.start_exposure(0.0, ExposureKind::Bias, units)
    }

    fn start_exposure(
        &self,
        exptime: f64,
        kind: ExposureKind,
        units: &[String],
    ) -> Result<String, ControlError> {
        if !exptime.is_finite() || exptime < 0.0 {
            return Err(ControlError::InvalidParameter(format!(
                "exposure time must be >= 0 s, got {}",
                exptime
            )));
        }
        let duration = Duration::try_from_secs_f64(exptime).map_err(|_| {
            ControlError::InvalidParameter(format!("exposure time out of range: {}", exptime))
        })?;

        let report = dispatch(
            &self.daemon,
            units,
            |_| CameraCommand::StartExposure {
                exptime: duration,
                kind,
            },
            |unit, snapshot, pending| {
                let status = connected(snapshot, unit)?;
                if pending.this() {
                    return Err(reject("exposure already queued"));
                }
                if status.exposure == ExposureState::Exposing {
                    return Err(reject("already exposing"));
                }
                Ok(format!("exposing {:?} ({} s)", kind, exptime))
            },
        )?;

        let run = self.run_number.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("run {}\n{}", run, report))
    }

    /// 中止曝光
    pub fn abort_exposure(&self, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| CameraCommand::AbortExposure,
            |unit, snapshot, pending| {
                let status = connected(snapshot, unit)?;
                if status.exposure == ExposureState::Exposing || pending.operation("start_exposure") {
                    Ok("aborting exposure".to_string())
                } else {
                    Err(Refusal::Skip("not exposing".to_string()))
                }
            },
        )
    }

    /// 设置制冷目标温度
    pub fn set_temperature(&self, celsius: f64, units: &[String]) -> Result<String, ControlError> {
        if !TEMPERATURE_RANGE.contains(&celsius) {
            return Err(ControlError::InvalidParameter(format!(
                "temperature must be within {}..={} C, got {}",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end(),
                celsius
            )));
        }
        dispatch(
            &self.daemon,
            units,
            |_| CameraCommand::SetTemperature(celsius),
            |unit, snapshot, _| {
                connected(snapshot, unit)?;
                Ok(format!("setting temperature to {} C", celsius))
            },
        )
    }

    /// 设置像素合并（曝光中不允许）
    pub fn set_binning(&self, hbin: u32, vbin: u32, units: &[String]) -> Result<String, ControlError> {
        if hbin == 0 || vbin == 0 {
            return Err(ControlError::InvalidParameter(format!(
                "binning must be >= 1, got {}x{}",
                hbin, vbin
            )));
        }
        dispatch(
            &self.daemon,
            units,
            |_| CameraCommand::SetBinning(hbin, vbin),
            |unit, snapshot, pending| {
                let status = connected(snapshot, unit)?;
                if status.exposure == ExposureState::Exposing || pending.operation("start_exposure") {
                    return Err(reject("cannot change binning while exposing"));
                }
                Ok(format!("setting binning to {}x{}", hbin, vbin))
            },
        )
    }

    /// 清空读出队列
    pub fn clear_queue(&self, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| CameraCommand::ClearQueue,
            |unit, snapshot, _| {
                connected(snapshot, unit)?;
                Ok("clearing image queue".to_string())
            },
        )
    }

    /// 已接受的曝光请求数
    pub fn run_number(&self) -> u64 {
        self.run_number.load(Ordering::Relaxed)
    }
}
