//! 赤道仪守护进程
//!
//! 状态机（状态只来自快照，由控制线程刷新）：
//!
//! | 命令    | Parked | Stopped | Tracking | Slewing |
//! |---------|--------|---------|----------|---------|
//! | slew    | 拒绝   | 入队    | 入队     | 拒绝    |
//! | track   | 拒绝   | 入队    | 空操作   | 拒绝    |
//! | halt    | 拒绝   | 空操作  | 入队     | 入队    |
//! | park    | 拒绝   | 入队    | 入队     | 入队    |
//! | unpark  | 入队   | 拒绝    | 拒绝     | 拒绝    |

use crate::dispatch::{Refusal, connected, reject, submit};
use crate::error::ControlError;
use crate::handle::DaemonHandle;
use std::time::Duration;
use tecs_driver::{Command, Daemon, DaemonBuilder, HardwareUnit, LoopConfig, PendingView};
use tecs_hardware::{Backends, DeviceSpec, HardwareError, Mount, MountInfo, MountStatus};

/// 赤道仪守护进程唯一单元的名字
pub const MOUNT_UNIT: &str = "mount";

#[derive(Debug, Clone, PartialEq)]
pub enum MountCommand {
    /// 赤经（小时）、赤纬（度）
    Slew { ra: f64, dec: f64 },
    Track,
    Halt,
    Park,
    Unpark,
}

impl Command for MountCommand {
    fn name(&self) -> &'static str {
        match self {
            MountCommand::Slew { .. } => "slew",
            MountCommand::Track => "track",
            MountCommand::Halt => "halt",
            MountCommand::Park => "park",
            MountCommand::Unpark => "unpark",
        }
    }
}

pub struct MountUnit {
    spec: DeviceSpec,
    backends: Backends<dyn Mount>,
    device: Option<Box<dyn Mount>>,
    serial: Option<String>,
    status: Option<MountStatus>,
}

impl MountUnit {
    pub fn new(spec: DeviceSpec, backends: Backends<dyn Mount>) -> Self {
        Self {
            spec,
            backends,
            device: None,
            serial: None,
            status: None,
        }
    }

    fn device(&mut self) -> Result<&mut Box<dyn Mount>, HardwareError> {
        self.device.as_mut().ok_or(HardwareError::Disconnected)
    }
}

impl HardwareUnit for MountUnit {
    type Command = MountCommand;
    type Status = MountInfo;

    fn name(&self) -> &str {
        MOUNT_UNIT
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
        self.status = None;
    }

    fn serial_number(&self) -> Option<String> {
        self.serial.clone()
    }

    fn get_info(&mut self) -> Result<MountInfo, HardwareError> {
        let info = self.device()?.get_info()?;
        self.status = Some(info.status);
        Ok(info)
    }

    fn execute(&mut self, command: MountCommand) -> Result<(), HardwareError> {
        let device = self.device()?;
        match command {
            MountCommand::Slew { ra, dec } => device.slew_to_radec(ra, dec),
            MountCommand::Track => device.track(),
            MountCommand::Halt => device.halt(),
            MountCommand::Park => device.park(),
            MountCommand::Unpark => device.unpark(),
        }
    }

    // 指向过程中持续刷新，让 Slewing -> Tracking 尽快出现在快照里
    fn needs_refresh(&self) -> bool {
        self.status == Some(MountStatus::Slewing)
    }
}

/// 赤道仪守护进程
pub struct MountDaemon {
    daemon: Daemon<MountUnit>,
    info_timeout: Duration,
}

impl DaemonHandle for MountDaemon {
    type Unit = MountUnit;

    fn daemon(&self) -> &Daemon<MountUnit> {
        &self.daemon
    }

    fn info_timeout(&self) -> Duration {
        self.info_timeout
    }
}

impl MountDaemon {
    pub fn spawn(
        id: &str,
        spec: DeviceSpec,
        backends: Backends<dyn Mount>,
        config: LoopConfig,
    ) -> Result<Self, ControlError> {
        let daemon = DaemonBuilder::new(id)
            .unit(MountUnit::new(spec, backends))
            .config(config)
            .spawn()?;
        Ok(Self {
            daemon,
            info_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    /// 指向目标
    pub fn slew_to_radec(&self, ra: f64, dec: f64) -> Result<String, ControlError> {
        if !(0.0..24.0).contains(&ra) {
            return Err(ControlError::InvalidParameter(format!(
                "RA must be within 0..24 h, got {}",
                ra
            )));
        }
        if !(-90.0..=90.0).contains(&dec) {
            return Err(ControlError::InvalidParameter(format!(
                "Dec must be within -90..=90 deg, got {}",
                dec
            )));
        }
        self.submit(MountCommand::Slew { ra, dec }, |info, pending| {
            if pending.operation("park") {
                return Err(reject("park is queued"));
            }
            match info.status {
                MountStatus::Stopped | MountStatus::Tracking => {
                    Ok(format!("slewing to RA {:.4} h, Dec {:.4} deg", ra, dec))
                },
                MountStatus::Slewing => Err(reject("already slewing")),
                MountStatus::Parked => Err(reject("mount is parked")),
            }
        })
    }

    /// 开始跟踪
    pub fn start_tracking(&self) -> Result<String, ControlError> {
        self.submit(MountCommand::Track, |info, _| match info.status {
            MountStatus::Stopped => Ok("started tracking".to_string()),
            MountStatus::Tracking => Err(Refusal::Skip("already tracking".to_string())),
            MountStatus::Slewing => Err(reject("mount is slewing")),
            MountStatus::Parked => Err(reject("mount is parked")),
        })
    }

    /// 停止一切运动
    pub fn full_stop(&self) -> Result<String, ControlError> {
        self.submit(MountCommand::Halt, |info, _| match info.status {
            MountStatus::Tracking | MountStatus::Slewing => Ok("halting mount".to_string()),
            MountStatus::Stopped => Err(Refusal::Skip("already stopped".to_string())),
            MountStatus::Parked => Err(reject("mount is parked")),
        })
    }

    pub fn park(&self) -> Result<String, ControlError> {
        self.submit(MountCommand::Park, |info, _| match info.status {
            MountStatus::Parked => Err(reject("already parked")),
            _ => Ok("parking mount".to_string()),
        })
    }

    pub fn unpark(&self) -> Result<String, ControlError> {
        self.submit(MountCommand::Unpark, |info, _| match info.status {
            MountStatus::Parked => Ok("unparking mount".to_string()),
            other => Err(reject(format!("mount is not parked ({})", other))),
        })
    }

    fn submit(
        &self,
        command: MountCommand,
        gate: impl FnOnce(&MountInfo, &PendingView<'_, MountCommand>) -> Result<String, Refusal>,
    ) -> Result<String, ControlError> {
        submit(&self.daemon, MOUNT_UNIT, command, |snapshot, pending| {
            let info = connected(snapshot, MOUNT_UNIT)?;
            gate(info, pending)
        })
    }

    /// 最近快照中的赤道仪状态（未连接时为 None）
    pub fn mount_status(&self) -> Option<MountStatus> {
        self.daemon
            .current()
            .status_of(MOUNT_UNIT)
            .map(|info| info.status)
    }
}
