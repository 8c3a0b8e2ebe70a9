//! 圆顶守护进程
//!
//! | 命令  | Closed | PartOpen | Open   | Opening | Closing |
//! |-------|--------|----------|--------|---------|---------|
//! | open  | 入队   | 入队     | 空操作 | 拒绝    | 入队    |
//! | close | 空操作 | 入队     | 入队   | 入队    | 拒绝    |
//! | halt  | 空操作 | 空操作   | 空操作 | 入队    | 入队    |
//!
//! 反向命令直接覆盖进行中的运动。排队中的 open / close 也算运动中，
//! 此时 halt 照样入队。

use crate::dispatch::{Refusal, connected, reject, submit};
use crate::error::ControlError;
use crate::handle::DaemonHandle;
use std::time::Duration;
use tecs_driver::{Command, Daemon, DaemonBuilder, HardwareUnit, LoopConfig, PendingView};
use tecs_hardware::{Backends, DeviceSpec, Dome, DomeInfo, DomeStatus, HardwareError};

/// 圆顶守护进程唯一单元的名字
pub const DOME_UNIT: &str = "dome";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomeCommand {
    Open,
    Close,
    Halt,
}

impl Command for DomeCommand {
    fn name(&self) -> &'static str {
        match self {
            DomeCommand::Open => "open",
            DomeCommand::Close => "close",
            DomeCommand::Halt => "halt",
        }
    }
}

pub struct DomeUnit {
    spec: DeviceSpec,
    backends: Backends<dyn Dome>,
    device: Option<Box<dyn Dome>>,
    serial: Option<String>,
    moving: bool,
}

impl DomeUnit {
    pub fn new(spec: DeviceSpec, backends: Backends<dyn Dome>) -> Self {
        Self {
            spec,
            backends,
            device: None,
            serial: None,
            moving: false,
        }
    }

    fn device(&mut self) -> Result<&mut Box<dyn Dome>, HardwareError> {
        self.device.as_mut().ok_or(HardwareError::Disconnected)
    }
}

impl HardwareUnit for DomeUnit {
    type Command = DomeCommand;
    type Status = DomeInfo;

    fn name(&self) -> &str {
        DOME_UNIT
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
        self.moving = false;
    }

    fn serial_number(&self) -> Option<String> {
        self.serial.clone()
    }

    fn get_info(&mut self) -> Result<DomeInfo, HardwareError> {
        let info = self.device()?.get_info()?;
        self.moving = info.status.is_moving();
        Ok(info)
    }

    fn execute(&mut self, command: DomeCommand) -> Result<(), HardwareError> {
        let device = self.device()?;
        match command {
            DomeCommand::Open => device.open()?,
            DomeCommand::Close => device.close()?,
            DomeCommand::Halt => device.halt()?,
        }
        self.moving = command != DomeCommand::Halt;
        Ok(())
    }

    fn needs_refresh(&self) -> bool {
        self.moving
    }
}

/// 圆顶守护进程
pub struct DomeDaemon {
    daemon: Daemon<DomeUnit>,
    info_timeout: Duration,
}

impl DaemonHandle for DomeDaemon {
    type Unit = DomeUnit;

    fn daemon(&self) -> &Daemon<DomeUnit> {
        &self.daemon
    }

    fn info_timeout(&self) -> Duration {
        self.info_timeout
    }
}

impl DomeDaemon {
    pub fn spawn(
        id: &str,
        spec: DeviceSpec,
        backends: Backends<dyn Dome>,
        config: LoopConfig,
    ) -> Result<Self, ControlError> {
        let daemon = DaemonBuilder::new(id)
            .unit(DomeUnit::new(spec, backends))
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

    pub fn open_dome(&self) -> Result<String, ControlError> {
        self.submit(DomeCommand::Open, |info, pending| {
            if pending.this() {
                return Err(reject("open already queued"));
            }
            match info.status {
                DomeStatus::Open if !pending.operation("close") => {
                    Err(Refusal::Skip("already open".to_string()))
                },
                DomeStatus::Opening => Err(reject("dome is already opening")),
                _ => Ok("opening dome".to_string()),
            }
        })
    }

    pub fn close_dome(&self) -> Result<String, ControlError> {
        self.submit(DomeCommand::Close, |info, pending| {
            if pending.this() {
                return Err(reject("close already queued"));
            }
            match info.status {
                DomeStatus::Closed if !pending.operation("open") => {
                    Err(Refusal::Skip("already closed".to_string()))
                },
                DomeStatus::Closing => Err(reject("dome is already closing")),
                _ => Ok("closing dome".to_string()),
            }
        })
    }

    /// 停在当前位置
    pub fn halt_dome(&self) -> Result<String, ControlError> {
        self.submit(DomeCommand::Halt, |info, pending| {
            if pending.this() {
                return Err(Refusal::Skip("already halting".to_string()));
            }
            let queued = pending.operation("open") || pending.operation("close");
            if !info.status.is_moving() && !queued {
                return Err(Refusal::Skip(format!("not moving ({})", info.status)));
            }
            Ok("halting dome".to_string())
        })
    }

    /// 最近快照中的圆顶状态（未连接时为 None）
    pub fn dome_status(&self) -> Option<DomeStatus> {
        self.daemon
            .current()
            .status_of(DOME_UNIT)
            .map(|info| info.status)
    }

    fn submit(
        &self,
        command: DomeCommand,
        gate: impl FnOnce(&DomeInfo, &PendingView<'_, DomeCommand>) -> Result<String, Refusal>,
    ) -> Result<String, ControlError> {
        submit(&self.daemon, DOME_UNIT, command, |snapshot, pending| {
            let info = connected(snapshot, DOME_UNIT)?;
            gate(info, pending)
        })
    }
}
