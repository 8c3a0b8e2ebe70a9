//! 调焦器守护进程
//!
//! 每台望远镜一个单元。移动命令只在电机静止、没有排队中的移动/回零，
//! 且终点位于 `0..=limit` 内时接受。停止命令恰好相反：只在电机运动中
//! 或有移动排队时才有意义，静止时是空操作。

use crate::dispatch::{Refusal, connected, dispatch, reject};
use crate::error::ControlError;
use crate::handle::DaemonHandle;
use std::sync::Arc;
use std::time::Duration;
use tecs_driver::{
    Command, Daemon, DaemonBuilder, HardwareUnit, LoopConfig, PendingView, StatusSnapshot,
};
use tecs_hardware::{Backends, DeviceSpec, Focuser, FocuserInfo, HardwareError};

#[derive(Debug, Clone, PartialEq)]
pub enum FocuserCommand {
    /// 相对移动
    Step(i64),
    /// 绝对位置（执行时按当前位置换算成步数）
    MoveTo(i64),
    Home,
    /// 停在当前位置
    Stop,
}

impl Command for FocuserCommand {
    fn name(&self) -> &'static str {
        match self {
            // 相对与绝对移动共用一个键，后写者胜
            FocuserCommand::Step(_) | FocuserCommand::MoveTo(_) => "move",
            FocuserCommand::Home => "home",
            FocuserCommand::Stop => "stop",
        }
    }
}

pub struct FocuserUnit {
    name: String,
    spec: DeviceSpec,
    backends: Arc<Backends<dyn Focuser>>,
    device: Option<Box<dyn Focuser>>,
    serial: Option<String>,
    moving: bool,
}

impl FocuserUnit {
    pub fn new(name: impl Into<String>, spec: DeviceSpec, backends: Arc<Backends<dyn Focuser>>) -> Self {
        Self {
            name: name.into(),
            spec,
            backends,
            device: None,
            serial: None,
            moving: false,
        }
    }

    fn device(&mut self) -> Result<&mut Box<dyn Focuser>, HardwareError> {
        self.device.as_mut().ok_or(HardwareError::Disconnected)
    }
}

impl HardwareUnit for FocuserUnit {
    type Command = FocuserCommand;
    type Status = FocuserInfo;

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
        self.moving = false;
    }

    fn serial_number(&self) -> Option<String> {
        self.serial.clone()
    }

    fn get_info(&mut self) -> Result<FocuserInfo, HardwareError> {
        let info = self.device()?.get_info()?;
        self.moving = info.steps_remaining != 0;
        Ok(info)
    }

    fn execute(&mut self, command: FocuserCommand) -> Result<(), HardwareError> {
        let device = self.device()?;
        match command {
            FocuserCommand::Step(steps) => device.step_motor(steps)?,
            FocuserCommand::MoveTo(position) => {
                let current = device.get_info()?.position;
                let steps = position.checked_sub(current).ok_or_else(|| {
                    HardwareError::InvalidArgument(format!("cannot move from {} to {}", current, position))
                })?;
                device.step_motor(steps)?;
            },
            FocuserCommand::Home => device.home()?,
            FocuserCommand::Stop => device.stop()?,
        }
        self.moving = true;
        Ok(())
    }

    fn needs_refresh(&self) -> bool {
        self.moving
    }
}

/// 调焦器守护进程
pub struct FocuserDaemon {
    daemon: Daemon<FocuserUnit>,
    info_timeout: Duration,
}

impl DaemonHandle for FocuserDaemon {
    type Unit = FocuserUnit;

    fn daemon(&self) -> &Daemon<FocuserUnit> {
        &self.daemon
    }

    fn info_timeout(&self) -> Duration {
        self.info_timeout
    }
}

impl FocuserDaemon {
    /// `units`：(望远镜名, 调焦器描述)
    pub fn spawn(
        id: &str,
        units: impl IntoIterator<Item = (String, DeviceSpec)>,
        backends: Backends<dyn Focuser>,
        config: LoopConfig,
    ) -> Result<Self, ControlError> {
        let backends = Arc::new(backends);
        let daemon = DaemonBuilder::new(id)
            .units(
                units
                    .into_iter()
                    .map(|(name, spec)| FocuserUnit::new(name, spec, backends.clone())),
            )
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

    /// 相对移动 `steps` 步
    pub fn move_focuser(&self, steps: i64, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| FocuserCommand::Step(steps),
            |unit, snapshot, pending| {
                let info = ready(snapshot, unit, pending)?;
                match info.position.checked_add(steps) {
                    Some(target) => within_limits(info, target)?,
                    None => return Err(past_limits(info, steps)),
                }
                Ok(format!("moving {} steps", steps))
            },
        )
    }

    /// 移动到绝对位置
    pub fn set_focuser(&self, position: i64, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| FocuserCommand::MoveTo(position),
            |unit, snapshot, pending| {
                let info = ready(snapshot, unit, pending)?;
                within_limits(info, position)?;
                if info.position == position {
                    return Err(Refusal::Skip(format!("already at {}", position)));
                }
                Ok(format!("moving to {}", position))
            },
        )
    }

    /// 回零
    pub fn home_focuser(&self, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| FocuserCommand::Home,
            |unit, snapshot, pending| {
                ready(snapshot, unit, pending)?;
                Ok("moving to home position".to_string())
            },
        )
    }

    /// 停止电机
    ///
    /// 排在同一周期的移动之后执行，因此也能截住刚入队的移动。
    pub fn stop_focuser(&self, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| FocuserCommand::Stop,
            |unit, snapshot, pending| {
                let info = connected(snapshot, unit)?;
                if pending.this() {
                    return Err(Refusal::Skip("already stopping".to_string()));
                }
                let queued = pending.operation("move") || pending.operation("home");
                if info.steps_remaining == 0 && !queued {
                    return Err(Refusal::Skip("not moving".to_string()));
                }
                Ok(format!("stopping at {}", info.position))
            },
        )
    }
}

/// 已连接、静止、没有排队中的移动
fn ready<'a>(
    snapshot: &'a StatusSnapshot<FocuserInfo>,
    unit: &str,
    pending: &PendingView<'_, FocuserCommand>,
) -> Result<&'a FocuserInfo, Refusal> {
    let info = connected(snapshot, unit)?;
    if pending.operation("move") || pending.operation("home") {
        return Err(reject("move already queued"));
    }
    if info.steps_remaining != 0 {
        return Err(reject("Motor is still moving"));
    }
    Ok(info)
}

fn within_limits(info: &FocuserInfo, target: i64) -> Result<(), Refusal> {
    if !(0..=info.limit).contains(&target) {
        return Err(reject(format!(
            "End position past limits (0..={}, requested {})",
            info.limit, target
        )));
    }
    Ok(())
}

/// 目标位置超出 i64 范围
fn past_limits(info: &FocuserInfo, steps: i64) -> Refusal {
    reject(format!(
        "End position past limits (0..={}, requested {} {:+} steps)",
        info.limit, info.position, steps
    ))
}
