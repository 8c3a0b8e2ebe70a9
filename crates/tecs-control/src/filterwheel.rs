//! 滤光片轮守护进程
//!
//! 滤光片按名字选择，名字到槽位的映射来自站点配置（所有轮共用一份列表）。

use crate::dispatch::{Refusal, connected, dispatch, reject};
use crate::error::ControlError;
use crate::handle::DaemonHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tecs_driver::{
    Command, Daemon, DaemonBuilder, HardwareUnit, LoopConfig, PendingView, StatusSnapshot,
};
use tecs_hardware::{Backends, DeviceSpec, FilterWheel, HardwareError};

/// 滤光片轮状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterStatus {
    /// 当前滤光片名（槽位超出名字列表时为 None）
    pub filter: Option<String>,
    pub filter_pos: usize,
    pub num_positions: usize,
    pub stepper_position: i64,
    pub steps_remaining: i64,
    pub homed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterCommand {
    SetFilter(usize),
    Home,
}

impl Command for FilterCommand {
    fn name(&self) -> &'static str {
        match self {
            FilterCommand::SetFilter(_) => "set_filter",
            FilterCommand::Home => "home",
        }
    }
}

pub struct FilterWheelUnit {
    name: String,
    spec: DeviceSpec,
    filters: Arc<[String]>,
    backends: Arc<Backends<dyn FilterWheel>>,
    device: Option<Box<dyn FilterWheel>>,
    serial: Option<String>,
    moving: bool,
}

impl FilterWheelUnit {
    pub fn new(
        name: impl Into<String>,
        spec: DeviceSpec,
        filters: Arc<[String]>,
        backends: Arc<Backends<dyn FilterWheel>>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            filters,
            backends,
            device: None,
            serial: None,
            moving: false,
        }
    }

    fn device(&mut self) -> Result<&mut Box<dyn FilterWheel>, HardwareError> {
        self.device.as_mut().ok_or(HardwareError::Disconnected)
    }
}

impl HardwareUnit for FilterWheelUnit {
    type Command = FilterCommand;
    type Status = FilterStatus;

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

    fn get_info(&mut self) -> Result<FilterStatus, HardwareError> {
        let info = self.device()?.get_info()?;
        self.moving = info.steps_remaining != 0;
        Ok(FilterStatus {
            filter: self.filters.get(info.filter_pos).cloned(),
            filter_pos: info.filter_pos,
            num_positions: info.num_positions,
            stepper_position: info.stepper_position,
            steps_remaining: info.steps_remaining,
            homed: info.homed,
        })
    }

    fn execute(&mut self, command: FilterCommand) -> Result<(), HardwareError> {
        let device = self.device()?;
        match command {
            FilterCommand::SetFilter(pos) => device.set_filter_pos(pos)?,
            FilterCommand::Home => device.home()?,
        }
        self.moving = true;
        Ok(())
    }

    fn needs_refresh(&self) -> bool {
        self.moving
    }
}

/// 滤光片轮守护进程
pub struct FilterWheelDaemon {
    daemon: Daemon<FilterWheelUnit>,
    filters: Arc<[String]>,
    info_timeout: Duration,
}

impl DaemonHandle for FilterWheelDaemon {
    type Unit = FilterWheelUnit;

    fn daemon(&self) -> &Daemon<FilterWheelUnit> {
        &self.daemon
    }

    fn info_timeout(&self) -> Duration {
        self.info_timeout
    }
}

impl FilterWheelDaemon {
    /// `units`：(望远镜名, 滤光片轮描述)；`filters`：按槽位排列的滤光片名
    pub fn spawn(
        id: &str,
        units: impl IntoIterator<Item = (String, DeviceSpec)>,
        filters: Vec<String>,
        backends: Backends<dyn FilterWheel>,
        config: LoopConfig,
    ) -> Result<Self, ControlError> {
        let filters: Arc<[String]> = filters.into();
        let backends = Arc::new(backends);
        let daemon = DaemonBuilder::new(id)
            .units(units.into_iter().map(|(name, spec)| {
                FilterWheelUnit::new(name, spec, filters.clone(), backends.clone())
            }))
            .config(config)
            .spawn()?;
        Ok(Self {
            daemon,
            filters,
            info_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_info_timeout(mut self, timeout: Duration) -> Self {
        self.info_timeout = timeout;
        self
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// 按名字切换滤光片
    pub fn set_filter(&self, filter: &str, units: &[String]) -> Result<String, ControlError> {
        let pos = self
            .filters
            .iter()
            .position(|f| f.eq_ignore_ascii_case(filter))
            .ok_or_else(|| {
                ControlError::InvalidParameter(format!(
                    "\"{}\" not in filter list ({})",
                    filter,
                    self.filters.join(",")
                ))
            })?;
        let name = &self.filters[pos];

        dispatch(
            &self.daemon,
            units,
            |_| FilterCommand::SetFilter(pos),
            |unit, snapshot, pending| {
                let status = ready(snapshot, unit, pending)?;
                if pos >= status.num_positions {
                    return Err(reject(format!(
                        "wheel has only {} positions",
                        status.num_positions
                    )));
                }
                if !status.homed {
                    return Err(reject("filter wheel is not homed"));
                }
                if status.filter_pos == pos {
                    return Err(Refusal::Skip(format!("already at {}", name)));
                }
                Ok(format!("moving to {} (position {})", name, pos))
            },
        )
    }

    /// 回零
    pub fn home_filter(&self, units: &[String]) -> Result<String, ControlError> {
        dispatch(
            &self.daemon,
            units,
            |_| FilterCommand::Home,
            |unit, snapshot, pending| {
                ready(snapshot, unit, pending)?;
                Ok("moving to home position".to_string())
            },
        )
    }
}

fn ready<'a>(
    snapshot: &'a StatusSnapshot<FilterStatus>,
    unit: &str,
    pending: &PendingView<'_, FilterCommand>,
) -> Result<&'a FilterStatus, Refusal> {
    let status = connected(snapshot, unit)?;
    if pending.operation("set_filter") || pending.operation("home") {
        return Err(reject("move already queued"));
    }
    if status.steps_remaining != 0 {
        return Err(reject("Motor is still moving"));
    }
    Ok(status)
}
