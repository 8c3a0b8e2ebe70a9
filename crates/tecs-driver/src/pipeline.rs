//! 控制循环模块
//!
//! [`control_loop`] 是唯一调用硬件驱动的代码路径。每个周期：
//!
//! 1. 检查到期（距上次检查 ≥ `check_period`）或被请求时：
//!    - 对未连接的单元调用 `connect()`，失败则记入 `bad_hardware`，单元保持未连接
//!    - 对已连接的单元调用 `get_info()`，失败则记入 `bad_hardware` 并丢弃驱动句柄
//!    - 在邮箱锁内发布新快照并 `settle` 在途命令
//!    - 本次检查有任何失败：跳过本周期的命令执行（下次检查在周期到期后，无次数上限、无退避）
//! 2. 取走邮箱中的全部命令，逐条对已连接的单元执行；
//!    瞬态错误将单元降级，其他错误只记录日志；执行过命令则请求下一周期立即检查
//! 3. 记录心跳，休眠 `sleep_time`，直到 `running` 被清除

use crate::command::{CommandChannel, Envelope};
use crate::heartbeat::LoopMonitor;
use crate::registry::HardwareRegistry;
use crate::state::{StatusPublisher, StatusSnapshot, UnitStatus};
use crate::unit::HardwareUnit;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, trace, warn};

/// 控制循环配置
///
/// # Example
///
/// ```
/// use tecs_driver::LoopConfig;
/// use std::time::Duration;
///
/// let config = LoopConfig {
///     check_period: Duration::from_secs(1),
///     ..LoopConfig::default()
/// };
/// assert_eq!(config.ping_life, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// 周期性检查硬件（重连 + 读取状态）的间隔
    pub check_period: Duration,
    /// 每个周期结束时的休眠
    pub sleep_time: Duration,
    /// 心跳超过该时长未更新即视为控制线程卡死
    pub ping_life: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            check_period: Duration::from_secs(3),
            sleep_time: Duration::from_millis(10),
            ping_life: Duration::from_secs(10),
        }
    }
}

/// 控制线程与 RPC 工作线程共享的上下文
pub struct DaemonContext<U: HardwareUnit> {
    pub daemon_id: String,
    pub channel: CommandChannel<U::Command>,
    pub publisher: StatusPublisher<U::Status>,
    pub monitor: LoopMonitor,
    pub running: AtomicBool,
    pub started: Instant,
}

impl<U: HardwareUnit> DaemonContext<U> {
    pub fn new<'a>(
        daemon_id: &str,
        unit_names: impl IntoIterator<Item = &'a str>,
        ping_life: Duration,
    ) -> Self {
        Self {
            daemon_id: daemon_id.to_string(),
            channel: CommandChannel::new(),
            publisher: StatusPublisher::new(StatusSnapshot::initial(daemon_id, unit_names)),
            monitor: LoopMonitor::new(ping_life),
            running: AtomicBool::new(true),
            started: Instant::now(),
        }
    }

    fn snapshot(
        &self,
        cycle: u64,
        check_ticket: u64,
        units: &BTreeMap<String, UnitStatus<U::Status>>,
        registry: &HardwareRegistry,
    ) -> StatusSnapshot<U::Status> {
        StatusSnapshot {
            daemon_id: self.daemon_id.clone(),
            cycle,
            check_ticket,
            timestamp: SystemTime::now(),
            uptime: self.started.elapsed(),
            units: units.clone(),
            bad_hardware: registry.bad_set(),
            hardware_error: registry.has_error(),
        }
    }
}

/// 控制循环（独占 `units`，直到 `running` 被清除）
pub fn control_loop<U: HardwareUnit>(
    mut units: Vec<U>,
    ctx: Arc<DaemonContext<U>>,
    config: LoopConfig,
) {
    let mut registry = HardwareRegistry::new();
    let mut statuses: BTreeMap<String, UnitStatus<U::Status>> = units
        .iter()
        .map(|u| (u.name().to_string(), UnitStatus::absent()))
        .collect();
    let mut cycle: u64 = 0;
    let mut check_ticket: u64 = 0;
    let mut last_check: Option<Instant> = None;

    info!(
        "{}: control thread started ({} units)",
        ctx.daemon_id,
        units.len()
    );

    // Acquire: 看到 false 时，shutdown 之前的写入都可见
    while ctx.running.load(Ordering::Acquire) {
        let forced = ctx.channel.take_check_request().is_some();
        let due = last_check.is_none_or(|t| t.elapsed() >= config.check_period);

        if due || forced {
            last_check = Some(Instant::now());
            // 到期检查也覆盖此前受理的请求
            check_ticket = ctx.channel.checks_taken();
            let healthy = check_units(&mut units, &mut registry, &mut statuses);

            cycle += 1;
            let snapshot = ctx.snapshot(cycle, check_ticket, &statuses, &registry);
            ctx.channel.settle_with(|| ctx.publisher.publish(snapshot));

            if !healthy {
                trace!("{}: check failed, skipping commands", ctx.daemon_id);
                ctx.monitor.beat();
                spin_sleep::sleep(config.sleep_time);
                continue;
            }
        } else if units.iter().any(|u| u.is_connected() && u.needs_refresh()) {
            refresh_units(&mut units, &mut registry, &mut statuses);
            cycle += 1;
            ctx.publisher
                .publish(ctx.snapshot(cycle, check_ticket, &statuses, &registry));
        }

        let commands = ctx.channel.drain();
        if !commands.is_empty() {
            for envelope in commands {
                execute_command(&mut units, &mut registry, &mut statuses, envelope);
            }
            ctx.channel.request_check();
        }

        ctx.monitor.beat();
        spin_sleep::sleep(config.sleep_time);
    }

    for unit in units.iter_mut().filter(|u| u.is_connected()) {
        unit.disconnect();
    }
    info!("{}: control thread stopped", ctx.daemon_id);
}

/// 连接缺失的单元并读取全部单元状态；全部成功返回 true
fn check_units<U: HardwareUnit>(
    units: &mut [U],
    registry: &mut HardwareRegistry,
    statuses: &mut BTreeMap<String, UnitStatus<U::Status>>,
) -> bool {
    let mut healthy = true;

    for unit in units.iter_mut() {
        let name = unit.name().to_string();

        if !unit.is_connected() {
            match unit.connect() {
                Ok(()) => {
                    info!(
                        "Connected to {} (serial {})",
                        name,
                        unit.serial_number().unwrap_or_default()
                    );
                    registry.mark_good(&name);
                },
                Err(e) => {
                    debug!("Failed to connect to {}: {}", name, e);
                    registry.mark_bad(&name, &e);
                    mark_absent(statuses, &name);
                    healthy = false;
                    continue;
                },
            }
        }

        if !update_info(unit, registry, statuses) {
            healthy = false;
        }
    }

    healthy
}

/// 只刷新有时间相关状态的单元，不尝试重连
fn refresh_units<U: HardwareUnit>(
    units: &mut [U],
    registry: &mut HardwareRegistry,
    statuses: &mut BTreeMap<String, UnitStatus<U::Status>>,
) {
    for unit in units
        .iter_mut()
        .filter(|u| u.is_connected() && u.needs_refresh())
    {
        update_info(unit, registry, statuses);
    }
}

fn update_info<U: HardwareUnit>(
    unit: &mut U,
    registry: &mut HardwareRegistry,
    statuses: &mut BTreeMap<String, UnitStatus<U::Status>>,
) -> bool {
    let name = unit.name().to_string();
    match unit.get_info() {
        Ok(status) => {
            registry.mark_good(&name);
            statuses.insert(
                name,
                UnitStatus {
                    connected: true,
                    serial_number: unit.serial_number(),
                    status: Some(status),
                },
            );
            true
        },
        Err(e) => {
            error!("Failed to get info from {}: {}", name, e);
            registry.mark_bad(&name, &e);
            unit.disconnect();
            mark_absent(statuses, &name);
            false
        },
    }
}

fn execute_command<U: HardwareUnit>(
    units: &mut [U],
    registry: &mut HardwareRegistry,
    statuses: &mut BTreeMap<String, UnitStatus<U::Status>>,
    envelope: Envelope<U::Command>,
) {
    let Some(unit) = units.iter_mut().find(|u| u.name() == envelope.unit) else {
        warn!("Dropping {:?}: unknown unit {}", envelope.command, envelope.unit);
        return;
    };

    if !unit.is_connected() {
        warn!(
            "Dropping {:?} for {}: not connected",
            envelope.command, envelope.unit
        );
        return;
    }

    info!("{}: executing {:?}", envelope.unit, envelope.command);
    match unit.execute(envelope.command) {
        Ok(()) => {},
        Err(e) if e.is_transient() => {
            error!("{}: command failed, dropping device: {}", envelope.unit, e);
            registry.mark_bad(&envelope.unit, &e);
            unit.disconnect();
            mark_absent(statuses, &envelope.unit);
        },
        Err(e) => {
            error!("{}: command rejected by device: {}", envelope.unit, e);
        },
    }
}

fn mark_absent<S>(statuses: &mut BTreeMap<String, UnitStatus<S>>, name: &str) {
    if let Some(entry) = statuses.get_mut(name) {
        entry.connected = false;
        entry.status = None;
    }
}
