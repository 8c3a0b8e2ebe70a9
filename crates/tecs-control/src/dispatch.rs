//! 命令分发：前置条件检查 + 入队
//!
//! 前置条件在命令邮箱锁内、基于最近的快照和 pending 状态求值，
//! 不满足时不入队。多单元命令逐个单元求值，汇总成一份报告：
//! 只要有一个单元接受，调用就算成功；全部拒绝时返回前置条件错误。

use crate::error::ControlError;
use tecs_driver::{Daemon, DriverError, HardwareUnit, PendingView, StatusSnapshot};
use tracing::{debug, info};

/// 门控结果中的非入队分支
pub(crate) enum Refusal {
    /// 命令无需执行（如对空闲相机 abort），调用成功但不入队
    Skip(String),
    /// 拒绝
    Reject(ControlError),
}

impl From<DriverError> for Refusal {
    fn from(err: DriverError) -> Self {
        Refusal::Reject(err.into())
    }
}

pub(crate) fn reject(message: impl Into<String>) -> Refusal {
    Refusal::Reject(ControlError::Precondition(message.into()))
}

/// 已连接单元的状态，否则拒绝
pub(crate) fn connected<'a, S>(
    snapshot: &'a StatusSnapshot<S>,
    unit: &str,
) -> Result<&'a S, Refusal> {
    snapshot
        .status_of(unit)
        .ok_or_else(|| reject("not connected"))
}

/// 单个单元：求值门控，通过则入队，返回确认字符串
pub(crate) fn submit<U: HardwareUnit>(
    daemon: &Daemon<U>,
    unit: &str,
    command: U::Command,
    gate: impl FnOnce(&StatusSnapshot<U::Status>, &PendingView<'_, U::Command>) -> Result<String, Refusal>,
) -> Result<String, ControlError> {
    let mut ack = String::new();
    let summary = format!("{:?}", command);
    let result = daemon.enqueue_gated(unit, command, |snapshot, pending| {
        ack = gate(snapshot, pending)?;
        Ok::<(), Refusal>(())
    });

    match result {
        Ok(_) => {
            info!("{}: queued {}", unit, summary);
            Ok(ack)
        },
        Err(Refusal::Skip(message)) => {
            debug!("{}: skipped {} ({})", unit, summary, message);
            Ok(message)
        },
        Err(Refusal::Reject(err)) => Err(err),
    }
}

/// 解析单元列表：空列表表示全部单元
pub(crate) fn resolve_units<U: HardwareUnit>(
    daemon: &Daemon<U>,
    requested: &[String],
) -> Result<Vec<String>, ControlError> {
    if requested.is_empty() {
        return Ok(daemon.unit_names().to_vec());
    }
    if let Some(unknown) = requested.iter().find(|u| !daemon.has_unit(u)) {
        return Err(ControlError::UnknownUnit(format!(
            "{} (known: {})",
            unknown,
            daemon.unit_names().join(", ")
        )));
    }
    Ok(requested.to_vec())
}

/// 多个单元：逐个 `submit`，汇总报告
pub(crate) fn dispatch<U: HardwareUnit>(
    daemon: &Daemon<U>,
    requested: &[String],
    command: impl Fn(&str) -> U::Command,
    gate: impl Fn(&str, &StatusSnapshot<U::Status>, &PendingView<'_, U::Command>) -> Result<String, Refusal>,
) -> Result<String, ControlError> {
    let units = resolve_units(daemon, requested)?;

    let mut lines = Vec::with_capacity(units.len());
    let mut accepted = 0;
    for unit in &units {
        match submit(daemon, unit, command(unit), |snapshot, pending| {
            gate(unit, snapshot, pending)
        }) {
            Ok(ack) => {
                accepted += 1;
                lines.push(format!("{}: {}", unit, ack));
            },
            Err(ControlError::Precondition(reason)) => {
                lines.push(format!("{}: {}", unit, reason));
            },
            Err(other) => return Err(other),
        }
    }

    let report = lines.join("\n");
    if accepted == 0 {
        Err(ControlError::Precondition(report))
    } else {
        Ok(report)
    }
}
