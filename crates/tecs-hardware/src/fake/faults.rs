//! 故障注入
//!
//! 按序列号为模拟设备安排失败：前 N 次定位失败、前 N 次调用失败、
//! 调用卡住一段时间、设备"拔出"。同时记录调用统计，
//! 测试据此验证"同一设备只被一个线程调用、调用从不重叠"。

use crate::error::HardwareError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

#[derive(Debug, Default)]
struct FaultPlan {
    connects_to_fail: u32,
    calls_to_fail: u32,
    stall: Option<Duration>,
    missing: bool,

    connect_attempts: u32,
    calls: u32,
    active: u32,
    overlaps: u32,
    callers: HashSet<ThreadId>,
}

/// 故障注入器（可克隆，克隆之间共享同一份计划）
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    plans: Arc<Mutex<HashMap<String, FaultPlan>>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接下来 `n` 次定位失败（返回 I/O 错误）
    pub fn fail_connects(&self, serial: &str, n: u32) {
        self.plans.lock().entry(serial.to_string()).or_default().connects_to_fail = n;
    }

    /// 接下来 `n` 次设备调用失败（返回 I/O 错误）
    pub fn fail_calls(&self, serial: &str, n: u32) {
        self.plans.lock().entry(serial.to_string()).or_default().calls_to_fail = n;
    }

    /// 每次设备调用先阻塞 `stall`（`None` 取消）
    pub fn stall_calls(&self, serial: &str, stall: Option<Duration>) {
        self.plans.lock().entry(serial.to_string()).or_default().stall = stall;
    }

    /// 模拟设备被拔出：定位返回 `None`
    pub fn set_missing(&self, serial: &str, missing: bool) {
        self.plans.lock().entry(serial.to_string()).or_default().missing = missing;
    }

    /// 定位尝试次数
    pub fn connect_attempts(&self, serial: &str) -> u32 {
        self.plans.lock().get(serial).map_or(0, |p| p.connect_attempts)
    }

    /// 设备调用次数（含失败的调用）
    pub fn calls(&self, serial: &str) -> u32 {
        self.plans.lock().get(serial).map_or(0, |p| p.calls)
    }

    /// 检测到的重叠调用次数（同一设备上一个调用未返回时又进入另一个）
    pub fn overlapping_calls(&self, serial: &str) -> u32 {
        self.plans.lock().get(serial).map_or(0, |p| p.overlaps)
    }

    /// 调用过该设备的不同线程数
    pub fn caller_threads(&self, serial: &str) -> usize {
        self.plans.lock().get(serial).map_or(0, |p| p.callers.len())
    }

    /// 定位时调用：`Ok(false)` 表示设备不存在
    pub(crate) fn check_connect(&self, serial: &str) -> Result<bool, HardwareError> {
        let mut plans = self.plans.lock();
        let plan = plans.entry(serial.to_string()).or_default();
        plan.connect_attempts += 1;
        if plan.connects_to_fail > 0 {
            plan.connects_to_fail -= 1;
            return Err(HardwareError::Io(format!("cannot open device {}", serial)));
        }
        Ok(!plan.missing)
    }

    /// 每次设备调用前进入，返回的守卫在调用结束时释放
    pub(crate) fn enter(&self, serial: &str) -> Result<CallGuard, HardwareError> {
        let stall = {
            let mut plans = self.plans.lock();
            let plan = plans.entry(serial.to_string()).or_default();
            plan.calls += 1;
            plan.callers.insert(thread::current().id());
            if plan.active > 0 {
                plan.overlaps += 1;
            }
            if plan.calls_to_fail > 0 {
                plan.calls_to_fail -= 1;
                return Err(HardwareError::Io(format!("lost contact with {}", serial)));
            }
            plan.active += 1;
            plan.stall
        };

        let guard = CallGuard {
            plans: self.plans.clone(),
            serial: serial.to_string(),
        };
        if let Some(stall) = stall {
            thread::sleep(stall);
        }
        Ok(guard)
    }
}

/// 调用守卫，Drop 时结束调用
pub(crate) struct CallGuard {
    plans: Arc<Mutex<HashMap<String, FaultPlan>>>,
    serial: String,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if let Some(plan) = self.plans.lock().get_mut(&self.serial) {
            plan.active = plan.active.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_connects_then_succeed() {
        let faults = FaultInjector::new();
        faults.fail_connects("cam-1", 2);

        assert!(faults.check_connect("cam-1").is_err());
        assert!(faults.check_connect("cam-1").is_err());
        assert_eq!(faults.check_connect("cam-1"), Ok(true));
        assert_eq!(faults.connect_attempts("cam-1"), 3);
    }

    #[test]
    fn test_missing_device() {
        let faults = FaultInjector::new();
        faults.set_missing("foc-1", true);
        assert_eq!(faults.check_connect("foc-1"), Ok(false));
        faults.set_missing("foc-1", false);
        assert_eq!(faults.check_connect("foc-1"), Ok(true));
    }

    #[test]
    fn test_fail_calls_counts() {
        let faults = FaultInjector::new();
        faults.fail_calls("m", 1);
        assert!(faults.enter("m").is_err());
        assert!(faults.enter("m").is_ok());
        assert_eq!(faults.calls("m"), 2);
    }

    #[test]
    fn test_overlap_detection() {
        let faults = FaultInjector::new();
        let first = faults.enter("x").unwrap();
        let second = faults.enter("x").unwrap();
        drop(second);
        drop(first);
        assert_eq!(faults.overlapping_calls("x"), 1);

        let _third = faults.enter("x").unwrap();
        assert_eq!(faults.overlapping_calls("x"), 1);
        assert_eq!(faults.caller_threads("x"), 1);
    }
}
