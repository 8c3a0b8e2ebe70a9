//! 测试用模拟单元
//!
//! `MockUnit` 的全部行为由共享的 `Probe` 控制，测试线程通过它注入故障、
//! 阻塞控制线程，并检查调用线程与重叠调用。

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tecs_driver::{Command, HardwareUnit};
use tecs_hardware::HardwareError;

#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    /// 设置数值（记录到 `Probe::executed`）
    Set(i64),
    /// 瞬态失败
    Fail,
    /// 非瞬态失败
    Reject,
}

impl Command for MockCommand {
    fn name(&self) -> &'static str {
        match self {
            MockCommand::Set(_) => "set",
            MockCommand::Fail => "fail",
            MockCommand::Reject => "reject",
        }
    }
}

#[derive(Default)]
pub struct Probe {
    connect_failures: AtomicU32,
    info_failures: AtomicU32,
    hold: AtomicBool,
    in_info: AtomicBool,
    refreshing: AtomicBool,
    drift: AtomicI64,
    connects: AtomicU32,
    rejections: AtomicU32,
    active: AtomicU32,
    overlaps: AtomicU32,
    executed: Mutex<Vec<i64>>,
    threads: Mutex<HashSet<ThreadId>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_infos(&self, n: u32) {
        self.info_failures.store(n, Ordering::SeqCst);
    }

    /// 让 `get_info` 阻塞，直到 `hold(false)`
    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    /// 让单元报告随时间变化的状态（每个周期刷新）
    pub fn refreshing(&self, on: bool) {
        self.refreshing.store(on, Ordering::SeqCst);
    }

    /// 叠加在读数上的外部变化（不经过命令）
    pub fn drift(&self, delta: i64) {
        self.drift.store(delta, Ordering::SeqCst);
    }

    pub fn in_info(&self) -> bool {
        self.in_info.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn rejections(&self) -> u32 {
        self.rejections.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<i64> {
        self.executed.lock().clone()
    }

    pub fn caller_threads(&self) -> usize {
        self.threads.lock().len()
    }

    fn enter(self: &Arc<Self>) -> CallGuard {
        self.threads.lock().insert(thread::current().id());
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        CallGuard(self.clone())
    }
}

struct CallGuard(Arc<Probe>);

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub struct MockUnit {
    name: String,
    probe: Arc<Probe>,
    connected: bool,
    value: i64,
}

impl MockUnit {
    pub fn new(name: &str, probe: Arc<Probe>) -> Self {
        Self {
            name: name.to_string(),
            probe,
            connected: false,
            value: 0,
        }
    }
}

impl HardwareUnit for MockUnit {
    type Command = MockCommand;
    type Status = i64;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), HardwareError> {
        let _call = self.probe.enter();
        if take_one(&self.probe.connect_failures) {
            return Err(HardwareError::Io("mock connect failure".into()));
        }
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn serial_number(&self) -> Option<String> {
        Some(format!("SN-{}", self.name))
    }

    fn get_info(&mut self) -> Result<i64, HardwareError> {
        let _call = self.probe.enter();
        self.probe.in_info.store(true, Ordering::SeqCst);
        while self.probe.hold.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        self.probe.in_info.store(false, Ordering::SeqCst);

        if take_one(&self.probe.info_failures) {
            return Err(HardwareError::Timeout);
        }
        Ok(self.value + self.probe.drift.load(Ordering::SeqCst))
    }

    fn execute(&mut self, command: MockCommand) -> Result<(), HardwareError> {
        let _call = self.probe.enter();
        match command {
            MockCommand::Set(v) => {
                self.value = v;
                self.probe.executed.lock().push(v);
                Ok(())
            },
            MockCommand::Fail => Err(HardwareError::Disconnected),
            MockCommand::Reject => {
                self.probe.rejections.fetch_add(1, Ordering::SeqCst);
                Err(HardwareError::InvalidArgument("mock rejection".into()))
            },
        }
    }

    fn needs_refresh(&self) -> bool {
        self.probe.refreshing.load(Ordering::SeqCst)
    }
}

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
