//! 守护进程句柄
//!
//! [`Daemon`] 拥有控制线程，对外只提供三类操作：
//! - 入队命令（不阻塞在硬件上）
//! - 读取最近发布的快照
//! - 生命周期：`ping` / `status` / `shutdown`
//!
//! 硬件单元在 `spawn` 时被移动进控制线程，之后只有该线程能访问它们。

use crate::command::{Enqueued, PendingView};
use crate::error::DriverError;
use crate::heartbeat::{DaemonStatus, Liveness};
use crate::pipeline::{DaemonContext, LoopConfig, control_loop};
use crate::state::StatusSnapshot;
use crate::unit::HardwareUnit;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // Watchdog thread joins the target and reports back
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 守护进程（单控制线程 + 任意多个调用方线程）
pub struct Daemon<U: HardwareUnit> {
    ctx: Arc<DaemonContext<U>>,
    unit_names: Vec<String>,
    sleep_time: Duration,
    join_timeout: Duration,
    control_thread: Option<JoinHandle<()>>,
}

impl<U: HardwareUnit> Daemon<U> {
    /// 启动控制线程
    ///
    /// # 错误
    /// - `DriverError::ControlThread`：线程创建失败
    pub fn spawn(
        daemon_id: &str,
        units: Vec<U>,
        config: LoopConfig,
        join_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let unit_names: Vec<String> = units.iter().map(|u| u.name().to_string()).collect();
        let ctx = Arc::new(DaemonContext::new(
            daemon_id,
            unit_names.iter().map(String::as_str),
            config.ping_life,
        ));

        let sleep_time = config.sleep_time;
        let loop_ctx = ctx.clone();
        let control_thread = std::thread::Builder::new()
            .name(format!("{}-control", daemon_id))
            .spawn(move || control_loop(units, loop_ctx, config))
            .map_err(|e| DriverError::ControlThread(e.to_string()))?;

        info!("{}: daemon started with units {:?}", daemon_id, unit_names);

        Ok(Self {
            ctx,
            unit_names,
            sleep_time,
            join_timeout,
            control_thread: Some(control_thread),
        })
    }

    pub fn id(&self) -> &str {
        &self.ctx.daemon_id
    }

    pub fn unit_names(&self) -> &[String] {
        &self.unit_names
    }

    pub fn has_unit(&self, unit: &str) -> bool {
        self.unit_names.iter().any(|u| u == unit)
    }

    /// 入队命令
    ///
    /// # 错误
    /// - `DriverError::UnknownUnit`：守护进程不管理该单元
    /// - `DriverError::LoopStopped`：已 shutdown
    pub fn enqueue(&self, unit: &str, command: U::Command) -> Result<Enqueued, DriverError> {
        self.ensure_accepting(unit)?;
        Ok(self.ctx.channel.enqueue(unit, command))
    }

    /// 带前置条件的入队
    ///
    /// `gate` 在邮箱锁内执行，参数为当前快照与该单元的 pending 视图。
    /// 返回 `Err` 时不入队。`gate` 内不得再调用本守护进程的入队/pending 方法。
    pub fn enqueue_gated<E>(
        &self,
        unit: &str,
        command: U::Command,
        gate: impl FnOnce(&StatusSnapshot<U::Status>, &PendingView<'_, U::Command>) -> Result<(), E>,
    ) -> Result<Enqueued, E>
    where
        E: From<DriverError>,
    {
        self.ensure_accepting(unit)?;
        let ctx = &self.ctx;
        ctx.channel
            .enqueue_gated(unit, command, |pending| {
                gate(&ctx.publisher.current(), pending)
            })
    }

    /// 该 `(单元, 操作)` 是否排队中或尚未反映到快照
    pub fn is_pending(&self, unit: &str, operation: &str) -> bool {
        self.ctx.channel.is_pending(unit, operation)
    }

    /// 最近发布的快照
    pub fn current(&self) -> Arc<StatusSnapshot<U::Status>> {
        self.ctx.publisher.current()
    }

    /// 请求控制线程在下一周期检查硬件，返回请求序号
    pub fn force_check(&self) -> u64 {
        self.ctx.channel.request_check()
    }

    /// 强制检查并等待新快照
    ///
    /// 返回的快照来自请求之后才开始的一次完整检查；
    /// 期间仅刷新移动中单元的发布不算数。
    ///
    /// # 错误
    /// - `DriverError::LoopStopped`：已 shutdown
    /// - `DriverError::Timeout`：`timeout` 内没有新快照（控制线程卡在驱动调用里）
    pub fn wait_for_info(
        &self,
        timeout: Duration,
    ) -> Result<Arc<StatusSnapshot<U::Status>>, DriverError> {
        if !self.is_running() {
            return Err(DriverError::LoopStopped);
        }
        let ticket = self.force_check();

        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = self.current();
            if snapshot.check_ticket >= ticket {
                return Ok(snapshot);
            }
            if !self.is_running() {
                return Err(DriverError::LoopStopped);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(self.sleep_time.max(Duration::from_millis(1)));
        }
    }

    /// 控制线程是否仍在周期性完成循环
    pub fn ping(&self) -> Liveness {
        self.ctx.monitor.check()
    }

    /// 状态摘要
    pub fn status(&self) -> DaemonStatus {
        if !self.is_running() {
            return DaemonStatus::Stopped;
        }
        if let Liveness::Stalled(age) = self.ping() {
            return DaemonStatus::PingError(age);
        }
        let snapshot = self.current();
        if snapshot.hardware_error {
            return DaemonStatus::HardwareError(snapshot.bad_hardware.clone());
        }
        DaemonStatus::Running
    }

    pub fn uptime(&self) -> Duration {
        self.ctx.started.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.ctx.running.load(Ordering::Acquire)
    }

    /// 协作式停止（幂等）
    ///
    /// 控制线程在一个休眠间隔内观察到标志并退出；卡在驱动调用里的线程
    /// 要等调用返回后才会退出。
    pub fn shutdown(&self) {
        // Release: 之前的写入对看到 false 的线程可见
        if self.ctx.running.swap(false, Ordering::AcqRel) {
            info!("{}: shutdown requested", self.ctx.daemon_id);
        }
    }

    fn ensure_accepting(&self, unit: &str) -> Result<(), DriverError> {
        if !self.has_unit(unit) {
            return Err(DriverError::UnknownUnit(unit.to_string()));
        }
        if !self.is_running() {
            return Err(DriverError::LoopStopped);
        }
        Ok(())
    }
}

impl<U: HardwareUnit> Drop for Daemon<U> {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.control_thread.take() {
            match handle.join_timeout(self.join_timeout) {
                Ok(()) => {},
                Err(e) => {
                    let reason = e
                        .downcast_ref::<std::io::Error>()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "control thread panicked".to_string());
                    if reason.contains("timeout") {
                        warn!("{}: control thread did not stop: {}", self.ctx.daemon_id, reason);
                    } else {
                        error!("{}: {}", self.ctx.daemon_id, reason);
                    }
                },
            }
        }
    }
}
