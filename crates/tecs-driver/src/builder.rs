//! Builder 模式实现
//!
//! 提供链式构造 [`Daemon`] 的方式。

use crate::daemon::Daemon;
use crate::error::DriverError;
use crate::pipeline::LoopConfig;
use crate::unit::HardwareUnit;
use std::time::Duration;

/// 守护进程构建器
///
/// # Example
///
/// ```rust,ignore
/// let daemon = DaemonBuilder::new("foc")
///     .check_period(Duration::from_secs(3))
///     .units(units)
///     .spawn()?;
/// ```
pub struct DaemonBuilder<U: HardwareUnit> {
    daemon_id: String,
    units: Vec<U>,
    config: LoopConfig,
    join_timeout: Duration,
}

impl<U: HardwareUnit> DaemonBuilder<U> {
    pub fn new(daemon_id: impl Into<String>) -> Self {
        Self {
            daemon_id: daemon_id.into(),
            units: Vec::new(),
            config: LoopConfig::default(),
            join_timeout: Duration::from_secs(2),
        }
    }

    /// 添加一个单元
    pub fn unit(mut self, unit: U) -> Self {
        self.units.push(unit);
        self
    }

    /// 添加多个单元
    pub fn units(mut self, units: impl IntoIterator<Item = U>) -> Self {
        self.units.extend(units);
        self
    }

    /// 整体替换循环配置
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn check_period(mut self, period: Duration) -> Self {
        self.config.check_period = period;
        self
    }

    pub fn sleep_time(mut self, sleep: Duration) -> Self {
        self.config.sleep_time = sleep;
        self
    }

    pub fn ping_life(mut self, ping_life: Duration) -> Self {
        self.config.ping_life = ping_life;
        self
    }

    /// Drop 时等待控制线程退出的上限
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// 启动控制线程
    pub fn spawn(self) -> Result<Daemon<U>, DriverError> {
        Daemon::spawn(&self.daemon_id, self.units, self.config, self.join_timeout)
    }
}
