//! 守护进程共有的生命周期方法
//!
//! 各设备族的守护进程只需给出内部的 [`Daemon`] 和强制检查的等待上限，
//! 其余方法（快照、ping、状态摘要、停止）由默认实现提供。

use crate::error::ControlError;
use std::sync::Arc;
use std::time::Duration;
use tecs_driver::{Daemon, DaemonStatus, HardwareUnit, Liveness, StatusSnapshot};

pub trait DaemonHandle {
    type Unit: HardwareUnit;

    fn daemon(&self) -> &Daemon<Self::Unit>;

    /// `get_info(true)` 等待新快照的上限
    fn info_timeout(&self) -> Duration;

    /// 状态快照
    ///
    /// `force` 时先请求一次硬件检查，返回该检查之后发布的快照；
    /// 控制线程卡在驱动调用里时在 `info_timeout()` 后返回超时错误。
    fn get_info(
        &self,
        force: bool,
    ) -> Result<Arc<StatusSnapshot<<Self::Unit as HardwareUnit>::Status>>, ControlError> {
        if force {
            Ok(self.daemon().wait_for_info(self.info_timeout())?)
        } else {
            Ok(self.daemon().current())
        }
    }

    fn ping(&self) -> Liveness {
        self.daemon().ping()
    }

    fn status(&self) -> DaemonStatus {
        self.daemon().status()
    }

    /// 停止控制线程（幂等）
    fn shutdown(&self) {
        self.daemon().shutdown()
    }

    fn is_running(&self) -> bool {
        self.daemon().is_running()
    }
}
