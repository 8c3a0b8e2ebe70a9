//! 状态快照模块
//!
//! 控制线程每个检查周期构造一个完整的 [`StatusSnapshot`]，通过 `ArcSwap` 原子替换发布。
//! 读者 `load()` 得到的永远是某一次完整发布的快照，不会看到字段级的混合状态。

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// 单个单元的状态
#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus<S> {
    /// 驱动句柄是否存在
    pub connected: bool,
    /// 最近一次连接得到的序列号
    pub serial_number: Option<String>,
    /// 最近一次成功读取的状态（未连接时为 `None`）
    pub status: Option<S>,
}

impl<S> UnitStatus<S> {
    pub fn absent() -> Self {
        Self {
            connected: false,
            serial_number: None,
            status: None,
        }
    }
}

/// 守护进程状态快照（不可变，整体替换）
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot<S> {
    pub daemon_id: String,
    /// 发布序号，从 0（初始快照）开始单调递增
    pub cycle: u64,
    /// 产生本快照的最近一次硬件检查开始前已受理的检查请求序号
    ///
    /// 仅刷新移动中单元的发布沿用上一次检查的值。
    pub check_ticket: u64,
    /// 发布时的墙钟时间
    pub timestamp: SystemTime,
    /// 守护进程运行时长
    pub uptime: Duration,
    pub units: BTreeMap<String, UnitStatus<S>>,
    pub bad_hardware: Vec<String>,
    /// `bad_hardware` 非空
    pub hardware_error: bool,
}

impl<S> StatusSnapshot<S> {
    /// 启动时的初始快照：全部单元未连接
    pub fn initial<'a>(daemon_id: &str, units: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            daemon_id: daemon_id.to_string(),
            cycle: 0,
            check_ticket: 0,
            timestamp: SystemTime::now(),
            uptime: Duration::ZERO,
            units: units
                .into_iter()
                .map(|name| (name.to_string(), UnitStatus::absent()))
                .collect(),
            bad_hardware: Vec::new(),
            hardware_error: false,
        }
    }

    pub fn unit(&self, name: &str) -> Option<&UnitStatus<S>> {
        self.units.get(name)
    }

    /// 已连接单元的状态
    pub fn status_of(&self, name: &str) -> Option<&S> {
        self.units
            .get(name)
            .filter(|u| u.connected)
            .and_then(|u| u.status.as_ref())
    }
}

/// 快照发布器
pub struct StatusPublisher<S> {
    current: ArcSwap<StatusSnapshot<S>>,
}

impl<S> StatusPublisher<S> {
    pub fn new(initial: StatusSnapshot<S>) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// 原子替换（仅控制线程调用）
    pub fn publish(&self, snapshot: StatusSnapshot<S>) {
        self.current.store(Arc::new(snapshot));
    }

    /// 最近发布的快照（无锁，不阻塞）
    pub fn current(&self) -> Arc<StatusSnapshot<S>> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot() {
        let snapshot: StatusSnapshot<u32> = StatusSnapshot::initial("cam", ["ut1", "ut2"]);
        assert_eq!(snapshot.cycle, 0);
        assert_eq!(snapshot.units.len(), 2);
        assert!(!snapshot.hardware_error);
        assert!(!snapshot.unit("ut1").unwrap().connected);
        assert!(snapshot.status_of("ut1").is_none());
        assert!(snapshot.unit("ut3").is_none());
    }

    #[test]
    fn test_publish_replaces_whole_snapshot() {
        let publisher = StatusPublisher::new(StatusSnapshot::<u32>::initial("foc", ["ut1"]));
        let before = publisher.current();

        let mut next = StatusSnapshot::initial("foc", ["ut1"]);
        next.cycle = 1;
        next.units.insert(
            "ut1".to_string(),
            UnitStatus {
                connected: true,
                serial_number: Some("F1".to_string()),
                status: Some(42),
            },
        );
        publisher.publish(next);

        // 旧快照不受影响
        assert_eq!(before.cycle, 0);
        assert!(before.status_of("ut1").is_none());

        let after = publisher.current();
        assert_eq!(after.cycle, 1);
        assert_eq!(after.status_of("ut1"), Some(&42));
    }
}
