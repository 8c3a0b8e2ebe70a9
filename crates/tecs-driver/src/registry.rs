//! 硬件故障登记
//!
//! 维护 `bad_hardware` 集合：单元名在集合中，当且仅当它最近一次
//! 连接/读取状态（或执行命令）失败。只有控制线程持有并修改它，
//! 外部通过快照里的副本读取。

use std::collections::BTreeSet;
use std::fmt::Display;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct HardwareRegistry {
    bad: BTreeSet<String>,
}

impl HardwareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记故障；首次进入集合时记录日志
    pub fn mark_bad(&mut self, unit: &str, reason: &dyn Display) {
        if self.bad.insert(unit.to_string()) {
            warn!("Hardware error detected: {} ({})", unit, reason);
        }
    }

    /// 清除故障；离开集合时记录日志
    pub fn mark_good(&mut self, unit: &str) {
        if self.bad.remove(unit) {
            info!("Hardware error cleared: {}", unit);
        }
    }

    pub fn is_bad(&self, unit: &str) -> bool {
        self.bad.contains(unit)
    }

    /// 故障单元（有序）
    pub fn bad_set(&self) -> Vec<String> {
        self.bad.iter().cloned().collect()
    }

    pub fn has_error(&self) -> bool {
        !self.bad.is_empty()
    }
}
