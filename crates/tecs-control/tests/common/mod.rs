//! 测试辅助：快速循环参数与轮询等待

#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};
use tecs_driver::LoopConfig;

/// 短检查周期，测试在毫秒级内观察到重连
pub fn fast_loop() -> LoopConfig {
    LoopConfig {
        check_period: Duration::from_millis(40),
        sleep_time: Duration::from_millis(2),
        ping_life: Duration::from_secs(2),
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

pub fn names(units: &[&str]) -> Vec<String> {
    units.iter().map(|u| u.to_string()).collect()
}
