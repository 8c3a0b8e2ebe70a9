//! 控制循环集成测试
//!
//! 验证：
//! 1. 连接失败 N 次后恢复，`bad_hardware` 在首次成功时清空
//! 2. 同一单元的硬件调用只来自控制线程，且从不重叠
//! 3. 未取走的同名命令合并，只执行最后一次的参数
//! 4. 控制线程卡死时 `ping()` 报告陈旧
//! 5. 快照内部一致

mod common;

use common::{MockCommand, MockUnit, Probe, wait_until};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tecs_driver::{Daemon, DaemonBuilder, DaemonStatus, DriverError, Enqueued, Liveness};

fn spawn(units: Vec<MockUnit>, check_period: Duration) -> Daemon<MockUnit> {
    DaemonBuilder::new("mock")
        .units(units)
        .check_period(check_period)
        .sleep_time(Duration::from_millis(2))
        .ping_life(Duration::from_secs(5))
        .join_timeout(Duration::from_secs(2))
        .spawn()
        .unwrap()
}

#[test]
fn test_connect_retry_clears_bad_hardware() {
    let probe = Probe::new();
    probe.fail_connects(3);
    let daemon = spawn(vec![MockUnit::new("a", probe.clone())], Duration::from_millis(30));

    let mut failed = None;
    assert!(wait_until(Duration::from_secs(1), || {
        let s = daemon.current();
        if s.bad_hardware == vec!["a".to_string()] {
            failed = Some(s);
            true
        } else {
            false
        }
    }));
    let snapshot = failed.unwrap();
    assert!(snapshot.hardware_error);
    assert!(!snapshot.unit("a").unwrap().connected);

    assert!(wait_until(Duration::from_secs(2), || {
        let s = daemon.current();
        s.bad_hardware.is_empty() && s.unit("a").unwrap().connected
    }));
    let snapshot = daemon.current();
    assert!(!snapshot.hardware_error);
    assert_eq!(snapshot.status_of("a"), Some(&0));
    assert_eq!(
        snapshot.unit("a").unwrap().serial_number.as_deref(),
        Some("SN-a")
    );
    assert_eq!(probe.connects(), 1);
    assert_eq!(daemon.status(), DaemonStatus::Running);
}

#[test]
fn test_command_reflected_in_next_snapshot() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe.clone())], Duration::from_secs(10));
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("a")
        .is_some()));

    daemon.enqueue("a", MockCommand::Set(5)).unwrap();
    assert!(daemon.is_pending("a", "set"));

    // 执行后强制检查，无需等待 10 秒的检查周期
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("a")
        == Some(&5)));
    assert!(wait_until(Duration::from_secs(1), || !daemon.is_pending("a", "set")));
    assert_eq!(probe.executed(), vec![5]);
}

#[test]
fn test_same_command_coalesces_before_drain() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe.clone())], Duration::from_secs(10));
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("a")
        .is_some()));

    // 把控制线程挡在 get_info 里，确保两次入队之间没有 drain
    probe.hold(true);
    daemon.force_check();
    assert!(wait_until(Duration::from_secs(1), || probe.in_info()));

    assert_eq!(daemon.enqueue("a", MockCommand::Set(1)).unwrap(), Enqueued::New);
    assert_eq!(
        daemon.enqueue("a", MockCommand::Set(2)).unwrap(),
        Enqueued::Coalesced
    );
    probe.hold(false);

    assert!(wait_until(Duration::from_secs(1), || !probe.executed().is_empty()));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(probe.executed(), vec![2]);
}

#[test]
fn test_transient_command_failure_demotes_unit() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe.clone())], Duration::from_millis(30));
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("a")
        .is_some()));

    // 重连先失败，便于观察降级状态
    probe.fail_connects(1000);
    daemon.enqueue("a", MockCommand::Fail).unwrap();

    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .bad_hardware
        .contains(&"a".to_string())));
    assert!(!daemon.current().unit("a").unwrap().connected);

    probe.fail_connects(0);
    assert!(wait_until(Duration::from_secs(2), || daemon
        .current()
        .bad_hardware
        .is_empty()));
    assert_eq!(probe.connects(), 2);
}

#[test]
fn test_non_transient_error_keeps_unit() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe.clone())], Duration::from_millis(30));
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("a")
        .is_some()));

    daemon.enqueue("a", MockCommand::Reject).unwrap();
    assert!(wait_until(Duration::from_secs(1), || probe.rejections() == 1));
    thread::sleep(Duration::from_millis(80));

    let snapshot = daemon.current();
    assert!(snapshot.bad_hardware.is_empty());
    assert!(snapshot.unit("a").unwrap().connected);
    assert_eq!(probe.connects(), 1);
}

#[test]
fn test_info_failure_drops_handle_and_reconnects() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe.clone())], Duration::from_millis(20));
    assert!(wait_until(Duration::from_secs(1), || probe.connects() == 1));

    probe.fail_infos(1);
    assert!(wait_until(Duration::from_secs(2), || probe.connects() == 2));
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .bad_hardware
        .is_empty()));
}

#[test]
fn test_hardware_only_touched_by_control_thread() {
    let probe_a = Probe::new();
    let probe_b = Probe::new();
    let daemon = Arc::new(spawn(
        vec![
            MockUnit::new("a", probe_a.clone()),
            MockUnit::new("b", probe_b.clone()),
        ],
        Duration::from_millis(5),
    ));

    let stop = Arc::new(AtomicBool::new(false));
    let callers: Vec<_> = (0..8)
        .map(|i| {
            let daemon = daemon.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut n = 0i64;
                while !stop.load(Ordering::Relaxed) {
                    let unit = if i % 2 == 0 { "a" } else { "b" };
                    daemon.enqueue(unit, MockCommand::Set(n)).unwrap();
                    if n % 7 == 0 {
                        daemon.force_check();
                    }
                    let _ = daemon.current();
                    n += 1;
                    thread::sleep(Duration::from_micros(200));
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(300));
    stop.store(true, Ordering::Relaxed);
    for caller in callers {
        caller.join().unwrap();
    }

    for probe in [&probe_a, &probe_b] {
        assert!(!probe.executed().is_empty());
        assert_eq!(probe.overlaps(), 0);
        assert_eq!(probe.caller_threads(), 1);
    }
}

#[test]
fn test_stalled_loop_reported_by_ping() {
    let probe = Probe::new();
    let daemon = DaemonBuilder::new("stall")
        .unit(MockUnit::new("a", probe.clone()))
        .check_period(Duration::from_secs(10))
        .sleep_time(Duration::from_millis(2))
        .ping_life(Duration::from_millis(100))
        .spawn()
        .unwrap();
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("a")
        .is_some()));
    assert_eq!(daemon.ping(), Liveness::Alive);

    probe.hold(true);
    daemon.force_check();
    assert!(wait_until(Duration::from_secs(1), || probe.in_info()));

    assert_eq!(
        daemon.wait_for_info(Duration::from_millis(50)).unwrap_err(),
        DriverError::Timeout
    );

    assert!(wait_until(Duration::from_secs(1), || !daemon.ping().is_alive()));
    assert!(matches!(daemon.status(), DaemonStatus::PingError(_)));
    assert!(daemon.status().to_string().starts_with("ping_error:"));

    probe.hold(false);
    assert!(wait_until(Duration::from_secs(1), || daemon.ping().is_alive()));
}

#[test]
fn test_wait_for_info_returns_newer_snapshot() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe)], Duration::from_secs(10));
    let before = daemon.current().cycle;
    let snapshot = daemon.wait_for_info(Duration::from_secs(1)).unwrap();
    assert!(snapshot.cycle > before);
    assert!(snapshot.check_ticket >= 1);
}

#[test]
fn test_wait_for_info_ignores_refresh_only_publishes() {
    let moving = Probe::new();
    let idle = Probe::new();
    let daemon = spawn(
        vec![
            MockUnit::new("a", moving.clone()),
            MockUnit::new("b", idle.clone()),
        ],
        Duration::from_secs(10),
    );
    assert!(wait_until(Duration::from_secs(1), || daemon
        .current()
        .status_of("b")
        .is_some()));

    // a 每个周期都在刷新发布；b 的变化只有完整检查才能看到
    moving.refreshing(true);
    let cycle = daemon.current().cycle;
    assert!(wait_until(Duration::from_secs(1), || daemon.current().cycle > cycle + 5));

    for delta in 1..=20 {
        idle.drift(delta);
        let snapshot = daemon.wait_for_info(Duration::from_secs(1)).unwrap();
        assert_eq!(snapshot.status_of("b"), Some(&delta));
    }
    moving.refreshing(false);
}

#[test]
fn test_snapshot_consistency_under_concurrent_reads() {
    let probe_a = Probe::new();
    let probe_b = Probe::new();
    let daemon = Arc::new(spawn(
        vec![
            MockUnit::new("a", probe_a.clone()),
            MockUnit::new("b", probe_b.clone()),
        ],
        Duration::from_millis(3),
    ));

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let daemon = daemon.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut last_cycle = 0;
                let mut reads = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let s = daemon.current();
                    assert!(s.cycle >= last_cycle, "cycle went backwards");
                    last_cycle = s.cycle;
                    assert_eq!(s.hardware_error, !s.bad_hardware.is_empty());
                    for bad in &s.bad_hardware {
                        let unit = s.unit(bad).unwrap();
                        assert!(!unit.connected);
                        assert!(unit.status.is_none());
                    }
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    // 让 b 反复掉线
    for _ in 0..20 {
        probe_b.fail_infos(1);
        probe_b.fail_connects(1);
        thread::sleep(Duration::from_millis(10));
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert!(probe_b.connects() > 1);
}

#[test]
fn test_shutdown_is_idempotent() {
    let probe = Probe::new();
    let daemon = spawn(vec![MockUnit::new("a", probe)], Duration::from_millis(10));
    assert!(daemon.is_running());

    daemon.shutdown();
    daemon.shutdown();
    assert!(!daemon.is_running());
    assert_eq!(daemon.status(), DaemonStatus::Stopped);
    assert_eq!(daemon.status().to_string(), "running_error");
    assert_eq!(
        daemon.enqueue("a", MockCommand::Set(1)).unwrap_err(),
        DriverError::LoopStopped
    );
    assert_eq!(
        daemon.wait_for_info(Duration::from_millis(10)).unwrap_err(),
        DriverError::LoopStopped
    );
}

#[test]
fn test_unknown_unit_rejected() {
    let daemon = spawn(vec![MockUnit::new("a", Probe::new())], Duration::from_millis(10));
    assert_eq!(
        daemon.enqueue("z", MockCommand::Set(1)).unwrap_err(),
        DriverError::UnknownUnit("z".to_string())
    );
    assert!(daemon.has_unit("a"));
    assert_eq!(daemon.unit_names(), &["a".to_string()]);
}
