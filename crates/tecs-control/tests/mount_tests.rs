//! 赤道仪状态机集成测试（模拟硬件）

mod common;

use common::{fast_loop, wait_until};
use std::time::Duration;
use tecs_control::{ControlError, DaemonHandle, MountDaemon};
use tecs_hardware::fake::{SimSettings, Simulator};
use tecs_hardware::{Backends, DeviceSpec, Mount, MountStatus};

fn spawn(sim: &Simulator) -> MountDaemon {
    MountDaemon::spawn(
        "mnt",
        DeviceSpec::fake("mount-1"),
        Backends::<dyn Mount>::with_simulator(sim),
        fast_loop(),
    )
    .unwrap()
}

fn wait_for(mnt: &MountDaemon, status: MountStatus) -> bool {
    wait_until(Duration::from_secs(2), || mnt.mount_status() == Some(status))
}

#[test]
fn test_mount_state_machine() {
    let sim = Simulator::with_settings(SimSettings {
        slew_time: Duration::from_secs(1),
        ..SimSettings::default()
    });
    let mnt = spawn(&sim);
    assert!(wait_for(&mnt, MountStatus::Parked));

    // 停放时：park 必须拒绝，slew / track / halt 也拒绝
    let err = mnt.park().unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().contains("already parked"));
    assert!(mnt.slew_to_radec(5.0, 20.0).unwrap_err().is_precondition());
    assert!(mnt.start_tracking().unwrap_err().is_precondition());
    assert!(mnt.full_stop().unwrap_err().is_precondition());

    assert_eq!(mnt.unpark().unwrap(), "unparking mount");
    assert!(wait_for(&mnt, MountStatus::Stopped));
    assert!(mnt.unpark().unwrap_err().is_precondition());
    assert_eq!(mnt.full_stop().unwrap(), "already stopped");

    mnt.start_tracking().unwrap();
    assert!(wait_for(&mnt, MountStatus::Tracking));
    assert_eq!(mnt.start_tracking().unwrap(), "already tracking");

    mnt.slew_to_radec(5.0, 20.0).unwrap();
    assert!(wait_for(&mnt, MountStatus::Slewing));
    let err = mnt.slew_to_radec(6.0, 10.0).unwrap_err();
    assert!(err.to_string().contains("already slewing"));
    assert!(mnt.start_tracking().unwrap_err().is_precondition());

    // 指向结束后自动跟踪
    assert!(wait_for(&mnt, MountStatus::Tracking));
    let snapshot = mnt.get_info(false).unwrap();
    let info = snapshot.status_of("mount").unwrap();
    assert_eq!((info.ra, info.dec), (5.0, 20.0));

    mnt.full_stop().unwrap();
    assert!(wait_for(&mnt, MountStatus::Stopped));

    mnt.park().unwrap();
    assert!(wait_for(&mnt, MountStatus::Parked));
}

#[test]
fn test_slew_parameters_validated() {
    let sim = Simulator::new();
    let mnt = spawn(&sim);
    assert!(wait_for(&mnt, MountStatus::Parked));

    // 参数检查先于状态检查
    for (ra, dec) in [(24.0, 0.0), (-0.1, 0.0), (1.0, 90.5), (1.0, f64::NAN)] {
        assert!(matches!(
            mnt.slew_to_radec(ra, dec),
            Err(ControlError::InvalidParameter(_))
        ));
    }
}

#[test]
fn test_park_while_slewing_then_slew_rejected() {
    let sim = Simulator::with_settings(SimSettings {
        slew_time: Duration::from_secs(5),
        ..SimSettings::default()
    });
    let mnt = spawn(&sim);
    assert!(wait_for(&mnt, MountStatus::Parked));
    mnt.unpark().unwrap();
    assert!(wait_for(&mnt, MountStatus::Stopped));

    mnt.slew_to_radec(12.0, -30.0).unwrap();
    assert!(wait_for(&mnt, MountStatus::Slewing));
    mnt.park().unwrap();
    assert!(wait_for(&mnt, MountStatus::Parked));

    let snapshot = mnt.get_info(true).unwrap();
    let info = snapshot.status_of("mount").unwrap();
    assert_eq!(info.target, None);
    assert_eq!(info.dec, 90.0);
    assert_eq!(sim.faults().overlapping_calls("mount-1"), 0);
    assert_eq!(sim.faults().caller_threads("mount-1"), 1);
}
