//! 模拟硬件（`class = "fake"`）
//!
//! 设备状态按序列号保存在 [`Simulator`] 中，重新定位（重连）后得到的仍是
//! 同一台"设备"：曝光继续倒计时，电机继续走完剩余步数，赤道仪保持停放状态。
//! 时间相关的行为全部基于 `Instant`，不需要后台线程。

mod camera;
mod dome;
mod faults;
mod filterwheel;
mod focuser;
mod mount;

pub use camera::FakeCamera;
pub use dome::FakeDome;
pub use faults::FaultInjector;
pub use filterwheel::FakeFilterWheel;
pub use focuser::FakeFocuser;
pub use mount::FakeMount;

use crate::backend::{Backends, Locator};
use crate::device::{Camera, Dome, FilterWheel, Focuser, Mount};
use crate::types::DeviceSpec;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 模拟设备的物理参数
#[derive(Debug, Clone, PartialEq)]
pub struct SimSettings {
    /// 赤道仪指向耗时
    pub slew_time: Duration,
    /// 步进电机速度（步/秒）
    pub step_rate: f64,
    /// 调焦器最大行程
    pub focuser_limit: i64,
    /// 滤光片轮槽位数
    pub filter_positions: usize,
    /// 相邻槽位间的步数
    pub steps_per_filter: i64,
    /// 圆顶从全关到全开的耗时
    pub dome_travel_time: Duration,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            slew_time: Duration::from_secs(3),
            step_rate: 500.0,
            focuser_limit: 2000,
            filter_positions: 5,
            steps_per_filter: 100,
            dome_travel_time: Duration::from_secs(4),
        }
    }
}

type Bench<S> = Arc<Mutex<HashMap<String, Arc<Mutex<S>>>>>;

fn model<S>(bench: &Bench<S>, serial: &str, init: impl FnOnce() -> S) -> Arc<Mutex<S>> {
    bench
        .lock()
        .entry(serial.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(init())))
        .clone()
}

/// 模拟设备台
///
/// 克隆共享同一组设备与同一个 [`FaultInjector`]。
#[derive(Clone, Default)]
pub struct Simulator {
    settings: SimSettings,
    faults: FaultInjector,
    cameras: Bench<camera::CameraModel>,
    focusers: Bench<focuser::FocuserModel>,
    wheels: Bench<filterwheel::WheelModel>,
    mounts: Bench<mount::MountModel>,
    domes: Bench<dome::DomeModel>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SimSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    /// 故障注入器
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn camera_locator(&self) -> Locator<dyn Camera> {
        let sim = self.clone();
        Arc::new(move |spec: &DeviceSpec| {
            if !sim.faults.check_connect(&spec.serial)? {
                return Ok(None);
            }
            let state = model(&sim.cameras, &spec.serial, camera::CameraModel::default);
            Ok(Some(Box::new(FakeCamera::new(
                spec.serial.clone(),
                state,
                sim.faults.clone(),
            )) as Box<dyn Camera>))
        })
    }

    pub fn focuser_locator(&self) -> Locator<dyn Focuser> {
        let sim = self.clone();
        Arc::new(move |spec: &DeviceSpec| {
            if !sim.faults.check_connect(&spec.serial)? {
                return Ok(None);
            }
            let settings = &sim.settings;
            let state = model(&sim.focusers, &spec.serial, || {
                focuser::FocuserModel::new(settings.focuser_limit, settings.step_rate)
            });
            Ok(Some(Box::new(FakeFocuser::new(
                spec.serial.clone(),
                state,
                sim.faults.clone(),
            )) as Box<dyn Focuser>))
        })
    }

    pub fn filter_wheel_locator(&self) -> Locator<dyn FilterWheel> {
        let sim = self.clone();
        Arc::new(move |spec: &DeviceSpec| {
            if !sim.faults.check_connect(&spec.serial)? {
                return Ok(None);
            }
            let settings = &sim.settings;
            let state = model(&sim.wheels, &spec.serial, || {
                filterwheel::WheelModel::new(
                    settings.filter_positions,
                    settings.steps_per_filter,
                    settings.step_rate,
                )
            });
            Ok(Some(Box::new(FakeFilterWheel::new(
                spec.serial.clone(),
                state,
                sim.faults.clone(),
            )) as Box<dyn FilterWheel>))
        })
    }

    pub fn mount_locator(&self) -> Locator<dyn Mount> {
        let sim = self.clone();
        Arc::new(move |spec: &DeviceSpec| {
            if !sim.faults.check_connect(&spec.serial)? {
                return Ok(None);
            }
            let slew_time = sim.settings.slew_time;
            let state = model(&sim.mounts, &spec.serial, || mount::MountModel::new(slew_time));
            Ok(Some(Box::new(FakeMount::new(
                spec.serial.clone(),
                state,
                sim.faults.clone(),
            )) as Box<dyn Mount>))
        })
    }

    pub fn dome_locator(&self) -> Locator<dyn Dome> {
        let sim = self.clone();
        Arc::new(move |spec: &DeviceSpec| {
            if !sim.faults.check_connect(&spec.serial)? {
                return Ok(None);
            }
            let travel_time = sim.settings.dome_travel_time;
            let state = model(&sim.domes, &spec.serial, || dome::DomeModel::new(travel_time));
            Ok(Some(Box::new(FakeDome::new(
                spec.serial.clone(),
                state,
                sim.faults.clone(),
            )) as Box<dyn Dome>))
        })
    }
}

impl Backends<dyn Camera> {
    /// 只注册模拟后端的相机表
    pub fn with_simulator(sim: &Simulator) -> Self {
        Self::new().register("fake", sim.camera_locator())
    }
}

impl Backends<dyn Focuser> {
    pub fn with_simulator(sim: &Simulator) -> Self {
        Self::new().register("fake", sim.focuser_locator())
    }
}

impl Backends<dyn FilterWheel> {
    pub fn with_simulator(sim: &Simulator) -> Self {
        Self::new().register("fake", sim.filter_wheel_locator())
    }
}

impl Backends<dyn Mount> {
    pub fn with_simulator(sim: &Simulator) -> Self {
        Self::new().register("fake", sim.mount_locator())
    }
}

impl Backends<dyn Dome> {
    pub fn with_simulator(sim: &Simulator) -> Self {
        Self::new().register("fake", sim.dome_locator())
    }
}

/// 匀速步进电机模型
#[derive(Debug, Clone)]
pub(crate) struct Motor {
    from: i64,
    to: i64,
    since: Instant,
    rate: f64,
}

impl Motor {
    pub(crate) fn at(position: i64, rate: f64) -> Self {
        Self {
            from: position,
            to: position,
            since: Instant::now(),
            rate,
        }
    }

    pub(crate) fn position(&self) -> i64 {
        let distance = (self.to - self.from).abs();
        let travelled = (self.since.elapsed().as_secs_f64() * self.rate) as i64;
        if travelled >= distance {
            self.to
        } else {
            self.from + (self.to - self.from).signum() * travelled
        }
    }

    pub(crate) fn remaining(&self) -> i64 {
        (self.to - self.position()).abs()
    }

    pub(crate) fn target(&self) -> i64 {
        self.to
    }

    /// 从当前位置出发走向 `target`
    pub(crate) fn move_to(&mut self, target: i64) {
        self.from = self.position();
        self.to = target;
        self.since = Instant::now();
    }

    /// 停在当前位置
    pub(crate) fn stop(&mut self) {
        let position = self.position();
        self.move_to(position);
    }

    /// 立即置位（回零开关触发）
    pub(crate) fn reset(&mut self, position: i64) {
        *self = Self::at(position, self.rate);
    }
}
