use super::faults::FaultInjector;
use crate::device::Dome;
use crate::error::HardwareError;
use crate::types::{DomeInfo, DomeStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 匀速开合的圆顶（位置为开启比例）
#[derive(Debug)]
pub(crate) struct DomeModel {
    from: f64,
    to: f64,
    since: Instant,
    travel_time: Duration,
}

impl DomeModel {
    pub(crate) fn new(travel_time: Duration) -> Self {
        Self {
            from: 0.0,
            to: 0.0,
            since: Instant::now(),
            travel_time,
        }
    }

    fn fraction(&self) -> f64 {
        let distance = (self.to - self.from).abs();
        let travelled = if self.travel_time.is_zero() {
            distance
        } else {
            self.since.elapsed().as_secs_f64() / self.travel_time.as_secs_f64()
        };
        if travelled >= distance {
            self.to
        } else {
            self.from + (self.to - self.from).signum() * travelled
        }
    }

    fn status(&self) -> DomeStatus {
        let fraction = self.fraction();
        if fraction != self.to {
            if self.to > self.from {
                DomeStatus::Opening
            } else {
                DomeStatus::Closing
            }
        } else if fraction <= 0.0 {
            DomeStatus::Closed
        } else if fraction >= 1.0 {
            DomeStatus::Open
        } else {
            DomeStatus::PartOpen
        }
    }

    fn move_to(&mut self, target: f64) {
        self.from = self.fraction();
        self.to = target;
        self.since = Instant::now();
    }
}

/// 模拟圆顶（上电时关闭）
pub struct FakeDome {
    serial: String,
    state: Arc<Mutex<DomeModel>>,
    faults: FaultInjector,
}

impl FakeDome {
    pub(crate) fn new(serial: String, state: Arc<Mutex<DomeModel>>, faults: FaultInjector) -> Self {
        Self {
            serial,
            state,
            faults,
        }
    }
}

impl Dome for FakeDome {
    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn get_info(&mut self) -> Result<DomeInfo, HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let state = self.state.lock();
        Ok(DomeInfo {
            serial_number: self.serial.clone(),
            status: state.status(),
            open_fraction: state.fraction(),
        })
    }

    fn open(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        self.state.lock().move_to(1.0);
        Ok(())
    }

    fn close(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        self.state.lock().move_to(0.0);
        Ok(())
    }

    fn halt(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        let here = state.fraction();
        state.move_to(here);
        Ok(())
    }
}
