use super::faults::FaultInjector;
use crate::device::Mount;
use crate::error::HardwareError;
use crate::types::{MountInfo, MountStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct MountModel {
    status: MountStatus,
    ra: f64,
    dec: f64,
    slew: Option<(Instant, f64, f64)>,
    slew_time: Duration,
}

impl MountModel {
    pub(crate) fn new(slew_time: Duration) -> Self {
        Self {
            status: MountStatus::Parked,
            ra: 0.0,
            dec: 90.0,
            slew: None,
            slew_time,
        }
    }

    /// 指向到时即转入跟踪
    fn advance(&mut self) {
        if let Some((since, ra, dec)) = self.slew
            && since.elapsed() >= self.slew_time
        {
            self.ra = ra;
            self.dec = dec;
            self.slew = None;
            self.status = MountStatus::Tracking;
        }
    }

    fn refuse_if_parked(&self, action: &str) -> Result<(), HardwareError> {
        if self.status == MountStatus::Parked {
            return Err(HardwareError::InvalidArgument(format!(
                "cannot {} while parked",
                action
            )));
        }
        Ok(())
    }
}

/// 模拟赤道仪（上电时处于停放状态）
pub struct FakeMount {
    serial: String,
    state: Arc<Mutex<MountModel>>,
    faults: FaultInjector,
}

impl FakeMount {
    pub(crate) fn new(serial: String, state: Arc<Mutex<MountModel>>, faults: FaultInjector) -> Self {
        Self {
            serial,
            state,
            faults,
        }
    }
}

impl Mount for FakeMount {
    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn get_info(&mut self) -> Result<MountInfo, HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.advance();
        Ok(MountInfo {
            serial_number: self.serial.clone(),
            status: state.status,
            ra: state.ra,
            dec: state.dec,
            target: state.slew.map(|(_, ra, dec)| (ra, dec)),
        })
    }

    fn slew_to_radec(&mut self, ra: f64, dec: f64) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.refuse_if_parked("slew")?;
        state.slew = Some((Instant::now(), ra, dec));
        state.status = MountStatus::Slewing;
        Ok(())
    }

    fn track(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.refuse_if_parked("track")?;
        state.advance();
        if state.status != MountStatus::Slewing {
            state.status = MountStatus::Tracking;
        }
        Ok(())
    }

    fn halt(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.refuse_if_parked("halt")?;
        state.slew = None;
        state.status = MountStatus::Stopped;
        Ok(())
    }

    fn park(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.slew = None;
        state.ra = 0.0;
        state.dec = 90.0;
        state.status = MountStatus::Parked;
        Ok(())
    }

    fn unpark(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        if state.status != MountStatus::Parked {
            return Err(HardwareError::InvalidArgument("mount is not parked".to_string()));
        }
        state.status = MountStatus::Stopped;
        Ok(())
    }
}
