use super::Motor;
use super::faults::FaultInjector;
use crate::device::Focuser;
use crate::error::HardwareError;
use crate::types::FocuserInfo;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct FocuserModel {
    motor: Motor,
    limit: i64,
}

impl FocuserModel {
    pub(crate) fn new(limit: i64, step_rate: f64) -> Self {
        Self {
            motor: Motor::at(0, step_rate),
            limit,
        }
    }
}

/// 模拟调焦器
pub struct FakeFocuser {
    serial: String,
    state: Arc<Mutex<FocuserModel>>,
    faults: FaultInjector,
}

impl FakeFocuser {
    pub(crate) fn new(serial: String, state: Arc<Mutex<FocuserModel>>, faults: FaultInjector) -> Self {
        Self {
            serial,
            state,
            faults,
        }
    }
}

impl Focuser for FakeFocuser {
    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn get_info(&mut self) -> Result<FocuserInfo, HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let state = self.state.lock();
        Ok(FocuserInfo {
            serial_number: self.serial.clone(),
            position: state.motor.position(),
            limit: state.limit,
            steps_remaining: state.motor.remaining(),
            internal_temp: 18.5,
            external_temp: 12.0,
        })
    }

    fn step_motor(&mut self, steps: i64) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        let position = state.motor.position();
        let target = position
            .checked_add(steps)
            .filter(|target| (0..=state.limit).contains(target))
            .ok_or_else(|| {
                HardwareError::InvalidArgument(format!(
                    "moving {} steps from {} leaves 0..={}",
                    steps, position, state.limit
                ))
            })?;
        state.motor.move_to(target);
        Ok(())
    }

    fn home(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        self.state.lock().motor.move_to(0);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        self.state.lock().motor.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_step_and_home() {
        let mut foc = FakeFocuser::new(
            "foc-1".to_string(),
            Arc::new(Mutex::new(FocuserModel::new(2000, 100_000.0))),
            FaultInjector::new(),
        );

        foc.step_motor(500).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let info = foc.get_info().unwrap();
        assert_eq!(info.position, 500);
        assert_eq!(info.steps_remaining, 0);

        assert!(foc.step_motor(1600).is_err());
        assert!(foc.step_motor(-501).is_err());

        assert!(foc.step_motor(i64::MAX).is_err());

        foc.home().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(foc.get_info().unwrap().position, 0);
    }

    #[test]
    fn test_stop_mid_move() {
        let mut foc = FakeFocuser::new(
            "foc-1".to_string(),
            Arc::new(Mutex::new(FocuserModel::new(2000, 1000.0))),
            FaultInjector::new(),
        );

        foc.step_motor(2000).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        foc.stop().unwrap();
        let stopped = foc.get_info().unwrap();
        assert_eq!(stopped.steps_remaining, 0);
        assert!(stopped.position > 0 && stopped.position < 2000);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(foc.get_info().unwrap().position, stopped.position);
    }
}
