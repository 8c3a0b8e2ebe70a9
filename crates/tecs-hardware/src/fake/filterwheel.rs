use super::Motor;
use super::faults::FaultInjector;
use crate::device::FilterWheel;
use crate::error::HardwareError;
use crate::types::FilterWheelInfo;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct WheelModel {
    motor: Motor,
    positions: usize,
    steps_per_filter: i64,
    homed: bool,
}

impl WheelModel {
    pub(crate) fn new(positions: usize, steps_per_filter: i64, step_rate: f64) -> Self {
        Self {
            motor: Motor::at(0, step_rate),
            positions,
            steps_per_filter,
            homed: false,
        }
    }

    /// 电机停下时所在的槽位；运动中报告出发前最近的槽位
    fn filter_pos(&self) -> usize {
        let position = if self.motor.remaining() == 0 {
            self.motor.target()
        } else {
            self.motor.position()
        };
        let last = self.positions.max(1) as i64 - 1;
        (position / self.steps_per_filter).clamp(0, last) as usize
    }
}

/// 模拟滤光片轮
pub struct FakeFilterWheel {
    serial: String,
    state: Arc<Mutex<WheelModel>>,
    faults: FaultInjector,
}

impl FakeFilterWheel {
    pub(crate) fn new(serial: String, state: Arc<Mutex<WheelModel>>, faults: FaultInjector) -> Self {
        Self {
            serial,
            state,
            faults,
        }
    }
}

impl FilterWheel for FakeFilterWheel {
    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn get_info(&mut self) -> Result<FilterWheelInfo, HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let state = self.state.lock();
        Ok(FilterWheelInfo {
            serial_number: self.serial.clone(),
            filter_pos: state.filter_pos(),
            num_positions: state.positions,
            stepper_position: state.motor.position(),
            steps_remaining: state.motor.remaining(),
            homed: state.homed,
        })
    }

    fn set_filter_pos(&mut self, pos: usize) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        if pos >= state.positions {
            return Err(HardwareError::InvalidArgument(format!(
                "filter position {} (wheel has {})",
                pos, state.positions
            )));
        }
        let target = pos as i64 * state.steps_per_filter;
        state.motor.move_to(target);
        Ok(())
    }

    fn home(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.motor.reset(0);
        state.homed = true;
        Ok(())
    }
}
