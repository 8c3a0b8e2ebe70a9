use super::faults::FaultInjector;
use crate::device::Camera;
use crate::error::HardwareError;
use crate::types::{CameraInfo, FrameType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 环境温度（摄氏度）
const AMBIENT_TEMP: f64 = 20.0;
/// 制冷器满功率时能达到的最大温差
const MAX_DELTA_T: f64 = 75.0;

#[derive(Debug)]
pub(crate) struct CameraModel {
    exptime: Duration,
    frametype: FrameType,
    started: Option<Instant>,
    target_temp: Option<f64>,
    binning: (u32, u32),
    queued_images: u32,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            exptime: Duration::ZERO,
            frametype: FrameType::Normal,
            started: None,
            target_temp: None,
            binning: (1, 1),
            queued_images: 0,
        }
    }
}

impl CameraModel {
    /// 推进曝光：到时即读出，图像进入队列
    fn advance(&mut self) {
        if let Some(started) = self.started
            && started.elapsed() >= self.exptime
        {
            self.started = None;
            self.queued_images += 1;
        }
    }

    fn time_left(&self) -> f64 {
        match self.started {
            Some(started) => self.exptime.saturating_sub(started.elapsed()).as_secs_f64(),
            None => 0.0,
        }
    }
}

/// 模拟相机
pub struct FakeCamera {
    serial: String,
    state: Arc<Mutex<CameraModel>>,
    faults: FaultInjector,
}

impl FakeCamera {
    pub(crate) fn new(serial: String, state: Arc<Mutex<CameraModel>>, faults: FaultInjector) -> Self {
        Self {
            serial,
            state,
            faults,
        }
    }
}

impl Camera for FakeCamera {
    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn get_info(&mut self) -> Result<CameraInfo, HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.advance();

        let ccd_temp = state.target_temp.unwrap_or(AMBIENT_TEMP).max(AMBIENT_TEMP - MAX_DELTA_T);
        let cooler_power = match state.target_temp {
            Some(target) => ((AMBIENT_TEMP - target) / MAX_DELTA_T * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        };

        Ok(CameraInfo {
            serial_number: self.serial.clone(),
            exposing: state.started.is_some(),
            time_left: state.time_left(),
            ccd_temp,
            base_temp: AMBIENT_TEMP,
            cooler_power,
            binning: state.binning,
            queued_images: state.queued_images,
        })
    }

    fn set_exposure(
        &mut self,
        exptime: Duration,
        frametype: FrameType,
    ) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.exptime = exptime;
        state.frametype = frametype;
        Ok(())
    }

    fn start_exposure(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        let mut state = self.state.lock();
        state.advance();
        if state.started.is_some() {
            return Err(HardwareError::InvalidArgument(
                "exposure already in progress".to_string(),
            ));
        }
        state.started = Some(Instant::now());
        Ok(())
    }

    fn abort_exposure(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        self.state.lock().started = None;
        Ok(())
    }

    fn set_temperature(&mut self, celsius: f64) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        if !(-55.0..=45.0).contains(&celsius) {
            return Err(HardwareError::InvalidArgument(format!(
                "temperature {} out of range",
                celsius
            )));
        }
        self.state.lock().target_temp = Some(celsius);
        Ok(())
    }

    fn set_binning(&mut self, hbin: u32, vbin: u32) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        if hbin == 0 || vbin == 0 {
            return Err(HardwareError::InvalidArgument(format!(
                "binning {}x{}",
                hbin, vbin
            )));
        }
        self.state.lock().binning = (hbin, vbin);
        Ok(())
    }

    fn clear_queue(&mut self) -> Result<(), HardwareError> {
        let _call = self.faults.enter(&self.serial)?;
        self.state.lock().queued_images = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> FakeCamera {
        FakeCamera::new(
            "cam-1".to_string(),
            Arc::new(Mutex::new(CameraModel::default())),
            FaultInjector::new(),
        )
    }

    #[test]
    fn test_exposure_completes_and_queues_image() {
        let mut cam = camera();
        cam.set_exposure(Duration::from_millis(30), FrameType::Normal).unwrap();
        cam.start_exposure().unwrap();

        let info = cam.get_info().unwrap();
        assert!(info.exposing);
        assert!(info.time_left > 0.0);

        std::thread::sleep(Duration::from_millis(50));
        let info = cam.get_info().unwrap();
        assert!(!info.exposing);
        assert_eq!(info.time_left, 0.0);
        assert_eq!(info.queued_images, 1);

        cam.clear_queue().unwrap();
        assert_eq!(cam.get_info().unwrap().queued_images, 0);
    }

    #[test]
    fn test_double_start_is_rejected_by_device() {
        let mut cam = camera();
        cam.set_exposure(Duration::from_secs(10), FrameType::Dark).unwrap();
        cam.start_exposure().unwrap();
        assert!(matches!(
            cam.start_exposure(),
            Err(HardwareError::InvalidArgument(_))
        ));
        cam.abort_exposure().unwrap();
        assert!(!cam.get_info().unwrap().exposing);
    }

    #[test]
    fn test_temperature_limits() {
        let mut cam = camera();
        assert!(cam.set_temperature(-60.0).is_err());
        assert!(cam.set_temperature(46.0).is_err());
        cam.set_temperature(-20.0).unwrap();
        let info = cam.get_info().unwrap();
        assert_eq!(info.ccd_temp, -20.0);
        assert!(info.cooler_power > 0.0);
    }
}
