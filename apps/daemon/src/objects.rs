//! 守护进程 -> RPC 对象
//!
//! 每个对象把方法名和 JSON 参数翻译成对守护进程的调用，
//! 结果（确认字符串或快照）原样转成 JSON 返回。

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tecs_control::{
    CameraDaemon, ControlError, DomeDaemon, FilterWheelDaemon, FocuserDaemon, MountDaemon,
};
use tecs_driver::{DaemonStatus, Liveness};
use tecs_rpc::{ErrorKind, RemoteError, RpcObject};

/// 所有守护进程共有的方法
pub trait Lifecycle: Send + Sync {
    fn ping(&self) -> Liveness;
    fn status(&self) -> DaemonStatus;
    fn info(&self, force: bool) -> Result<Value, RemoteError>;
    fn shutdown(&self);
    fn is_running(&self) -> bool;
}

// 具体守护进程的方法与本 trait 同名，这里不把 `DaemonHandle` 引入作用域
impl<D> Lifecycle for D
where
    D: tecs_control::DaemonHandle + Send + Sync,
{
    fn ping(&self) -> Liveness {
        tecs_control::DaemonHandle::ping(self)
    }

    fn status(&self) -> DaemonStatus {
        tecs_control::DaemonHandle::status(self)
    }

    fn info(&self, force: bool) -> Result<Value, RemoteError> {
        let snapshot = tecs_control::DaemonHandle::get_info(self, force).map_err(remote)?;
        serde_json::to_value(&*snapshot)
            .map_err(|e| RemoteError::new(ErrorKind::Daemon, e.to_string()))
    }

    fn shutdown(&self) {
        tecs_control::DaemonHandle::shutdown(self)
    }

    fn is_running(&self) -> bool {
        tecs_control::DaemonHandle::is_running(self)
    }
}

fn remote(err: ControlError) -> RemoteError {
    let kind = match &err {
        ControlError::Precondition(_) => ErrorKind::Precondition,
        ControlError::InvalidParameter(_) => ErrorKind::InvalidParameter,
        ControlError::UnknownUnit(_) => ErrorKind::UnknownUnit,
        ControlError::Driver(_) => ErrorKind::Daemon,
    };
    RemoteError::new(kind, err.to_string())
}

fn reply(result: Result<String, ControlError>) -> Result<Value, RemoteError> {
    result.map(Value::String).map_err(remote)
}

/// 缺省参数按 `{}` 处理
fn params<T: DeserializeOwned>(params: &Value) -> Result<T, RemoteError> {
    let value = if params.is_null() { json!({}) } else { params.clone() };
    serde_json::from_value(value).map_err(RemoteError::invalid_params)
}

#[derive(Deserialize)]
struct Info {
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct Units {
    #[serde(default)]
    units: Vec<String>,
}

fn lifecycle(
    daemon: &dyn Lifecycle,
    object: &str,
    method: &str,
    args: &Value,
) -> Result<Value, RemoteError> {
    match method {
        "ping" => Ok(json!(daemon.ping().to_string())),
        "get_status" => Ok(json!(daemon.status().to_string())),
        "get_info" => {
            let Info { force } = params(args)?;
            daemon.info(force)
        },
        "shutdown" => {
            daemon.shutdown();
            Ok(json!("shutting down"))
        },
        other => Err(RemoteError::unknown_method(object, other)),
    }
}

/// `mnt`
pub struct MountObject(pub Arc<MountDaemon>);

#[derive(Deserialize)]
struct Slew {
    ra: f64,
    dec: f64,
}

impl RpcObject for MountObject {
    fn call(&self, method: &str, args: &Value) -> Result<Value, RemoteError> {
        let mount = &*self.0;
        match method {
            "slew" => {
                let Slew { ra, dec } = params(args)?;
                reply(mount.slew_to_radec(ra, dec))
            },
            "track" => reply(mount.start_tracking()),
            "halt" => reply(mount.full_stop()),
            "park" => reply(mount.park()),
            "unpark" => reply(mount.unpark()),
            _ => lifecycle(mount, "mnt", method, args),
        }
    }
}

/// `dome`
pub struct DomeObject(pub Arc<DomeDaemon>);

impl RpcObject for DomeObject {
    fn call(&self, method: &str, args: &Value) -> Result<Value, RemoteError> {
        let dome = &*self.0;
        match method {
            "open_dome" => reply(dome.open_dome()),
            "close_dome" => reply(dome.close_dome()),
            "halt_dome" => reply(dome.halt_dome()),
            _ => lifecycle(dome, "dome", method, args),
        }
    }
}

/// `cam`
pub struct CameraObject(pub Arc<CameraDaemon>);

#[derive(Deserialize)]
struct Exposure {
    exptime: f64,
    #[serde(default)]
    units: Vec<String>,
}

#[derive(Deserialize)]
struct Temperature {
    temp: f64,
    #[serde(default)]
    units: Vec<String>,
}

#[derive(Deserialize)]
struct Binning {
    hbin: u32,
    vbin: u32,
    #[serde(default)]
    units: Vec<String>,
}

impl RpcObject for CameraObject {
    fn call(&self, method: &str, args: &Value) -> Result<Value, RemoteError> {
        let cam = &*self.0;
        match method {
            "take_image" => {
                let Exposure { exptime, units } = params(args)?;
                reply(cam.take_image(exptime, &units))
            },
            "take_dark" => {
                let Exposure { exptime, units } = params(args)?;
                reply(cam.take_dark(exptime, &units))
            },
            "take_bias" => {
                let Units { units } = params(args)?;
                reply(cam.take_bias(&units))
            },
            "abort_exposure" => {
                let Units { units } = params(args)?;
                reply(cam.abort_exposure(&units))
            },
            "set_temperature" => {
                let Temperature { temp, units } = params(args)?;
                reply(cam.set_temperature(temp, &units))
            },
            "set_binning" => {
                let Binning { hbin, vbin, units } = params(args)?;
                reply(cam.set_binning(hbin, vbin, &units))
            },
            "clear_queue" => {
                let Units { units } = params(args)?;
                reply(cam.clear_queue(&units))
            },
            "get_run_number" => Ok(json!(cam.run_number())),
            _ => lifecycle(cam, "cam", method, args),
        }
    }
}

/// `foc`
pub struct FocuserObject(pub Arc<FocuserDaemon>);

#[derive(Deserialize)]
struct Steps {
    steps: i64,
    #[serde(default)]
    units: Vec<String>,
}

#[derive(Deserialize)]
struct Position {
    position: i64,
    #[serde(default)]
    units: Vec<String>,
}

impl RpcObject for FocuserObject {
    fn call(&self, method: &str, args: &Value) -> Result<Value, RemoteError> {
        let foc = &*self.0;
        match method {
            "move_focuser" => {
                let Steps { steps, units } = params(args)?;
                reply(foc.move_focuser(steps, &units))
            },
            "set_focuser" => {
                let Position { position, units } = params(args)?;
                reply(foc.set_focuser(position, &units))
            },
            "home_focuser" => {
                let Units { units } = params(args)?;
                reply(foc.home_focuser(&units))
            },
            "stop_focuser" => {
                let Units { units } = params(args)?;
                reply(foc.stop_focuser(&units))
            },
            _ => lifecycle(foc, "foc", method, args),
        }
    }
}

/// `filt`
pub struct FilterWheelObject(pub Arc<FilterWheelDaemon>);

#[derive(Deserialize)]
struct Filter {
    filter: String,
    #[serde(default)]
    units: Vec<String>,
}

impl RpcObject for FilterWheelObject {
    fn call(&self, method: &str, args: &Value) -> Result<Value, RemoteError> {
        let filt = &*self.0;
        match method {
            "set_filter" => {
                let Filter { filter, units } = params(args)?;
                reply(filt.set_filter(&filter, &units))
            },
            "home_filter" => {
                let Units { units } = params(args)?;
                reply(filt.home_filter(&units))
            },
            "get_filters" => Ok(json!(filt.filters())),
            _ => lifecycle(filt, "filt", method, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tecs_driver::LoopConfig;
    use tecs_hardware::fake::Simulator;
    use tecs_hardware::fake::SimSettings;
    use tecs_hardware::{Backends, Camera, DeviceSpec, Dome, Focuser, Mount};

    fn fast() -> LoopConfig {
        LoopConfig {
            check_period: Duration::from_millis(20),
            sleep_time: Duration::from_millis(2),
            ping_life: Duration::from_secs(2),
        }
    }

    fn camera(sim: &Simulator) -> CameraObject {
        let daemon = CameraDaemon::spawn(
            "cam",
            [("ut1".to_string(), DeviceSpec::fake("cam-1"))],
            Backends::<dyn Camera>::with_simulator(sim),
            fast(),
        )
        .unwrap();
        CameraObject(Arc::new(daemon))
    }

    fn wait_connected(object: &dyn RpcObject) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            let info = object.call("get_info", &Value::Null).unwrap();
            if info["units"]["ut1"]["connected"] == json!(true) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("unit never connected");
    }

    #[test]
    fn test_camera_object() {
        let sim = Simulator::new();
        let cam = camera(&sim);
        assert_eq!(cam.call("ping", &Value::Null).unwrap(), json!("ping"));
        wait_connected(&cam);
        assert_eq!(cam.call("get_status", &Value::Null).unwrap(), json!("running"));

        let err = cam.call("take_image", &json!({"units": ["ut1"]})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParams);

        let ack = cam.call("take_image", &json!({"exptime": 5.0})).unwrap();
        assert!(ack.as_str().unwrap().starts_with("run 1"));
        let err = cam.call("take_image", &json!({"exptime": 5.0})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);

        let err = cam
            .call("take_bias", &json!({"units": ["ut7"]}))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownUnit);

        let err = cam.call("set_temperature", &json!({"temp": 99.0})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);

        assert_eq!(cam.call("get_run_number", &Value::Null).unwrap(), json!(1));
        let err = cam.call("open_shutter", &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownMethod);

        assert_eq!(cam.call("shutdown", &Value::Null).unwrap(), json!("shutting down"));
        assert!(!cam.0.is_running());
        let err = cam.call("take_bias", &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Daemon);
    }

    #[test]
    fn test_mount_object() {
        let sim = Simulator::new();
        let daemon = MountDaemon::spawn(
            "mnt",
            DeviceSpec::fake("mount-1"),
            Backends::<dyn Mount>::with_simulator(&sim),
            fast(),
        )
        .unwrap();
        let mnt = MountObject(Arc::new(daemon));

        let deadline = Instant::now() + Duration::from_secs(1);
        while mnt.0.mount_status().is_none() {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
        }

        let err = mnt.call("park", &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
        assert_eq!(err.message, "already parked");

        let err = mnt.call("slew", &json!({"ra": 1.0})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParams);

        let info = mnt.call("get_info", &json!({"force": true})).unwrap();
        assert_eq!(info["units"]["mount"]["status"]["status"], json!("parked"));
    }

    #[test]
    fn test_dome_object() {
        let sim = Simulator::with_settings(SimSettings {
            dome_travel_time: Duration::from_secs(5),
            ..SimSettings::default()
        });
        let daemon = DomeDaemon::spawn(
            "dome",
            DeviceSpec::fake("dome-1"),
            Backends::<dyn Dome>::with_simulator(&sim),
            fast(),
        )
        .unwrap();
        let dome = DomeObject(Arc::new(daemon));
        let deadline = Instant::now() + Duration::from_secs(1);
        while dome.0.dome_status().is_none() {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(dome.call("close_dome", &Value::Null).unwrap(), json!("already closed"));
        assert_eq!(dome.call("open_dome", &Value::Null).unwrap(), json!("opening dome"));
        let err = dome.call("open_dome", &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
        assert_eq!(dome.call("halt_dome", &Value::Null).unwrap(), json!("halting dome"));

        let info = dome.call("get_info", &json!({"force": true})).unwrap();
        assert!(info["units"]["dome"]["status"]["open_fraction"].is_number());
        assert!(info["check_ticket"].as_u64().unwrap() >= 1);

        assert_eq!(dome.call("shutdown", &Value::Null).unwrap(), json!("shutting down"));
        assert!(!dome.0.is_running());
    }

    #[test]
    fn test_focuser_stop_method() {
        let sim = Simulator::new();
        let daemon = FocuserDaemon::spawn(
            "foc",
            [("ut1".to_string(), DeviceSpec::fake("foc-1"))],
            Backends::<dyn Focuser>::with_simulator(&sim),
            fast(),
        )
        .unwrap();
        let foc = FocuserObject(Arc::new(daemon));
        wait_connected(&foc);

        assert_eq!(
            foc.call("stop_focuser", &Value::Null).unwrap(),
            json!("ut1: not moving")
        );
        let err = foc
            .call("stop_focuser", &json!({"units": ["ut9"]}))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownUnit);
    }
}
