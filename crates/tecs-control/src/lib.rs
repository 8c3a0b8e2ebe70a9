//! # TeCS Control
//!
//! 具体设备族的守护进程：在 `tecs-driver` 的控制循环之上加入领域状态机。
//!
//! 每个守护进程的公开方法都只做两件事：读取最近的快照、求值前置条件，
//! 然后要么立即拒绝（不入队、不碰硬件），要么入队并立即返回确认字符串。
//! 状态变化要等控制线程下一次刷新快照之后才能观察到，需要确认的调用方自行轮询。
//!
//! - [`MountDaemon`]：Parked / Stopped / Tracking / Slewing
//! - [`CameraDaemon`]：Idle / Exposing
//! - [`DomeDaemon`]：Closed / PartOpen / Open / Opening / Closing
//! - [`FocuserDaemon`]、[`FilterWheelDaemon`]：多单元电机
//!
//! 快照、ping、状态摘要和停止由共有的 [`DaemonHandle`] 提供。
//!
//! ```rust,ignore
//! let sim = Simulator::new();
//! let cam = CameraDaemon::spawn(
//!     "cam",
//!     [("ut1".to_string(), DeviceSpec::fake("cam-1"))],
//!     Backends::<dyn Camera>::with_simulator(&sim),
//!     LoopConfig::default(),
//! )?;
//! println!("{}", cam.take_image(30.0, &[])?);
//! ```

pub mod camera;
pub mod config;
mod dispatch;
pub mod dome;
mod error;
pub mod filterwheel;
pub mod focuser;
mod handle;
pub mod mount;

pub use camera::{CameraCommand, CameraDaemon, CameraStatus, ExposureKind, ExposureState};
pub use config::{ConfigError, DomeConfig, InterfaceConfig, SiteConfig, TelescopeConfig};
pub use dome::{DOME_UNIT, DomeCommand, DomeDaemon};
pub use error::ControlError;
pub use filterwheel::{FilterCommand, FilterStatus, FilterWheelDaemon};
pub use focuser::{FocuserCommand, FocuserDaemon};
pub use handle::DaemonHandle;
pub use mount::{MOUNT_UNIT, MountCommand, MountDaemon};
