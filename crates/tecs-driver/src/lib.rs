//! 驱动层模块
//!
//! 提供 TeCS 守护进程的核心并发模式：
//! - 单一控制线程独占硬件（[`control_loop`]）
//! - 命令邮箱，按 `(单元, 操作)` 合并（[`CommandChannel`]）
//! - 故障集合 `bad_hardware`（[`HardwareRegistry`]）
//! - 状态快照（ArcSwap 无锁读取，[`StatusPublisher`]）
//! - 心跳与生命周期（[`LoopMonitor`]、[`Daemon`]）
//!
//! # 使用场景
//!
//! 具体设备族（相机、调焦器、滤光片轮、赤道仪）实现 [`HardwareUnit`]，
//! 由 `tecs-control` 在此之上加入领域状态机。

mod builder;
pub mod command;
mod daemon;
mod error;
pub mod heartbeat;
pub mod pipeline;
pub mod registry;
pub mod state;
mod unit;

pub use builder::DaemonBuilder;
pub use command::{Command, CommandChannel, Enqueued, Envelope, PendingView};
pub use daemon::Daemon;
pub use error::DriverError;
pub use heartbeat::{DaemonStatus, Liveness, LoopMonitor};
pub use pipeline::{DaemonContext, LoopConfig, control_loop};
pub use registry::HardwareRegistry;
pub use state::{StatusPublisher, StatusSnapshot, UnitStatus};
pub use unit::HardwareUnit;
