//! 守护进程生命周期命令：ping / status / info / shutdown

use super::{call_interfaces, render};
use crate::site;
use anyhow::Result;
use clap::ValueEnum;
use serde_json::{Value, json};
use tecs_control::SiteConfig;

/// 守护进程类型
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonKind {
    /// 赤道仪
    Mnt,
    /// 圆顶
    Dome,
    /// 相机（每个接口一个）
    Cam,
    /// 调焦器（每个接口一个）
    Foc,
    /// 滤光片轮（每个接口一个）
    Filt,
}

impl DaemonKind {
    pub fn object(self) -> &'static str {
        match self {
            DaemonKind::Mnt => "mnt",
            DaemonKind::Dome => "dome",
            DaemonKind::Cam => "cam",
            DaemonKind::Foc => "foc",
            DaemonKind::Filt => "filt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonCommand {
    Ping,
    Status,
    Info { force: bool },
    Shutdown,
}

impl DaemonCommand {
    fn request(self) -> (&'static str, Value) {
        match self {
            DaemonCommand::Ping => ("ping", Value::Null),
            DaemonCommand::Status => ("get_status", Value::Null),
            DaemonCommand::Info { force } => ("get_info", json!({ "force": force })),
            DaemonCommand::Shutdown => ("shutdown", Value::Null),
        }
    }

    pub fn execute(self, config: &SiteConfig, kind: DaemonKind) -> Result<()> {
        let (method, params) = self.request();
        // 赤道仪与圆顶各只有一个守护进程，其余按接口分发
        let proxy = match kind {
            DaemonKind::Mnt => site::mount(config)?,
            DaemonKind::Dome => site::dome(config)?,
            _ => return call_interfaces(config, kind.object(), &[], method, params),
        };
        let value = proxy.call(method, params)?;
        println!("{}", render(&value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request() {
        assert_eq!(
            DaemonCommand::Info { force: true }.request(),
            ("get_info", json!({"force": true}))
        );
        assert_eq!(DaemonCommand::Status.request().0, "get_status");
        assert_eq!(DaemonKind::Filt.object(), "filt");
        assert_eq!(DaemonKind::Dome.object(), "dome");
    }
}
