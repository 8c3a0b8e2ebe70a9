//! 赤道仪命令

use super::render;
use crate::site;
use anyhow::Result;
use clap::Subcommand;
use serde_json::{Value, json};
use tecs_control::SiteConfig;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MountCommand {
    /// 指向赤道坐标
    Slew {
        /// 赤经（小时，0..24）
        #[arg(long, allow_negative_numbers = true)]
        ra: f64,
        /// 赤纬（度，-90..90）
        #[arg(long, allow_negative_numbers = true)]
        dec: f64,
    },
    /// 开始跟踪
    Track,
    /// 停止运动
    Halt,
    /// 归位停放
    Park,
    /// 解除停放
    Unpark,
}

impl MountCommand {
    fn request(&self) -> (&'static str, Value) {
        match self {
            MountCommand::Slew { ra, dec } => ("slew", json!({ "ra": ra, "dec": dec })),
            MountCommand::Track => ("track", Value::Null),
            MountCommand::Halt => ("halt", Value::Null),
            MountCommand::Park => ("park", Value::Null),
            MountCommand::Unpark => ("unpark", Value::Null),
        }
    }

    pub fn execute(&self, config: &SiteConfig) -> Result<()> {
        let (method, params) = self.request();
        let value = site::mount(config)?.call(method, params)?;
        println!("{}", render(&value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request() {
        let slew = MountCommand::Slew { ra: 5.5, dec: -20.0 };
        assert_eq!(slew.request(), ("slew", json!({"ra": 5.5, "dec": -20.0})));
        assert_eq!(MountCommand::Park.request(), ("park", Value::Null));
    }
}
