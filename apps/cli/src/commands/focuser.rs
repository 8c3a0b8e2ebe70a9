//! 调焦器命令

use super::call_interfaces;
use super::camera::Units;
use anyhow::Result;
use clap::Subcommand;
use serde_json::{Value, json};
use tecs_control::SiteConfig;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum FocuserCommand {
    /// 相对移动
    Move {
        #[arg(allow_negative_numbers = true)]
        steps: i64,
        #[command(flatten)]
        units: Units,
    },
    /// 移动到绝对位置
    Set {
        position: i64,
        #[command(flatten)]
        units: Units,
    },
    /// 回零
    Home {
        #[command(flatten)]
        units: Units,
    },
    /// 停在当前位置
    Stop {
        #[command(flatten)]
        units: Units,
    },
}

impl FocuserCommand {
    fn request(&self) -> (&'static str, Value, &[String]) {
        match self {
            FocuserCommand::Move { steps, units } => {
                ("move_focuser", json!({ "steps": steps }), &units.units)
            },
            FocuserCommand::Set { position, units } => {
                ("set_focuser", json!({ "position": position }), &units.units)
            },
            FocuserCommand::Home { units } => ("home_focuser", json!({}), &units.units),
            FocuserCommand::Stop { units } => ("stop_focuser", json!({}), &units.units),
        }
    }

    pub fn execute(&self, config: &SiteConfig) -> Result<()> {
        let (method, params, units) = self.request();
        call_interfaces(config, "foc", units, method, params)
    }
}
