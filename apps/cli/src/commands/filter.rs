//! 滤光片轮命令

use super::call_interfaces;
use super::camera::Units;
use anyhow::Result;
use clap::Subcommand;
use serde_json::{Value, json};
use tecs_control::SiteConfig;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum FilterCommand {
    /// 切换到指定滤光片（名字不区分大小写）
    Set {
        filter: String,
        #[command(flatten)]
        units: Units,
    },
    /// 回零
    Home {
        #[command(flatten)]
        units: Units,
    },
}

impl FilterCommand {
    fn request(&self) -> (&'static str, Value, &[String]) {
        match self {
            FilterCommand::Set { filter, units } => {
                ("set_filter", json!({ "filter": filter }), &units.units)
            },
            FilterCommand::Home { units } => ("home_filter", json!({}), &units.units),
        }
    }

    pub fn execute(&self, config: &SiteConfig) -> Result<()> {
        let (method, params, units) = self.request();
        call_interfaces(config, "filt", units, method, params)
    }
}
