//! 相机命令

use super::call_interfaces;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tecs_control::SiteConfig;

/// 目标望远镜（不指定表示全部）
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct Units {
    #[arg(short, long = "unit", value_delimiter = ',')]
    pub units: Vec<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CameraCommand {
    /// 拍摄图像
    Image {
        /// 曝光时间（秒）
        exptime: f64,
        #[command(flatten)]
        units: Units,
    },
    /// 拍摄暗场
    Dark {
        exptime: f64,
        #[command(flatten)]
        units: Units,
    },
    /// 拍摄本底
    Bias {
        #[command(flatten)]
        units: Units,
    },
    /// 中止曝光
    Abort {
        #[command(flatten)]
        units: Units,
    },
    /// 设置制冷温度（摄氏度）
    Temp {
        #[arg(allow_negative_numbers = true)]
        temp: f64,
        #[command(flatten)]
        units: Units,
    },
    /// 设置像素合并
    Bin {
        hbin: u32,
        vbin: u32,
        #[command(flatten)]
        units: Units,
    },
    /// 清空待执行队列
    Clear {
        #[command(flatten)]
        units: Units,
    },
}

impl CameraCommand {
    fn request(&self) -> (&'static str, Value, &[String]) {
        match self {
            CameraCommand::Image { exptime, units } => {
                ("take_image", json!({ "exptime": exptime }), &units.units)
            },
            CameraCommand::Dark { exptime, units } => {
                ("take_dark", json!({ "exptime": exptime }), &units.units)
            },
            CameraCommand::Bias { units } => ("take_bias", json!({}), &units.units),
            CameraCommand::Abort { units } => ("abort_exposure", json!({}), &units.units),
            CameraCommand::Temp { temp, units } => {
                ("set_temperature", json!({ "temp": temp }), &units.units)
            },
            CameraCommand::Bin { hbin, vbin, units } => (
                "set_binning",
                json!({ "hbin": hbin, "vbin": vbin }),
                &units.units,
            ),
            CameraCommand::Clear { units } => ("clear_queue", json!({}), &units.units),
        }
    }

    pub fn execute(&self, config: &SiteConfig) -> Result<()> {
        let (method, params, units) = self.request();
        call_interfaces(config, "cam", units, method, params)
    }
}
