//! 圆顶命令

use super::render;
use crate::site;
use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;
use tecs_control::SiteConfig;

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomeCommand {
    /// 打开
    Open,
    /// 关闭
    Close,
    /// 停在当前位置
    Halt,
}

impl DomeCommand {
    fn method(self) -> &'static str {
        match self {
            DomeCommand::Open => "open_dome",
            DomeCommand::Close => "close_dome",
            DomeCommand::Halt => "halt_dome",
        }
    }

    pub fn execute(self, config: &SiteConfig) -> Result<()> {
        let value = site::dome(config)?.call(self.method(), Value::Null)?;
        println!("{}", render(&value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method() {
        assert_eq!(DomeCommand::Open.method(), "open_dome");
        assert_eq!(DomeCommand::Halt.method(), "halt_dome");
    }
}
