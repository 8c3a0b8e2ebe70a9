//! 命令定义和实现

pub mod camera;
pub mod daemon;
pub mod dome;
pub mod filter;
pub mod focuser;
pub mod mount;

pub use camera::CameraCommand;
pub use daemon::{DaemonCommand, DaemonKind};
pub use dome::DomeCommand;
pub use filter::FilterCommand;
pub use focuser::FocuserCommand;
pub use mount::MountCommand;

use crate::site::{self, Target};
use anyhow::{Result, bail};
use serde_json::{Map, Value, json};
use tecs_control::SiteConfig;
use tracing::debug;

/// 终端输出：字符串原样打印，其余格式化为 JSON
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// 在参数对象上附加 `units`（为空时不带，表示全部）
pub fn with_units(params: Value, units: &[String]) -> Value {
    let mut map = match params {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if !units.is_empty() {
        map.insert("units".to_string(), json!(units));
    }
    Value::Object(map)
}

/// 对每个接口调用同一方法并打印结果
///
/// 某个接口失败不影响其余接口；有任何失败时返回错误。
pub fn call_interfaces(
    config: &SiteConfig,
    object: &str,
    units: &[String],
    method: &str,
    params: Value,
) -> Result<()> {
    let targets = site::targets(config, object, units)?;
    let single = targets.len() == 1;
    let mut failed = Vec::new();

    for Target {
        interface,
        proxy,
        units,
    } in targets
    {
        debug!("{}.{} -> {} ({})", object, method, interface, proxy.addr());
        match proxy.call(method, with_units(params.clone(), &units)) {
            Ok(value) if single => println!("{}", render(&value)),
            Ok(value) => println!("[{}]\n{}", interface, render(&value)),
            Err(e) => {
                eprintln!("[{}] {}", interface, e);
                failed.push(interface);
            },
        }
    }

    if !failed.is_empty() {
        bail!("{}.{} failed on {}", object, method, failed.join(", "));
    }
    Ok(())
}
