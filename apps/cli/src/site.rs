//! 站点配置 -> 守护进程代理
//!
//! 相机、调焦器、滤光片轮按望远镜分布在多台接口主机上：
//! 命令中的望远镜名先按所属接口分组，再对每个接口各发一次调用。

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tecs_control::SiteConfig;
use tecs_rpc::DaemonProxy;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tecs").join("site.toml"))
}

/// 加载站点配置（与守护进程相同的查找顺序）
pub fn load(path: Option<PathBuf>) -> Result<SiteConfig> {
    let path = path.or_else(|| default_config_path().filter(|p| p.exists()));
    match path {
        Some(path) => {
            SiteConfig::load(&path).with_context(|| format!("Failed to load {}", path.display()))
        },
        None => Ok(SiteConfig::default()),
    }
}

/// 一次接口调用的目标
#[derive(Debug)]
pub struct Target {
    pub interface: String,
    pub proxy: DaemonProxy,
    /// 空表示该接口上的全部望远镜
    pub units: Vec<String>,
}

pub fn mount(config: &SiteConfig) -> Result<DaemonProxy> {
    let addr = format!("{}:{}", config.mount.host, config.mount.port);
    Ok(DaemonProxy::new(addr, "mnt", config.rpc_timeout())?)
}

pub fn dome(config: &SiteConfig) -> Result<DaemonProxy> {
    let addr = format!("{}:{}", config.dome.host, config.dome.port);
    Ok(DaemonProxy::new(addr, "dome", config.rpc_timeout())?)
}

/// 望远镜名按接口分组；未指定望远镜时返回所有接口（各自的单元列表为空）
pub fn group_units(config: &SiteConfig, units: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    if units.is_empty() {
        return Ok(config
            .interfaces
            .keys()
            .map(|id| (id.clone(), Vec::new()))
            .collect());
    }

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for unit in units {
        let Some((id, _)) = config.interface_for(unit) else {
            bail!("Unknown telescope: {}", unit);
        };
        let group = groups.entry(id.to_string()).or_default();
        if !group.contains(unit) {
            group.push(unit.clone());
        }
    }
    Ok(groups)
}

/// `object` 在各接口上的代理
pub fn targets(config: &SiteConfig, object: &str, units: &[String]) -> Result<Vec<Target>> {
    group_units(config, units)?
        .into_iter()
        .map(|(id, units)| -> Result<Target> {
            let interface = config.interface(&id)?;
            let addr = format!("{}:{}", interface.host, interface.port);
            Ok(Target {
                proxy: DaemonProxy::new(addr, object, config.rpc_timeout())?,
                interface: id,
                units,
            })
        })
        .collect()
}
