//! # 站点配置
//!
//! 描述一个站点的全部守护进程：控制循环参数、RPC 超时、赤道仪、圆顶，
//! 以及若干个"接口"（每台接口主机管理若干望远镜的相机、调焦器、滤光片轮）。
//!
//! 配置文件路径：
//! - Linux/macOS: `~/.config/tecs/site.toml`
//! - Windows: `%APPDATA%\tecs\site.toml`
//!
//! ```toml
//! [daemon]
//! check_period_ms = 3000
//!
//! [mount]
//! host = "127.0.0.1"
//! port = 9001
//! device = { class = "fake", serial = "mount-1" }
//!
//! [dome]
//! port = 9002
//! device = { class = "fake", serial = "dome-1" }
//!
//! [interfaces.ut1_interface]
//! host = "127.0.0.1"
//! port = 9011
//!
//! [[interfaces.ut1_interface.telescopes]]
//! name = "ut1"
//! camera = { class = "fake", serial = "cam-1" }
//! focuser = { class = "fake", serial = "foc-1" }
//! filter_wheel = { class = "fake", serial = "filt-1" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tecs_driver::LoopConfig;
use tecs_hardware::DeviceSpec;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Host {0} does not have an associated interface")]
    NoInterfaceForHost(String),

    #[error("All defined interfaces on {0} are running")]
    AllInterfacesClaimed(String),

    #[error("Unknown interface: {0}")]
    UnknownInterface(String),
}

/// 站点配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// 控制循环参数
    pub daemon: DaemonSettings,

    /// RPC 客户端参数
    pub rpc: RpcSettings,

    pub mount: MountConfig,

    pub dome: DomeConfig,

    pub filter_wheel: FilterSettings,

    /// 接口 ID -> 接口
    pub interfaces: BTreeMap<String, InterfaceConfig>,
}

/// 控制循环参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// 硬件检查周期（ms）
    pub check_period_ms: u64,

    /// 每轮循环末尾的休眠（ms）
    pub sleep_time_ms: u64,

    /// 心跳过期阈值（ms），超过即报告控制线程卡住
    pub ping_life_ms: u64,

    /// `get_info(force)` 等待新快照的上限（ms）
    pub info_timeout_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            check_period_ms: 3000,
            sleep_time_ms: 10,
            ping_life_ms: 10_000,
            info_timeout_ms: 5000,
        }
    }
}

/// RPC 客户端参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// 单次调用超时（ms）
    pub timeout_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    pub host: String,
    pub port: u16,
    pub device: DeviceSpec,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9001,
            device: DeviceSpec::fake("mount-1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomeConfig {
    pub host: String,
    pub port: u16,
    pub device: DeviceSpec,
}

impl Default for DomeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9002,
            device: DeviceSpec::fake("dome-1"),
        }
    }
}

/// 滤光片名（按槽位排列）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub names: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            names: ["L", "R", "G", "B", "C"].map(String::from).to_vec(),
        }
    }
}

/// 一台接口主机
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub host: String,
    pub port: u16,
    pub telescopes: Vec<TelescopeConfig>,
}

/// 一台望远镜上的设备
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelescopeConfig {
    pub name: String,
    pub camera: DeviceSpec,
    pub focuser: DeviceSpec,
    pub filter_wheel: DeviceSpec,
}

impl Default for SiteConfig {
    /// 单接口、单望远镜、全部为模拟设备
    fn default() -> Self {
        let interface = InterfaceConfig {
            host: "127.0.0.1".to_string(),
            port: 9011,
            telescopes: vec![TelescopeConfig {
                name: "ut1".to_string(),
                camera: DeviceSpec::fake("cam-1"),
                focuser: DeviceSpec::fake("foc-1"),
                filter_wheel: DeviceSpec::fake("filt-1"),
            }],
        };
        Self {
            daemon: DaemonSettings::default(),
            rpc: RpcSettings::default(),
            mount: MountConfig::default(),
            dome: DomeConfig::default(),
            filter_wheel: FilterSettings::default(),
            interfaces: BTreeMap::from([("ut1_interface".to_string(), interface)]),
        }
    }
}

impl SiteConfig {
    /// 从文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SiteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验：时间参数为正、端口与望远镜名不重复、滤光片名不重复
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.daemon;
        if d.check_period_ms == 0 || d.ping_life_ms == 0 || d.info_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "daemon periods and timeouts must be > 0".to_string(),
            ));
        }
        if d.ping_life_ms <= d.sleep_time_ms {
            return Err(ConfigError::Invalid(format!(
                "ping_life_ms ({}) must exceed sleep_time_ms ({})",
                d.ping_life_ms, d.sleep_time_ms
            )));
        }
        if self.rpc.timeout_ms == 0 {
            return Err(ConfigError::Invalid("rpc.timeout_ms must be > 0".to_string()));
        }

        let mut filters = HashSet::new();
        for name in &self.filter_wheel.names {
            if !filters.insert(name.to_ascii_uppercase()) {
                return Err(ConfigError::Invalid(format!("duplicate filter name {}", name)));
            }
        }

        let mut endpoints = HashSet::from([(self.mount.host.as_str(), self.mount.port)]);
        if !endpoints.insert((self.dome.host.as_str(), self.dome.port)) {
            return Err(ConfigError::Invalid(format!(
                "dome reuses the mount endpoint {}:{}",
                self.dome.host, self.dome.port
            )));
        }
        let mut telescopes = HashSet::new();
        for (id, interface) in &self.interfaces {
            if !endpoints.insert((interface.host.as_str(), interface.port)) {
                return Err(ConfigError::Invalid(format!(
                    "interface {} reuses {}:{}",
                    id, interface.host, interface.port
                )));
            }
            if interface.telescopes.is_empty() {
                return Err(ConfigError::Invalid(format!("interface {} has no telescopes", id)));
            }
            for telescope in &interface.telescopes {
                if !telescopes.insert(telescope.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "telescope {} is defined twice",
                        telescope.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            check_period: Duration::from_millis(self.daemon.check_period_ms),
            sleep_time: Duration::from_millis(self.daemon.sleep_time_ms),
            ping_life: Duration::from_millis(self.daemon.ping_life_ms),
        }
    }

    pub fn info_timeout(&self) -> Duration {
        Duration::from_millis(self.daemon.info_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.timeout_ms)
    }

    pub fn interface(&self, id: &str) -> Result<&InterfaceConfig, ConfigError> {
        self.interfaces
            .get(id)
            .ok_or_else(|| ConfigError::UnknownInterface(id.to_string()))
    }

    /// 为本机挑选第一个尚未被占用的接口
    ///
    /// `is_claimed` 判断接口是否已有进程在运行（通常是端口已被绑定）。
    pub fn select_interface(
        &self,
        hostname: &str,
        is_claimed: impl Fn(&InterfaceConfig) -> bool,
    ) -> Result<(&str, &InterfaceConfig), ConfigError> {
        let mut candidates = self
            .interfaces
            .iter()
            .filter(|(_, interface)| interface.host == hostname)
            .peekable();
        if candidates.peek().is_none() {
            return Err(ConfigError::NoInterfaceForHost(hostname.to_string()));
        }
        candidates
            .find(|(_, interface)| !is_claimed(interface))
            .map(|(id, interface)| (id.as_str(), interface))
            .ok_or_else(|| ConfigError::AllInterfacesClaimed(hostname.to_string()))
    }

    /// 管理某台望远镜的接口
    pub fn interface_for(&self, telescope: &str) -> Option<(&str, &InterfaceConfig)> {
        self.interfaces
            .iter()
            .find(|(_, interface)| interface.telescopes.iter().any(|t| t.name == telescope))
            .map(|(id, interface)| (id.as_str(), interface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_INTERFACES: &str = r#"
[daemon]
check_period_ms = 500

[filter_wheel]
names = ["L", "R"]

[interfaces.a]
host = "node1"
port = 9011
[[interfaces.a.telescopes]]
name = "ut1"
camera = { class = "fake", serial = "cam-1" }
focuser = { class = "fake", serial = "foc-1" }
filter_wheel = { class = "fake", serial = "filt-1" }

[interfaces.b]
host = "node1"
port = 9012
[[interfaces.b.telescopes]]
name = "ut2"
camera = { class = "fake", serial = "cam-2" }
focuser = { class = "fake", serial = "foc-2" }
filter_wheel = { class = "fake", serial = "filt-2" }
"#;

    #[test]
    fn test_default_is_valid() {
        let config = SiteConfig::default();
        config.validate().unwrap();
        assert_eq!(config.loop_config(), LoopConfig::default());
        assert!(config.interface("ut1_interface").is_ok());
    }

    #[test]
    fn test_parse_with_defaults() {
        let config = SiteConfig::from_toml(TWO_INTERFACES).unwrap();
        assert_eq!(config.daemon.check_period_ms, 500);
        // 未写出的字段取默认值
        assert_eq!(config.daemon.ping_life_ms, 10_000);
        assert_eq!(config.mount, MountConfig::default());
        assert_eq!(config.dome.port, 9002);
        assert_eq!(config.filter_wheel.names, vec!["L", "R"]);
        assert_eq!(config.interfaces.len(), 2);
        assert_eq!(config.interface_for("ut2").map(|(id, _)| id), Some("b"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_INTERFACES.as_bytes()).unwrap();
        let config = SiteConfig::load(file.path()).unwrap();
        assert_eq!(config.interface("a").unwrap().port, 9011);

        let missing = SiteConfig::load(file.path().with_extension("absent"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            SiteConfig::from_toml("[daemon]\ncheck_period_ms = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SiteConfig::from_toml("[filter_wheel]\nnames = [\"L\", \"l\"]\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SiteConfig::from_toml("[daemon\n"),
            Err(ConfigError::Parse(_))
        ));

        assert!(matches!(
            SiteConfig::from_toml(
                "[dome]\nhost = \"127.0.0.1\"\nport = 9001\ndevice = { class = \"fake\", serial = \"d\" }\n"
            ),
            Err(ConfigError::Invalid(_))
        ));

        let duplicated = TWO_INTERFACES.replace("name = \"ut2\"", "name = \"ut1\"");
        assert!(matches!(
            SiteConfig::from_toml(&duplicated),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_select_interface() {
        let config = SiteConfig::from_toml(TWO_INTERFACES).unwrap();

        let (id, _) = config.select_interface("node1", |_| false).unwrap();
        assert_eq!(id, "a");

        let (id, _) = config.select_interface("node1", |i| i.port == 9011).unwrap();
        assert_eq!(id, "b");

        assert!(matches!(
            config.select_interface("node1", |_| true),
            Err(ConfigError::AllInterfacesClaimed(h)) if h == "node1"
        ));
        assert!(matches!(
            config.select_interface("node9", |_| false),
            Err(ConfigError::NoInterfaceForHost(_))
        ));
        assert!(matches!(
            config.interface("c"),
            Err(ConfigError::UnknownInterface(_))
        ));
    }
}
