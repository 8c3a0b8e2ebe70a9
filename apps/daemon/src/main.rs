//! TeCS 硬件守护进程主入口
//!
//! - `tecsd mount`：赤道仪守护进程（对象 `mnt`）
//! - `tecsd dome`：圆顶守护进程（对象 `dome`）
//! - `tecsd interface [ID]`：接口守护进程，管理一台主机上所有望远镜的
//!   相机、调焦器、滤光片轮（对象 `cam` / `foc` / `filt`）
//!
//! 任一守护进程停止（RPC `shutdown` 或 Ctrl+C）后整个进程退出。

mod logging;
mod objects;

use anyhow::Context;
use clap::{Parser, Subcommand};
use objects::{
    CameraObject, DomeObject, FilterWheelObject, FocuserObject, Lifecycle, MountObject,
};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tecs_control::{
    CameraDaemon, DomeDaemon, FilterWheelDaemon, FocuserDaemon, MountDaemon, SiteConfig,
    TelescopeConfig,
};
use tecs_hardware::fake::Simulator;
use tecs_hardware::{Backends, Camera, DeviceSpec, Dome, FilterWheel, Focuser, Mount};
use tecs_rpc::{RpcObject, RpcServer};
use tracing::{error, info, warn};

/// TeCS 硬件守护进程
#[derive(Parser, Debug)]
#[command(name = "tecsd")]
#[command(about = "TeCS hardware daemons", long_about = None)]
struct Args {
    /// 站点配置文件
    ///
    /// 默认: `<config_dir>/tecs/site.toml`，不存在时使用内置的单望远镜模拟配置
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志目录（不指定时只输出到终端）
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// 赤道仪守护进程
    Mount,
    /// 圆顶守护进程
    Dome,
    /// 接口守护进程
    Interface {
        /// 接口 ID；不指定时选择本机第一个未运行的接口
        id: Option<String>,

        /// 本机主机名（默认取 `HOSTNAME`，再退回 127.0.0.1）
        #[arg(long)]
        host: Option<String>,
    },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tecs").join("site.toml"))
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<SiteConfig> {
    match path {
        Some(path) => SiteConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => SiteConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display())),
            None => {
                info!("No site config found, using built-in simulator config");
                Ok(SiteConfig::default())
            },
        },
    }
}

/// 一个进程内运行的守护进程和它们的 RPC 对象
struct Hosted {
    name: String,
    port: u16,
    daemons: Vec<Arc<dyn Lifecycle>>,
    objects: Vec<(&'static str, Arc<dyn RpcObject>)>,
}

impl Hosted {
    fn add<D, O>(&mut self, object: &'static str, daemon: Arc<D>, wrap: impl FnOnce(Arc<D>) -> O)
    where
        D: Lifecycle + 'static,
        O: RpcObject + 'static,
    {
        self.daemons.push(daemon.clone());
        self.objects.push((object, Arc::new(wrap(daemon))));
    }
}

fn mount(config: &SiteConfig, sim: &Simulator) -> anyhow::Result<Hosted> {
    let daemon = MountDaemon::spawn(
        "mnt",
        config.mount.device.clone(),
        Backends::<dyn Mount>::with_simulator(sim),
        config.loop_config(),
    )?
    .with_info_timeout(config.info_timeout());

    let mut hosted = Hosted {
        name: "mount".to_string(),
        port: config.mount.port,
        daemons: Vec::new(),
        objects: Vec::new(),
    };
    hosted.add("mnt", Arc::new(daemon), MountObject);
    Ok(hosted)
}

fn dome(config: &SiteConfig, sim: &Simulator) -> anyhow::Result<Hosted> {
    let daemon = DomeDaemon::spawn(
        "dome",
        config.dome.device.clone(),
        Backends::<dyn Dome>::with_simulator(sim),
        config.loop_config(),
    )?
    .with_info_timeout(config.info_timeout());

    let mut hosted = Hosted {
        name: "dome".to_string(),
        port: config.dome.port,
        daemons: Vec::new(),
        objects: Vec::new(),
    };
    hosted.add("dome", Arc::new(daemon), DomeObject);
    Ok(hosted)
}

fn port_in_use(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_err()
}

fn interface(
    config: &SiteConfig,
    sim: &Simulator,
    id: Option<String>,
    host: Option<String>,
) -> anyhow::Result<Hosted> {
    let (id, interface) = match id {
        Some(id) => {
            let interface = config.interface(&id)?;
            (id, interface)
        },
        None => {
            let hostname = host
                .or_else(|| std::env::var("HOSTNAME").ok())
                .unwrap_or_else(|| "127.0.0.1".to_string());
            let (id, interface) =
                config.select_interface(&hostname, |interface| port_in_use(interface.port))?;
            (id.to_string(), interface)
        },
    };
    info!(
        "Starting interface {} ({} telescopes)",
        id,
        interface.telescopes.len()
    );

    let units = |pick: fn(&TelescopeConfig) -> &DeviceSpec| {
        interface
            .telescopes
            .iter()
            .map(|t| (t.name.clone(), pick(t).clone()))
            .collect::<Vec<_>>()
    };
    let loop_config = config.loop_config();

    let cam = CameraDaemon::spawn(
        &format!("{}.cam", id),
        units(|t| &t.camera),
        Backends::<dyn Camera>::with_simulator(sim),
        loop_config.clone(),
    )?
    .with_info_timeout(config.info_timeout());
    let foc = FocuserDaemon::spawn(
        &format!("{}.foc", id),
        units(|t| &t.focuser),
        Backends::<dyn Focuser>::with_simulator(sim),
        loop_config.clone(),
    )?
    .with_info_timeout(config.info_timeout());
    let filt = FilterWheelDaemon::spawn(
        &format!("{}.filt", id),
        units(|t| &t.filter_wheel),
        config.filter_wheel.names.clone(),
        Backends::<dyn FilterWheel>::with_simulator(sim),
        loop_config,
    )?
    .with_info_timeout(config.info_timeout());

    let mut hosted = Hosted {
        name: id,
        port: interface.port,
        daemons: Vec::new(),
        objects: Vec::new(),
    };
    hosted.add("cam", Arc::new(cam), CameraObject);
    hosted.add("foc", Arc::new(foc), FocuserObject);
    hosted.add("filt", Arc::new(filt), FilterWheelObject);
    Ok(hosted)
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config)?;
    let sim = Simulator::new();

    let hosted = match args.role {
        Role::Mount => mount(&config, &sim)?,
        Role::Dome => dome(&config, &sim)?,
        Role::Interface { id, host } => interface(&config, &sim, id, host)?,
    };

    let mut server = match RpcServer::bind(("0.0.0.0", hosted.port)) {
        Ok(server) => server,
        Err(e) => {
            for daemon in &hosted.daemons {
                daemon.shutdown();
            }
            return Err(e.into());
        },
    };
    for (name, object) in &hosted.objects {
        server.register(*name, object.clone());
    }

    let daemons: Arc<[Arc<dyn Lifecycle>]> = hosted.daemons.into();
    let on_signal = daemons.clone();
    ctrlc::set_handler(move || {
        warn!("Received interrupt signal, shutting down");
        for daemon in on_signal.iter() {
            daemon.shutdown();
        }
    })
    .context("Failed to set signal handler")?;

    info!("{} started on port {}", hosted.name, hosted.port);
    let keep = daemons.clone();
    let result = server.serve(Arc::new(move || keep.iter().all(|d| d.is_running())));

    // 一个守护进程停止时其余的也一起停
    for daemon in daemons.iter() {
        daemon.shutdown();
    }
    info!("{} stopped", hosted.name);
    Ok(result?)
}

fn main() -> ExitCode {
    let args = Args::parse();
    // guard 持有到 main 返回，保证文件日志刷出
    let _guard = match logging::init(args.log_dir.as_deref(), "tecsd") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        },
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        },
    }
}
