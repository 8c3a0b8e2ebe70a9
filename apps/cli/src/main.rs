//! # TeCS CLI
//!
//! 向赤道仪守护进程和各接口守护进程发送命令。
//!
//! ```bash
//! tecs-cli status cam
//! tecs-cli info mnt --force
//! tecs-cli mount slew --ra 5.5 --dec -20
//! tecs-cli dome open
//! tecs-cli cam image 30 -u ut1,ut2
//! tecs-cli filt set R
//! tecs-cli foc stop -u ut2
//! ```
//!
//! 望远镜名按站点配置映射到所属接口；不指定望远镜时发往所有接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod site;

use commands::{
    CameraCommand, DaemonCommand, DaemonKind, DomeCommand, FilterCommand, FocuserCommand,
    MountCommand,
};

/// TeCS CLI - 望远镜控制命令行工具
#[derive(Parser, Debug)]
#[command(name = "tecs-cli")]
#[command(about = "Command-line interface for the TeCS hardware daemons", long_about = None)]
#[command(version)]
struct Cli {
    /// 站点配置文件（默认 `<config_dir>/tecs/site.toml`）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 控制线程是否存活
    Ping { daemon: DaemonKind },

    /// 状态摘要
    Status { daemon: DaemonKind },

    /// 状态快照
    Info {
        daemon: DaemonKind,
        /// 先强制检查硬件再返回
        #[arg(short, long)]
        force: bool,
    },

    /// 停止守护进程
    Shutdown { daemon: DaemonKind },

    /// 赤道仪
    #[command(subcommand)]
    Mount(MountCommand),

    /// 圆顶
    #[command(subcommand)]
    Dome(DomeCommand),

    /// 相机
    #[command(subcommand)]
    Cam(CameraCommand),

    /// 调焦器
    #[command(subcommand)]
    Foc(FocuserCommand),

    /// 滤光片轮
    #[command(subcommand)]
    Filt(FilterCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = site::load(cli.config)?;

    match cli.command {
        Commands::Ping { daemon } => DaemonCommand::Ping.execute(&config, daemon),
        Commands::Status { daemon } => DaemonCommand::Status.execute(&config, daemon),
        Commands::Info { daemon, force } => DaemonCommand::Info { force }.execute(&config, daemon),
        Commands::Shutdown { daemon } => DaemonCommand::Shutdown.execute(&config, daemon),
        Commands::Mount(cmd) => cmd.execute(&config),
        Commands::Dome(cmd) => cmd.execute(&config),
        Commands::Cam(cmd) => cmd.execute(&config),
        Commands::Foc(cmd) => cmd.execute(&config),
        Commands::Filt(cmd) => cmd.execute(&config),
    }
}
