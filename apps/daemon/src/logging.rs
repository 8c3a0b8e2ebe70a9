//! 日志初始化
//!
//! - 终端：`RUST_LOG` 控制级别，默认 `info`
//! - 文件（可选）：`<log_dir>/<name>.log.YYYY-MM-DD`，每日轮转，非阻塞写入

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化全局日志
///
/// 返回的 guard 必须一直持有到进程退出，否则缓冲中的日志会丢失。
pub fn init(log_dir: Option<&Path>, name: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter())
                .with(console)
                .with(file)
                .try_init()?;
            Ok(Some(guard))
        },
        None => {
            tracing_subscriber::registry()
                .with(filter())
                .with(console)
                .try_init()?;
            Ok(None)
        },
    }
}
