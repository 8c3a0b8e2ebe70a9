//! RPC 错误类型

use crate::protocol::RemoteError;
use std::net::SocketAddr;
use thiserror::Error;

/// 服务端错误
#[derive(Error, Debug)]
pub enum RpcError {
    /// 端口已被占用或地址不可用
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// 客户端错误
///
/// 调用方据此区分"守护进程不在"（`Unreachable`）、"守护进程卡住"（`Timeout`）
/// 和"守护进程拒绝了命令"（`Remote`）。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyError {
    #[error("Daemon at {addr} is unreachable: {message}")]
    Unreachable { addr: SocketAddr, message: String },

    #[error("Call to {addr} timed out")]
    Timeout { addr: SocketAddr },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Remote(RemoteError),
}

impl ProxyError {
    /// 远端错误（如果是）
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ProxyError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
