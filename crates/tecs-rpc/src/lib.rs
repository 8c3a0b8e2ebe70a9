//! # TeCS RPC
//!
//! 守护进程对外的远程调用层：每个守护进程在固定的 host:port 上注册
//! 若干个对象（如 `"mnt"`、`"cam"`），客户端通过 [`DaemonProxy`] 调用。
//!
//! 协议是逐行 JSON，见 [`protocol`]。客户端调用必须带超时，
//! 守护进程永远不会让调用方无限期等待。

mod error;
pub mod protocol;
mod proxy;
mod server;

pub use error::{ProxyError, RpcError};
pub use protocol::{ErrorKind, RemoteError, Request, Response};
pub use proxy::DaemonProxy;
pub use server::{KeepRunning, MAX_REQUEST_LEN, RpcObject, RpcServer, handle_line};
