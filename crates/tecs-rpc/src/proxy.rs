//! 客户端代理
//!
//! 每次调用新建一条连接，连接、写、读都有超时：守护进程卡住时调用方
//! 最多等待 `timeout`，然后得到 [`ProxyError::Timeout`]。

use crate::error::ProxyError;
use crate::protocol::{Request, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::trace;

/// 远端某个对象的代理
#[derive(Debug, Clone)]
pub struct DaemonProxy {
    addr: SocketAddr,
    object: String,
    timeout: Duration,
}

impl DaemonProxy {
    /// # 错误
    /// - `ProxyError::Protocol`：地址无法解析
    pub fn new(
        addr: impl ToSocketAddrs + std::fmt::Display,
        object: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let resolved = addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ProxyError::Protocol(format!("cannot resolve {}", addr)))?;
        Ok(Self::with_addr(resolved, object, timeout))
    }

    pub fn with_addr(addr: SocketAddr, object: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr,
            object: object.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// 调用远端方法
    pub fn call(&self, method: &str, params: Value) -> Result<Value, ProxyError> {
        let request = Request::new(self.object.clone(), method, params);
        let mut encoded =
            serde_json::to_string(&request).map_err(|e| ProxyError::Protocol(e.to_string()))?;
        encoded.push('\n');
        trace!("-> {} {}", self.addr, encoded.trim_end());

        let stream = TcpStream::connect_timeout(&self.addr, self.timeout)
            .map_err(|e| self.io_error(e))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| self.io_error(e))?;

        let mut writer = stream.try_clone().map_err(|e| self.io_error(e))?;
        writer
            .write_all(encoded.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| self.io_error(e))?;

        let mut line = String::new();
        let read = BufReader::new(stream)
            .read_line(&mut line)
            .map_err(|e| self.io_error(e))?;
        if read == 0 {
            return Err(ProxyError::Protocol(format!(
                "{} closed the connection",
                self.addr
            )));
        }
        trace!("<- {} {}", self.addr, line.trim_end());

        match serde_json::from_str::<Response>(&line)
            .map_err(|e| ProxyError::Protocol(e.to_string()))?
        {
            Response::Ok(value) => Ok(value),
            Response::Err(err) => Err(ProxyError::Remote(err)),
        }
    }

    /// 调用并反序列化结果
    pub fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ProxyError> {
        let value = self.call(method, params)?;
        serde_json::from_value(value).map_err(|e| ProxyError::Protocol(e.to_string()))
    }

    /// `"ping"`，或控制线程卡住时的诊断字符串
    pub fn ping(&self) -> Result<String, ProxyError> {
        self.call_as("ping", Value::Null)
    }

    pub fn get_status(&self) -> Result<String, ProxyError> {
        self.call_as("get_status", Value::Null)
    }

    /// 最近的状态快照；`force` 时远端先强制检查硬件
    pub fn get_info(&self, force: bool) -> Result<Value, ProxyError> {
        self.call("get_info", json!({ "force": force }))
    }

    pub fn shutdown(&self) -> Result<String, ProxyError> {
        self.call_as("shutdown", Value::Null)
    }

    fn io_error(&self, err: std::io::Error) -> ProxyError {
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ProxyError::Timeout { addr: self.addr },
            _ => ProxyError::Unreachable {
                addr: self.addr,
                message: err.to_string(),
            },
        }
    }
}
