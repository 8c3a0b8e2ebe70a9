//! RPC 服务端
//!
//! 一个监听线程 + 每条连接一个工作线程。工作线程只调用 [`RpcObject`]，
//! 守护进程的对象实现保证这些调用不阻塞在硬件 I/O 上。
//!
//! 监听循环和工作线程都受 `keep_running` 控制：返回 false 后
//! 监听循环在一个轮询间隔内退出，工作线程在当前调用返回后关闭连接。

use crate::error::RpcError;
use crate::protocol::{ErrorKind, RemoteError, Request, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind as IoErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 可远程调用的对象
pub trait RpcObject: Send + Sync {
    fn call(&self, method: &str, params: &Value) -> Result<Value, RemoteError>;
}

type Objects = HashMap<String, Arc<dyn RpcObject>>;

/// 运行条件（通常是"所有守护进程仍在运行"）
pub type KeepRunning = Arc<dyn Fn() -> bool + Send + Sync>;

/// accept / read 的轮询间隔，决定观察到停止标志的延迟
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 单行请求的最大字节数（不含换行）；超过时回复 `bad_request` 并关闭连接
pub const MAX_REQUEST_LEN: usize = 64 * 1024;

pub struct RpcServer {
    listener: TcpListener,
    objects: Objects,
}

impl RpcServer {
    /// 绑定监听地址
    ///
    /// # 错误
    /// - `RpcError::Bind`：地址被占用（常用来判断同一接口是否已有进程在运行）
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(&addr).map_err(|source| RpcError::Bind {
            addr: format!("{:?}", addr),
            source,
        })?;
        Ok(Self {
            listener,
            objects: HashMap::new(),
        })
    }

    /// 注册对象（同名覆盖）
    pub fn register(&mut self, name: impl Into<String>, object: Arc<dyn RpcObject>) -> &mut Self {
        let name = name.into();
        debug!("Registered RPC object {}", name);
        self.objects.insert(name, object);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.listener.local_addr()?)
    }

    /// 服务直到 `keep_running()` 返回 false（阻塞当前线程）
    pub fn serve(self, keep_running: KeepRunning) -> Result<(), RpcError> {
        self.listener.set_nonblocking(true)?;
        let addr = self.listener.local_addr()?;
        let objects = Arc::new(self.objects);
        info!(
            "RPC server listening on {} (objects: {:?})",
            addr,
            objects.keys().collect::<Vec<_>>()
        );

        while keep_running() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let objects = objects.clone();
                    let keep_running = keep_running.clone();
                    thread::Builder::new()
                        .name(format!("rpc-{}", peer))
                        .spawn(move || {
                            if let Err(e) = serve_connection(stream, &objects, &keep_running) {
                                debug!("Connection from {} closed: {}", peer, e);
                            }
                        })
                        .map_err(|e| RpcError::Spawn(e.to_string()))?;
                },
                Err(e) if e.kind() == IoErrorKind::WouldBlock => {
                    // 没有新连接，稍后再看停止标志
                    thread::sleep(POLL_INTERVAL);
                },
                Err(e) => {
                    warn!("RPC accept error: {}", e);
                    thread::sleep(POLL_INTERVAL);
                },
            }
        }

        info!("RPC server on {} stopped", addr);
        Ok(())
    }
}

fn serve_connection(
    stream: TcpStream,
    objects: &Objects,
    keep_running: &KeepRunning,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(POLL_INTERVAL))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    while keep_running() {
        // 多读一个字节，以区分"恰好到上限"和"超过上限"
        let budget = (MAX_REQUEST_LEN + 1).saturating_sub(line.len()) as u64;
        match reader.by_ref().take(budget).read_until(b'\n', &mut line) {
            Ok(_) if line.ends_with(b"\n") => {
                let request = String::from_utf8_lossy(&line);
                let response = handle_line(objects, request.trim_end());
                line.clear();
                write_response(&mut writer, &response)?;
            },
            Ok(_) if line.len() > MAX_REQUEST_LEN => {
                warn!("Request exceeds {} bytes, closing connection", MAX_REQUEST_LEN);
                let response = Response::Err(RemoteError::new(
                    ErrorKind::BadRequest,
                    format!("request exceeds {} bytes", MAX_REQUEST_LEN),
                ));
                return write_response(&mut writer, &response);
            },
            // 对端关闭（可能留下不完整的一行）
            Ok(0) => return Ok(()),
            Ok(_) => {},
            // 超时：已读到的部分保留在 `line` 中，下一轮继续
            Err(e) if matches!(e.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) => {},
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn write_response(writer: &mut TcpStream, response: &Response) -> std::io::Result<()> {
    let mut encoded = serde_json::to_string(response)
        .map_err(|e| std::io::Error::new(IoErrorKind::InvalidData, e))?;
    encoded.push('\n');
    writer.write_all(encoded.as_bytes())?;
    writer.flush()
}

/// 解析一行请求并分发到对象
pub fn handle_line(objects: &HashMap<String, Arc<dyn RpcObject>>, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return Response::Err(RemoteError::new(ErrorKind::BadRequest, e.to_string()));
        },
    };
    trace!("RPC {}.{}({})", request.object, request.method, request.params);

    let Some(object) = objects.get(&request.object) else {
        return Response::Err(RemoteError::new(
            ErrorKind::UnknownObject,
            format!("no object {}", request.object),
        ));
    };
    object.call(&request.method, &request.params).into()
}
