//! 线协议
//!
//! 每个请求、每个响应各占一行 JSON（以 `\n` 结尾），一条连接上可以顺序发多个请求。
//!
//! ```text
//! -> {"object":"cam","method":"take_image","params":{"exptime":30.0}}
//! <- {"ok":"run 1\nut1: exposing Image (30 s)"}
//! <- {"err":{"kind":"precondition","message":"ut1: already exposing"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 单次调用请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// 目标对象（如 `"mnt"`、`"cam"`）
    pub object: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(object: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            object: object.into(),
            method: method.into(),
            params,
        }
    }
}

/// 调用结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(Value),
    Err(RemoteError),
}

impl From<Result<Value, RemoteError>> for Response {
    fn from(result: Result<Value, RemoteError>) -> Self {
        match result {
            Ok(value) => Response::Ok(value),
            Err(err) => Response::Err(err),
        }
    }
}

/// 远端错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 请求行不是合法的请求
    BadRequest,
    UnknownObject,
    UnknownMethod,
    /// 参数缺失或类型不对
    InvalidParams,
    /// 当前状态不允许（未入队）
    Precondition,
    /// 参数值非法（未入队）
    InvalidParameter,
    UnknownUnit,
    /// 守护进程自身的问题（已停止、等待超时）
    Daemon,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::UnknownObject => "unknown object",
            ErrorKind::UnknownMethod => "unknown method",
            ErrorKind::InvalidParams => "invalid params",
            ErrorKind::Precondition => "precondition",
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::UnknownUnit => "unknown unit",
            ErrorKind::Daemon => "daemon error",
        };
        f.write_str(s)
    }
}

/// 远端返回的错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_method(object: &str, method: &str) -> Self {
        Self::new(
            ErrorKind::UnknownMethod,
            format!("{} has no method {}", object, method),
        )
    }

    pub fn invalid_params(message: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidParams, message.to_string())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {}
