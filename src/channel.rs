//! # 宿主命令通道
//!
//! 把宿主应用的方法调用（方法名 + JSON 参数）映射到解析器操作，
//! 结果序列化成扁平的 JSON 值。
//!
//! | 方法名 | 返回 |
//! |--------|------|
//! | `getProxySettings` | 摘要视图 |
//! | `isProxyEnabled` | bool |
//! | `getProxyServer` | string |
//! | `getDetailedProxySettings` | 详细视图 |
//! | `getProxyForURL` | `{scheme, host, port}` 或 null |
//!
//! 未知方法名由宿主自己回应"未实现"，这里只返回 None。

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::ResolveError;
use crate::resolver::ProxyResolver;

/// 宿主可以调用的方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GetProxySettings,
    IsProxyEnabled,
    GetProxyServer,
    GetDetailedProxySettings,
    GetProxyForUrl { url: Option<String> },
}

impl Method {
    /// 按方法名和参数构造；未知方法名返回 None
    pub fn parse(name: &str, args: &Value) -> Option<Self> {
        let method = match name {
            "getProxySettings" => Method::GetProxySettings,
            "isProxyEnabled" => Method::IsProxyEnabled,
            "getProxyServer" => Method::GetProxyServer,
            "getDetailedProxySettings" => Method::GetDetailedProxySettings,
            "getProxyForURL" => Method::GetProxyForUrl {
                url: args
                    .get("url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => return None,
        };
        Some(method)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::GetProxySettings => "getProxySettings",
            Method::IsProxyEnabled => "isProxyEnabled",
            Method::GetProxyServer => "getProxyServer",
            Method::GetDetailedProxySettings => "getDetailedProxySettings",
            Method::GetProxyForUrl { .. } => "getProxyForURL",
        }
    }
}

/// 报告给宿主的错误：一个错误码加一条可读消息
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct ChannelError {
    pub code: &'static str,
    pub message: String,
}

impl From<ResolveError> for ChannelError {
    fn from(e: ResolveError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        Self {
            code: "PROXY_ERROR",
            message: e.to_string(),
        }
    }
}

/// 执行一次方法调用
pub fn handle(resolver: &ProxyResolver, method: &Method) -> Result<Value, ChannelError> {
    let value = match method {
        Method::GetProxySettings => serde_json::to_value(resolver.resolve())?,
        Method::IsProxyEnabled => Value::Bool(resolver.is_proxy_enabled()),
        Method::GetProxyServer => Value::String(resolver.proxy_server()),
        Method::GetDetailedProxySettings => serde_json::to_value(resolver.resolve_detailed())?,
        Method::GetProxyForUrl { url } => {
            let url = url.as_deref().unwrap_or_default();
            match resolver.resolve_for_url(url)? {
                Some(endpoint) => serde_json::to_value(endpoint)?,
                None => Value::Null,
            }
        }
    };
    Ok(value)
}
