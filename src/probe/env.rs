//! # 环境变量探测（旧式兜底层）
//!
//! 当平台没有可用的系统代理存储时，退回到进程环境变量。
//! 这一层只能给出一个尽力而为的代理猜测（`http_proxy` 写成 `socks5://` 时记为 SOCKS）：
//! - 没有绕过列表
//! - 没有 PAC 地址
//! - 没有自动发现信号
//!
//! 按 URL 查询时会额外参考 `no_proxy`、`<scheme>_proxy` 和 `all_proxy`。

use log::debug;
use url::Url;

use super::ProxyProbe;
use crate::error::ProbeError;
use crate::model::{KindFacts, ProxyEndpoint, ProxyKind, ProxyScheme, RawProxyFacts};

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// 读取环境变量的探测器
pub struct EnvProbe {
    lookup: Lookup,
}

impl EnvProbe {
    /// 读取当前进程的环境变量（每次查询都重新读取）
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// 使用自定义的变量来源（主要用于测试）
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// 先查小写再查大写，忽略空值
    fn var(&self, name: &str) -> Option<String> {
        [name.to_lowercase(), name.to_uppercase()]
            .iter()
            .filter_map(|n| (self.lookup)(n.as_str()))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

impl Default for EnvProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProbe for EnvProbe {
    fn name(&self) -> &'static str {
        "env"
    }

    fn query(&self) -> Result<RawProxyFacts, ProbeError> {
        let mut facts = RawProxyFacts::default();

        if let Some(value) = self.var("http_proxy") {
            match parse_proxy_value(&value) {
                Some(endpoint) => {
                    debug!("http_proxy from environment: {}", endpoint);
                    let kind = match endpoint.scheme() {
                        ProxyScheme::Socks => ProxyKind::Socks,
                        ProxyScheme::Http | ProxyScheme::Https => ProxyKind::Http,
                    };
                    *facts.kind_mut(kind) = KindFacts::new(true, endpoint.host(), endpoint.port());
                }
                None => debug!("Ignoring unparsable http_proxy value: {}", value),
            }
        }

        Ok(facts)
    }

    fn proxies_for_url(&self, url: &Url) -> Result<Vec<ProxyEndpoint>, ProbeError> {
        let host = url.host_str().unwrap_or_default();

        if let Some(no_proxy) = self.var("no_proxy") {
            if no_proxy_matches(host, &no_proxy) {
                debug!("{} is listed in no_proxy", host);
                return Ok(Vec::new());
            }
        }

        let scheme_var = format!("{}_proxy", url.scheme());
        let candidates = [scheme_var.as_str(), "all_proxy"]
            .iter()
            .filter_map(|name| self.var(name))
            .filter_map(|value| parse_proxy_value(&value))
            .collect();

        Ok(candidates)
    }
}

/// 解析 `host:port` 或 `scheme://[user@]host:port[/]` 形式的代理值
///
/// 没写协议时按 HTTP 处理；没写端口时用协议默认端口（SOCKS 为 1080）。
pub fn parse_proxy_value(value: &str) -> Option<ProxyEndpoint> {
    let with_scheme = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{}", value)
    };
    let parsed = Url::parse(&with_scheme).ok()?;

    let scheme = match parsed.scheme() {
        "http" => ProxyScheme::Http,
        "https" => ProxyScheme::Https,
        s if s.starts_with("socks") => ProxyScheme::Socks,
        _ => return None,
    };
    let port = match scheme {
        ProxyScheme::Socks => parsed.port().unwrap_or(1080),
        _ => parsed.port_or_known_default()?,
    };
    let host = parsed
        .host_str()?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    ProxyEndpoint::new(scheme, host, port)
}

/// `no_proxy` 匹配：逗号分隔的后缀列表，`*` 表示全部直连
fn no_proxy_matches(host: &str, no_proxy: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase();

    no_proxy
        .split(',')
        .map(|entry| entry.trim().to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .any(|entry| {
            if entry == "*" {
                return true;
            }
            let suffix = entry.trim_start_matches("*.").trim_start_matches('.');
            host == suffix || host.ends_with(&format!(".{}", suffix))
        })
}
