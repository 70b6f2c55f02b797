//! # WinINet 代理配置解析（Windows）
//!
//! 读取当前用户的 Internet 设置
//! （`HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings`）。
//!
//! ## 支持的值
//! - `ProxyEnable` (DWORD) / `ProxyServer`：`host:port` 或 `http=h:p;https=h:p;socks=h:p`
//! - `ProxyOverride`：`;` 分隔的例外列表，可能包含 `<local>`
//! - `AutoConfigURL`：PAC 地址
//! - `Connections\DefaultConnectionSettings`：二进制块，第 8 字节是连接标志
//!   （0x04 使用 PAC，0x08 自动检测）

use anyhow::Result;
use log::debug;
use url::Url;

use super::{candidates_for_url, network, ProxyProbe};
use crate::error::ProbeError;
use crate::model::{KindFacts, ProxyEndpoint, ProxyKind, RawProxyFacts};

/// 连接标志：使用自动配置脚本
const FLAG_AUTO_PROXY_URL: u8 = 0x04;
/// 连接标志：自动检测设置（WPAD）
const FLAG_AUTO_DETECT: u8 = 0x08;

/// 从注册表读到的原始 Internet 设置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinInetSettings {
    pub proxy_enable: bool,
    pub proxy_server: Option<String>,
    pub proxy_override: Option<String>,
    pub auto_config_url: Option<String>,
    /// `DefaultConnectionSettings` 的标志字节；读不到时为 None
    pub connection_flags: Option<u8>,
}

/// 基于 WinINet 注册表设置的探测器
#[derive(Default)]
pub struct WinInetProbe;

impl WinInetProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ProxyProbe for WinInetProbe {
    fn name(&self) -> &'static str {
        "wininet"
    }

    fn query(&self) -> Result<RawProxyFacts, ProbeError> {
        let settings = read_settings()?;
        let mut facts = facts_from_settings(&settings);
        facts.network = network::detect();
        Ok(facts)
    }

    fn proxies_for_url(&self, url: &Url) -> Result<Vec<ProxyEndpoint>, ProbeError> {
        let settings = read_settings()?;
        Ok(candidates_for_url(&facts_from_settings(&settings), url))
    }
}

#[cfg(windows)]
fn read_settings() -> Result<WinInetSettings> {
    use anyhow::Context;

    const INTERNET_SETTINGS: &str =
        "Software\\Microsoft\\Windows\\CurrentVersion\\Internet Settings";

    let key = windows_registry::CURRENT_USER
        .open(INTERNET_SETTINGS)
        .context("Failed to open Internet Settings registry key")?;

    let non_empty = |name: &str| key.get_string(name).ok().filter(|v| !v.trim().is_empty());

    // 标志字节在第 8 个字节（前面是版本号和计数器）
    let connection_flags = windows_registry::CURRENT_USER
        .open(format!("{}\\Connections", INTERNET_SETTINGS))
        .and_then(|connections| connections.get_value("DefaultConnectionSettings"))
        .ok()
        .and_then(|blob| blob.get(8).copied());

    Ok(WinInetSettings {
        proxy_enable: key.get_u32("ProxyEnable").unwrap_or(0) != 0,
        proxy_server: non_empty("ProxyServer"),
        proxy_override: non_empty("ProxyOverride"),
        auto_config_url: non_empty("AutoConfigURL"),
        connection_flags,
    })
}

#[cfg(not(windows))]
fn read_settings() -> Result<WinInetSettings> {
    anyhow::bail!("WinINet settings are only available on Windows")
}

/// 把注册表设置转换成原始代理事实
pub fn facts_from_settings(settings: &WinInetSettings) -> RawProxyFacts {
    let mut facts = RawProxyFacts::default();

    if let Some(ref server) = settings.proxy_server {
        for (kind, host, port) in parse_proxy_server(server) {
            *facts.kind_mut(kind) = KindFacts {
                enabled: settings.proxy_enable,
                host: Some(host),
                port,
            };
        }
    }

    facts.exclusions = settings.proxy_override.as_deref().map(parse_proxy_override);

    if let Some(ref url) = settings.auto_config_url {
        // 没有标志字节时，存在 PAC 地址就视为启用
        facts.auto_config_enabled = settings
            .connection_flags
            .map_or(true, |flags| flags & FLAG_AUTO_PROXY_URL != 0);
        facts.auto_config_url = Some(url.trim().to_string());
    }
    facts.auto_detect = settings
        .connection_flags
        .map(|flags| flags & FLAG_AUTO_DETECT != 0);

    debug!("WinINet settings: {:?}", facts);
    facts
}

/// 解析 `ProxyServer`
///
/// - `host:port`：同一个代理用于 HTTP / HTTPS / FTP
/// - `http=h:p;https=h:p;ftp=h:p;socks=h:p`：按类型分别指定
pub fn parse_proxy_server(value: &str) -> Vec<(ProxyKind, String, Option<u16>)> {
    let value = value.trim();

    if !value.contains('=') {
        return match split_host_port(value, ProxyKind::Http) {
            Some((host, port)) => [ProxyKind::Http, ProxyKind::Https, ProxyKind::Ftp]
                .into_iter()
                .map(|kind| (kind, host.clone(), port))
                .collect(),
            None => Vec::new(),
        };
    }

    value
        .split(';')
        .filter_map(|entry| {
            let (name, server) = entry.split_once('=')?;
            let kind = match name.trim().to_ascii_lowercase().as_str() {
                "http" => ProxyKind::Http,
                "https" => ProxyKind::Https,
                "ftp" => ProxyKind::Ftp,
                "socks" => ProxyKind::Socks,
                other => {
                    debug!("Ignoring unknown ProxyServer entry: {}", other);
                    return None;
                }
            };
            let (host, port) = split_host_port(server.trim(), kind)?;
            Some((kind, host, port))
        })
        .collect()
}

/// 拆分 `[scheme://]host[:port]`；没写端口时用该类型的默认端口
fn split_host_port(server: &str, kind: ProxyKind) -> Option<(String, Option<u16>)> {
    if server.is_empty() {
        return None;
    }
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{}", server)
    };
    let parsed = Url::parse(&with_scheme).ok()?;

    let host = parsed
        .host_str()?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let default_port = match kind {
        ProxyKind::Socks => 1080,
        _ => 80,
    };
    // 只有写明协议时才采用协议的已知默认端口
    let port = parsed
        .port()
        .or_else(|| {
            server
                .contains("://")
                .then(|| parsed.port_or_known_default())
                .flatten()
        })
        .unwrap_or(default_port);
    Some((host, Some(port)))
}

/// `ProxyOverride` 按 `;` 拆分，保持原始顺序
pub fn parse_proxy_override(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
