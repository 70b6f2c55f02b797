//! # 代理配置解析器
//!
//! 这个模块是核心业务逻辑所在，负责把探测器的原始事实变成稳定的输出：
//! 1. 摘要视图：按固定优先级选出唯一的有效代理
//! 2. 详细视图：按代理类型稀疏地列出所有启用的代理
//! 3. 按 URL 查询：委托给系统原生查询，返回第一个候选
//!
//! ## 有效代理优先级
//! 1. HTTP
//! 2. HTTPS
//! 3. SOCKS（加 `socks://` 前缀）
//!
//! FTP 只出现在详细视图中。
//!
//! ## 失败语义
//! 探测失败一律折叠成"全部未启用"，调用方无法区分"没有代理"与"读取失败"。
//! 唯一会返回错误的是按 URL 查询时的参数校验。

use log::{debug, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{ProbeError, ResolveError};
use crate::model::{
    DetailedProxyConfiguration, KindRecord, ProxyConfiguration, ProxyEndpoint, ProxyKind,
    RawProxyFacts,
};
use crate::probe::{Capability, ProxyProbe};

/// 代理配置解析器
///
/// 不持有任何跨调用的状态，每次调用都重新读取操作系统。
pub struct ProxyResolver {
    probe: Box<dyn ProxyProbe>,
}

impl ProxyResolver {
    /// 使用指定的探测器
    pub fn new(probe: Box<dyn ProxyProbe>) -> Self {
        Self { probe }
    }

    /// 按配置检测一次能力并选定探测器
    pub fn from_config(config: &ResolverConfig) -> Self {
        let capability = Capability::for_strategy(config.strategy);
        debug!(
            "Strategy {} selected the {} probe",
            config.strategy, capability
        );
        Self::new(capability.into_probe())
    }

    /// 自动检测探测器
    pub fn detect() -> Self {
        Self::from_config(&ResolverConfig::default())
    }

    /// 当前使用的探测器名称
    pub fn probe_name(&self) -> &'static str {
        self.probe.name()
    }

    /// 读取原始事实；探测失败在这里折叠成空结果
    fn facts(&self) -> RawProxyFacts {
        match self.probe.query() {
            Ok(facts) => facts,
            Err(e) => {
                warn!(
                    "{} probe failed, reporting no proxy: {:#}",
                    self.probe.name(),
                    e
                );
                RawProxyFacts::default()
            }
        }
    }

    /// 摘要视图
    pub fn resolve(&self) -> ProxyConfiguration {
        summarize(&self.facts())
    }

    /// 详细视图
    pub fn resolve_detailed(&self) -> DetailedProxyConfiguration {
        detail(&self.facts())
    }

    /// 是否有任何代理生效
    pub fn is_proxy_enabled(&self) -> bool {
        self.resolve().is_enabled
    }

    /// 有效代理字符串（可能为空）
    pub fn proxy_server(&self) -> String {
        self.resolve().effective_server
    }

    /// 查询某个 URL 会使用的代理
    ///
    /// - URL 为空、无法解析或没有主机：返回 `InvalidArgument`
    /// - 探测器不支持或查询失败：返回 `Ok(None)`
    pub fn resolve_for_url(&self, url: &str) -> Result<Option<ProxyEndpoint>, ResolveError> {
        let url = parse_target_url(url)?;

        match self.probe.proxies_for_url(&url) {
            Ok(candidates) => Ok(candidates.into_iter().next()),
            Err(ProbeError::Unsupported(name)) => {
                debug!("{} probe has no per-URL lookup", name);
                Ok(None)
            }
            Err(e) => {
                warn!("Per-URL lookup failed for {}: {:#}", url, e);
                Ok(None)
            }
        }
    }
}

/// 校验按 URL 查询的输入
fn parse_target_url(url: &str) -> Result<Url, ResolveError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ResolveError::InvalidArgument("URL is required".to_string()));
    }

    let parsed = Url::parse(url)
        .map_err(|e| ResolveError::InvalidArgument(format!("invalid URL '{}': {}", url, e)))?;

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ResolveError::InvalidArgument(format!(
            "invalid URL '{}': missing host",
            url
        )));
    }

    Ok(parsed)
}

/// 从原始事实计算摘要视图
pub fn summarize(facts: &RawProxyFacts) -> ProxyConfiguration {
    let effective_server = ProxyKind::PRECEDENCE
        .iter()
        .find_map(|&kind| {
            let (host, port) = facts.kind(kind).usable()?;
            debug!("Effective proxy chosen from {}", kind);
            Some(match kind {
                ProxyKind::Socks => format!("socks://{}:{}", host, port),
                _ => format!("{}:{}", host, port),
            })
        })
        .unwrap_or_default();

    // PAC 地址只有在 PAC 功能本身启用时才算数
    let auto_config_url = if facts.auto_config_enabled {
        facts.auto_config_url.clone().unwrap_or_default()
    } else {
        String::new()
    };

    ProxyConfiguration {
        is_enabled: !effective_server.is_empty(),
        effective_server,
        bypass_list: facts.exclusions.clone().unwrap_or_default(),
        auto_detect: facts.auto_detect.unwrap_or(false),
        auto_config_url,
    }
}

/// 从原始事实计算详细视图
pub fn detail(facts: &RawProxyFacts) -> DetailedProxyConfiguration {
    let kinds = ProxyKind::ALL
        .iter()
        .filter(|&&kind| facts.kind(kind).enabled)
        .map(|&kind| {
            let raw = facts.kind(kind);
            let record = KindRecord {
                enabled: true,
                host: raw.host.clone(),
                port: raw.port,
            };
            (kind, record)
        })
        .collect();

    DetailedProxyConfiguration {
        kinds,
        bypass_list: facts.exclusions.clone(),
        auto_detect: facts.auto_detect,
        auto_config_url: facts.auto_config_url.clone(),
        network: facts.network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KindFacts;

    #[test]
    fn test_summarize_empty() {
        let config = summarize(&RawProxyFacts::default());
        assert_eq!(config, ProxyConfiguration::default());
        assert!(!config.is_enabled);
        assert!(config.effective_server.is_empty());
    }

    #[test]
    fn test_pac_url_requires_auto_config_enabled() {
        let mut facts = RawProxyFacts {
            auto_config_url: Some("http://wpad/proxy.pac".to_string()),
            ..RawProxyFacts::default()
        };
        assert_eq!(summarize(&facts).auto_config_url, "");
        assert_eq!(
            detail(&facts).auto_config_url.as_deref(),
            Some("http://wpad/proxy.pac")
        );

        facts.auto_config_enabled = true;
        assert_eq!(summarize(&facts).auto_config_url, "http://wpad/proxy.pac");
        assert!(!summarize(&facts).is_enabled);
    }

    #[test]
    fn test_ftp_never_effective() {
        let facts = RawProxyFacts {
            ftp: KindFacts::new(true, "ftp.example.com", 21),
            ..RawProxyFacts::default()
        };
        let config = summarize(&facts);
        assert!(!config.is_enabled);
        assert!(detail(&facts).kinds.contains_key(&ProxyKind::Ftp));
    }

    #[test]
    fn test_parse_target_url() {
        assert_eq!(
            parse_target_url(""),
            Err(ResolveError::InvalidArgument("URL is required".to_string()))
        );
        assert!(parse_target_url("not a url").is_err());
        assert!(parse_target_url("mailto:someone@example.com").is_err());
        assert!(parse_target_url("https://example.com").is_ok());
    }
}
