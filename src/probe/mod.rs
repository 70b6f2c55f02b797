//! # 代理探测模块
//!
//! 这个模块负责从操作系统读取原始代理事实。
//!
//! ## 探测层级
//! 1. 现代层：与当前活动网络绑定的系统代理存储
//!    - macOS: `scutil --proxy`
//!    - Linux: GNOME `gsettings`（需要安装了代理 schema）
//!    - Windows: WinINet 注册表设置
//! 2. 旧式层：进程环境变量，只能猜出一个 HTTP 代理
//!
//! 选用哪一层由 [`Capability::detect`] 在构建解析器时决定一次，
//! 之后解析器只面对 [`ProxyProbe`] trait。

pub mod bypass;
pub mod env;
pub mod gsettings;
pub mod network;
pub mod scutil;
pub mod wininet;

use std::fmt;
use std::iter;
use std::path::Path;

use log::debug;
use url::Url;

use crate::config::Strategy;
use crate::error::ProbeError;
use crate::model::{ProxyEndpoint, ProxyKind, ProxyScheme, RawProxyFacts};

// 重新导出常用类型
pub use env::EnvProbe;
pub use gsettings::GsettingsProbe;
pub use scutil::ScutilProbe;
pub use wininet::WinInetProbe;

// ========================================
// 探测器接口
// ========================================

/// 原始代理事实的来源
pub trait ProxyProbe: Send + Sync {
    /// 探测器名称，用于日志
    fn name(&self) -> &'static str;

    /// 读取当前的原始代理事实
    fn query(&self) -> Result<RawProxyFacts, ProbeError>;

    /// 系统原生的"按 URL 查询代理"，按优先级返回候选代理
    ///
    /// 没有这个原语的探测器返回 [`ProbeError::Unsupported`]。
    fn proxies_for_url(&self, _url: &Url) -> Result<Vec<ProxyEndpoint>, ProbeError> {
        Err(ProbeError::Unsupported(self.name()))
    }
}

// ========================================
// 能力检测
// ========================================

/// 当前系统可用的探测层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// macOS SCDynamicStore（scutil）
    Scutil,
    /// GNOME 桌面设置（gsettings）
    Gsettings,
    /// Windows 当前用户的 WinINet 设置
    WinInet,
    /// 进程环境变量
    Environment,
}

impl Capability {
    /// 检测当前系统可用的最佳层级
    pub fn detect() -> Self {
        Self::select(Self::system_tier(), Capability::is_available)
    }

    /// 在平台的现代层与环境变量层之间做选择
    ///
    /// `available` 判断现代层当前是否真的能用。
    pub fn select<F>(system_tier: Option<Self>, available: F) -> Self
    where
        F: Fn(&Self) -> bool,
    {
        match system_tier {
            Some(tier) if available(&tier) => tier,
            Some(tier) => {
                debug!("{} tier is not available, falling back to environment", tier);
                Capability::Environment
            }
            None => Capability::Environment,
        }
    }

    /// 按配置的策略选择层级
    pub fn for_strategy(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Auto => Self::detect(),
            Strategy::System => Self::system_tier().unwrap_or(Capability::Environment),
            Strategy::Env => Capability::Environment,
        }
    }

    /// 当前平台的现代层（不检查是否真的可用）
    pub fn system_tier() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Capability::Scutil)
        } else if cfg!(target_os = "linux") {
            Some(Capability::Gsettings)
        } else if cfg!(windows) {
            Some(Capability::WinInet)
        } else {
            None
        }
    }

    /// 对应的系统存储是否真的能读
    ///
    /// gsettings 除了可执行文件存在，还要求安装了 `org.gnome.system.proxy` schema。
    pub fn is_available(&self) -> bool {
        match self {
            Capability::Scutil => Path::new(ScutilProbe::DEFAULT_PATH).exists(),
            Capability::Gsettings => {
                find_in_path("gsettings")
                    && gsettings::has_proxy_schema(|| GsettingsProbe::new().list_schemas())
            }
            Capability::WinInet => cfg!(windows),
            Capability::Environment => true,
        }
    }

    /// 构造对应的探测器
    pub fn into_probe(self) -> Box<dyn ProxyProbe> {
        match self {
            Capability::Scutil => Box::new(ScutilProbe::new()),
            Capability::Gsettings => Box::new(GsettingsProbe::new()),
            Capability::WinInet => Box::new(WinInetProbe::new()),
            Capability::Environment => Box::new(EnvProbe::new()),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Scutil => write!(f, "scutil"),
            Capability::Gsettings => write!(f, "gsettings"),
            Capability::WinInet => write!(f, "wininet"),
            Capability::Environment => write!(f, "environment"),
        }
    }
}

/// 在 PATH 中查找可执行文件
fn find_in_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

// ========================================
// 按 URL 选择候选代理
// ========================================

/// 现代层共用的按 URL 查询逻辑
///
/// 1. 主机命中例外列表 → 直连（无候选）
/// 2. 与 URL 协议对应的代理类型（http / https）
/// 3. SOCKS
///
/// 只返回可用的（启用、host 非空、port > 0）代理。
pub fn candidates_for_url(facts: &RawProxyFacts, url: &Url) -> Vec<ProxyEndpoint> {
    let Some(host) = url.host_str() else {
        return Vec::new();
    };

    if let Some(exclusions) = &facts.exclusions {
        if bypass::is_bypassed(host, exclusions) {
            debug!("{} matches the exception list, going direct", host);
            return Vec::new();
        }
    }

    let preferred = match url.scheme() {
        "http" => Some(ProxyKind::Http),
        "https" => Some(ProxyKind::Https),
        _ => None,
    };

    preferred
        .into_iter()
        .chain(iter::once(ProxyKind::Socks))
        .filter_map(|kind| {
            let (host, port) = facts.kind(kind).usable()?;
            ProxyEndpoint::new(scheme_for(kind), host, port)
        })
        .collect()
}

fn scheme_for(kind: ProxyKind) -> ProxyScheme {
    match kind {
        ProxyKind::Https => ProxyScheme::Https,
        ProxyKind::Socks => ProxyScheme::Socks,
        ProxyKind::Http | ProxyKind::Ftp => ProxyScheme::Http,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KindFacts;

    fn facts() -> RawProxyFacts {
        RawProxyFacts {
            http: KindFacts::new(true, "10.0.0.1", 8080),
            https: KindFacts::new(true, "proxy.example.com", 443),
            socks: KindFacts::new(true, "10.0.0.2", 1080),
            exclusions: Some(vec!["localhost".to_string(), "*.internal".to_string()]),
            ..RawProxyFacts::default()
        }
    }

    #[test]
    fn test_candidates_follow_scheme() {
        let url = Url::parse("https://example.com/path").unwrap();
        let found = candidates_for_url(&facts(), &url);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].to_string(), "https://proxy.example.com:443");
        assert_eq!(found[1].to_string(), "socks://10.0.0.2:1080");

        let url = Url::parse("http://example.com/").unwrap();
        let found = candidates_for_url(&facts(), &url);
        assert_eq!(found[0].to_string(), "http://10.0.0.1:8080");
    }

    #[test]
    fn test_candidates_respect_exceptions() {
        let url = Url::parse("http://api.internal/").unwrap();
        assert!(candidates_for_url(&facts(), &url).is_empty());
    }

    #[test]
    fn test_candidates_for_other_schemes_use_socks() {
        let url = Url::parse("ftp://files.example.com/").unwrap();
        let found = candidates_for_url(&facts(), &url);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scheme(), ProxyScheme::Socks);
    }

    #[test]
    fn test_env_strategy_selects_environment() {
        assert_eq!(
            Capability::for_strategy(Strategy::Env),
            Capability::Environment
        );
        assert!(Capability::Environment.is_available());
    }

    #[test]
    fn test_unavailable_system_tier_falls_back() {
        assert_eq!(
            Capability::select(Some(Capability::Gsettings), |_| false),
            Capability::Environment
        );
        assert_eq!(
            Capability::select(Some(Capability::Gsettings), |_| true),
            Capability::Gsettings
        );
        assert_eq!(
            Capability::select(None, |_| true),
            Capability::Environment
        );
    }

    #[test]
    fn test_select_checks_only_the_system_tier() {
        let selected = Capability::select(Some(Capability::Scutil), |tier| {
            assert_eq!(*tier, Capability::Scutil);
            true
        });
        assert_eq!(selected, Capability::Scutil);
    }
}
