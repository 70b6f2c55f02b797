//! # 代理配置数据模型
//!
//! 这个模块定义探测与解析之间流动的所有类型：
//! - [`RawProxyFacts`]: 探测器读到的原始、按操作系统形状组织的数据
//! - [`ProxyConfiguration`]: 摘要视图（只有一个"有效代理"）
//! - [`DetailedProxyConfiguration`]: 按代理类型展开的详细视图
//! - [`ProxyEndpoint`]: 按 URL 查询得到的单个代理目标
//!
//! 所有值每次调用都重新构造，构造后不可变。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

// ========================================
// 代理类型
// ========================================

/// 操作系统能报告的代理类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    Https,
    Socks,
    Ftp,
}

impl ProxyKind {
    /// 详细视图的遍历顺序
    pub const ALL: [ProxyKind; 4] = [
        ProxyKind::Http,
        ProxyKind::Https,
        ProxyKind::Socks,
        ProxyKind::Ftp,
    ];

    /// 摘要视图选择有效代理时的优先级（FTP 不参与）
    pub const PRECEDENCE: [ProxyKind; 3] = [ProxyKind::Http, ProxyKind::Https, ProxyKind::Socks];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks => "socks",
            ProxyKind::Ftp => "ftp",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// 单个代理目标
// ========================================

/// 代理目标使用的协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks,
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyScheme::Http => write!(f, "http"),
            ProxyScheme::Https => write!(f, "https"),
            ProxyScheme::Socks => write!(f, "socks"),
        }
    }
}

/// 一个具体的代理目标
///
/// 只能通过 [`ProxyEndpoint::new`] 构造，保证 host 非空、port 在 1..=65535。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProxyEndpoint {
    scheme: ProxyScheme,
    host: String,
    port: u16,
}

impl ProxyEndpoint {
    /// host 为空或 port 为 0 时返回 None
    pub fn new(scheme: ProxyScheme, host: impl Into<String>, port: u16) -> Option<Self> {
        let host = host.into();
        if host.is_empty() || port == 0 {
            return None;
        }
        Some(Self { scheme, host, port })
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

// ========================================
// 原始探测结果
// ========================================

/// 某一类代理的原始状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindFacts {
    /// 操作系统是否把这一类标记为启用
    pub enabled: bool,
    /// 代理主机（可能为空字符串，也可能缺失）
    pub host: Option<String>,
    /// 代理端口（0 视为"直连"哨兵值）
    pub port: Option<u16>,
}

impl KindFacts {
    pub fn new(enabled: bool, host: impl Into<String>, port: u16) -> Self {
        Self {
            enabled,
            host: Some(host.into()),
            port: Some(port),
        }
    }

    /// 启用且 host 非空、port > 0 时返回 (host, port)
    ///
    /// "host 为空或 port <= 0" 是操作系统的直连哨兵值，按未启用处理。
    pub fn usable(&self) -> Option<(&str, u16)> {
        if !self.enabled {
            return None;
        }
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(port)) if !host.is_empty() && port > 0 => Some((host, port)),
            _ => None,
        }
    }
}

/// 当前活动网络的传输能力
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFlags {
    pub has_internet: bool,
    pub has_wifi: bool,
    pub has_cellular: bool,
}

/// 探测器返回的原始代理事实
///
/// `Default` 就是"全部未启用"的空结果，探测失败时解析器使用它。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProxyFacts {
    pub http: KindFacts,
    pub https: KindFacts,
    pub socks: KindFacts,
    pub ftp: KindFacts,
    /// 绕过列表；None 表示操作系统没有报告
    pub exclusions: Option<Vec<String>>,
    /// WPAD 自动发现；None 表示操作系统没有报告
    pub auto_detect: Option<bool>,
    /// PAC 功能本身是否启用
    pub auto_config_enabled: bool,
    /// PAC 脚本地址（无论 PAC 是否启用）
    pub auto_config_url: Option<String>,
    /// 传输能力，只有不需要额外特权就能拿到时才有
    pub network: Option<NetworkFlags>,
}

impl RawProxyFacts {
    pub fn kind(&self, kind: ProxyKind) -> &KindFacts {
        match kind {
            ProxyKind::Http => &self.http,
            ProxyKind::Https => &self.https,
            ProxyKind::Socks => &self.socks,
            ProxyKind::Ftp => &self.ftp,
        }
    }

    pub fn kind_mut(&mut self, kind: ProxyKind) -> &mut KindFacts {
        match kind {
            ProxyKind::Http => &mut self.http,
            ProxyKind::Https => &mut self.https,
            ProxyKind::Socks => &mut self.socks,
            ProxyKind::Ftp => &mut self.ftp,
        }
    }
}

// ========================================
// 摘要视图
// ========================================

/// 摘要代理配置
///
/// 不变量：`effective_server` 非空当且仅当 `is_enabled` 为 true。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfiguration {
    pub is_enabled: bool,
    /// "host:port"，SOCKS 为 "socks://host:port"；没有代理时为空
    pub effective_server: String,
    /// 序列化时用 ';' 连接，保持原始顺序
    #[serde(serialize_with = "serialize_joined")]
    pub bypass_list: Vec<String>,
    pub auto_detect: bool,
    pub auto_config_url: String,
}

impl ProxyConfiguration {
    /// 绕过列表的序列化形式
    pub fn bypass_list_joined(&self) -> String {
        self.bypass_list.join(";")
    }
}

fn serialize_joined<S: Serializer>(list: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&list.join(";"))
}

// ========================================
// 详细视图
// ========================================

/// 详细视图中单个代理类型的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindRecord {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// 详细代理配置
///
/// `kinds` 是稀疏映射：未启用的类型不出现。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedProxyConfiguration {
    #[serde(flatten)]
    pub kinds: BTreeMap<ProxyKind, KindRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_detect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_config_url: Option<String>,
    #[serde(flatten)]
    pub network: Option<NetworkFlags>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_rejects_degenerate() {
        assert!(ProxyEndpoint::new(ProxyScheme::Http, "", 8080).is_none());
        assert!(ProxyEndpoint::new(ProxyScheme::Http, "proxy", 0).is_none());

        let ep = ProxyEndpoint::new(ProxyScheme::Socks, "s.example.com", 1080).unwrap();
        assert_eq!(ep.to_string(), "socks://s.example.com:1080");
    }

    #[test]
    fn test_kind_facts_usable() {
        assert_eq!(
            KindFacts::new(true, "10.0.0.1", 8080).usable(),
            Some(("10.0.0.1", 8080))
        );
        assert!(KindFacts::new(false, "10.0.0.1", 8080).usable().is_none());
        assert!(KindFacts::new(true, "", 8080).usable().is_none());
        assert!(KindFacts::new(true, "10.0.0.1", 0).usable().is_none());
        assert!(KindFacts {
            enabled: true,
            host: Some("10.0.0.1".to_string()),
            port: None,
        }
        .usable()
        .is_none());
    }

    #[test]
    fn test_summary_serializes_flat() {
        let config = ProxyConfiguration {
            is_enabled: true,
            effective_server: "10.0.0.1:8080".to_string(),
            bypass_list: vec!["localhost".to_string(), "*.internal".to_string()],
            auto_detect: false,
            auto_config_url: String::new(),
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["isEnabled"], true);
        assert_eq!(json["effectiveServer"], "10.0.0.1:8080");
        assert_eq!(json["bypassList"], "localhost;*.internal");
        assert_eq!(json["autoDetect"], false);
        assert_eq!(json["autoConfigUrl"], "");
    }

    #[test]
    fn test_detailed_serializes_sparse() {
        let mut details = DetailedProxyConfiguration::default();
        details.kinds.insert(
            ProxyKind::Ftp,
            KindRecord {
                enabled: true,
                host: Some("ftp.example.com".to_string()),
                port: Some(21),
            },
        );
        details.network = Some(NetworkFlags {
            has_internet: true,
            has_wifi: true,
            has_cellular: false,
        });

        let json = serde_json::to_value(&details).unwrap();
        let map = json.as_object().unwrap();
        assert_eq!(map["ftp"]["host"], "ftp.example.com");
        assert_eq!(map["ftp"]["port"], 21);
        assert!(!map.contains_key("http"));
        assert!(!map.contains_key("bypassList"));
        assert_eq!(map["hasWifi"], true);
        assert_eq!(map["hasCellular"], false);
    }
}
