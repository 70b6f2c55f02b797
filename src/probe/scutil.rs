//! # scutil 代理配置解析（macOS）
//!
//! 这个模块通过执行 `scutil --proxy` 命令读取 macOS 当前活动网络的代理字典
//! （SCDynamicStore 中的 `State:/Network/Global/Proxies`）。
//!
//! ## 支持的键
//! - HTTP / HTTPS / SOCKS / FTP 代理 (XXXEnable / XXXProxy / XXXPort)
//! - 例外列表 (ExceptionsList)
//! - 自动发现 (ProxyAutoDiscoveryEnable)
//! - PAC 自动配置 (ProxyAutoConfigEnable / ProxyAutoConfigURLString)
//!
//! 只解析顶层字典；`__SCOPED__` 里按接口划分的子字典会被跳过。

use std::process::Command;

use anyhow::{Context, Result};
use log::debug;
use url::Url;

use super::{candidates_for_url, network, ProxyProbe};
use crate::error::ProbeError;
use crate::model::{ProxyEndpoint, ProxyKind, RawProxyFacts};

/// 每种代理类型在字典里对应的 (启用键, 主机键, 端口键)
const KIND_KEYS: [(ProxyKind, &str, &str, &str); 4] = [
    (ProxyKind::Http, "HTTPEnable", "HTTPProxy", "HTTPPort"),
    (ProxyKind::Https, "HTTPSEnable", "HTTPSProxy", "HTTPSPort"),
    (ProxyKind::Socks, "SOCKSEnable", "SOCKSProxy", "SOCKSPort"),
    (ProxyKind::Ftp, "FTPEnable", "FTPProxy", "FTPPort"),
];

/// 基于 `scutil --proxy` 的探测器
pub struct ScutilProbe {
    program: String,
}

impl ScutilProbe {
    pub const DEFAULT_PATH: &'static str = "/usr/sbin/scutil";

    pub fn new() -> Self {
        Self {
            program: Self::DEFAULT_PATH.to_string(),
        }
    }

    /// 执行 scutil --proxy 并返回原始输出
    fn read_output(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--proxy")
            .output()
            .context("Failed to execute scutil --proxy")?;

        if !output.status.success() {
            anyhow::bail!("scutil --proxy failed with status: {}", output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ScutilProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProbe for ScutilProbe {
    fn name(&self) -> &'static str {
        "scutil"
    }

    fn query(&self) -> Result<RawProxyFacts, ProbeError> {
        let output = self.read_output()?;
        let mut facts = parse_scutil_output(&output)?;
        facts.network = network::detect();
        Ok(facts)
    }

    fn proxies_for_url(&self, url: &Url) -> Result<Vec<ProxyEndpoint>, ProbeError> {
        let output = self.read_output()?;
        let facts = parse_scutil_output(&output)?;
        Ok(candidates_for_url(&facts, url))
    }
}

/// 解析 scutil --proxy 的输出
///
/// 输出格式示例：
/// ```text
/// <dictionary> {
///   ExceptionsList : <array> {
///     0 : *.local
///     1 : 169.254/16
///   }
///   HTTPEnable : 1
///   HTTPPort : 7890
///   HTTPProxy : 127.0.0.1
///   ProxyAutoConfigEnable : 0
///   SOCKSEnable : 0
/// }
/// ```
pub fn parse_scutil_output(output: &str) -> Result<RawProxyFacts> {
    if !output.contains("<dictionary>") {
        anyhow::bail!("Unexpected scutil --proxy output: no dictionary");
    }

    let mut facts = RawProxyFacts::default();

    // 当前嵌套深度：1 为顶层字典
    let mut depth = 0usize;
    // 正在收集的顶层数组 (键名, 元素)
    let mut array: Option<(String, Vec<String>)> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // 容器结束
        if line == "}" {
            if depth == 2 {
                if let Some((key, items)) = array.take() {
                    if key == "ExceptionsList" {
                        facts.exclusions = Some(items);
                    }
                }
            }
            depth = depth.saturating_sub(1);
            continue;
        }

        // 容器开始："<dictionary> {" 或 "Key : <array> {"
        if line.ends_with('{') {
            if depth == 1 {
                if let Some((key, value)) = line.split_once(" : ") {
                    if value.starts_with("<array>") {
                        array = Some((key.trim().to_string(), Vec::new()));
                    }
                }
            }
            depth += 1;
            continue;
        }

        let Some((key, value)) = line.split_once(" : ") else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match depth {
            1 => apply_top_level(&mut facts, key, value),
            2 => {
                if let Some((_, items)) = array.as_mut() {
                    items.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    debug!("Parsed scutil proxy dictionary: {:?}", facts);
    Ok(facts)
}

/// 处理顶层字典的一个键值对
fn apply_top_level(facts: &mut RawProxyFacts, key: &str, value: &str) {
    for (kind, enable_key, host_key, port_key) in KIND_KEYS {
        let entry = facts.kind_mut(kind);
        if key == enable_key {
            entry.enabled = value == "1";
            return;
        }
        if key == host_key {
            entry.host = Some(value.to_string());
            return;
        }
        if key == port_key {
            // 端口可能是负数或非法值，这时按缺失处理
            entry.port = value.parse().ok();
            return;
        }
    }

    match key {
        "ProxyAutoDiscoveryEnable" => facts.auto_detect = Some(value == "1"),
        "ProxyAutoConfigEnable" => facts.auto_config_enabled = value == "1",
        "ProxyAutoConfigURLString" => {
            if !value.is_empty() {
                facts.auto_config_url = Some(value.to_string());
            }
        }
        _ => {}
    }
}

// ========================================
// 测试模块
// ========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scutil_output() {
        let output = r#"<dictionary> {
  HTTPEnable : 1
  HTTPPort : 7890
  HTTPProxy : 127.0.0.1
  HTTPSEnable : 1
  HTTPSPort : 7890
  HTTPSProxy : 127.0.0.1
  ProxyAutoConfigEnable : 0
  SOCKSEnable : 0
}"#;

        let facts = parse_scutil_output(output).unwrap();

        assert_eq!(facts.http.usable(), Some(("127.0.0.1", 7890)));
        assert_eq!(facts.https.usable(), Some(("127.0.0.1", 7890)));
        assert!(!facts.socks.enabled);
        assert!(!facts.ftp.enabled);
        assert!(!facts.auto_config_enabled);
        assert!(facts.exclusions.is_none());
    }

    #[test]
    fn test_parse_exceptions_and_pac() {
        let output = r#"<dictionary> {
  ExceptionsList : <array> {
    0 : localhost
    1 : *.internal
    2 : 169.254/16
  }
  ExcludeSimpleHostnames : 0
  FTPEnable : 1
  FTPPort : 2121
  FTPProxy : ftp.example.com
  ProxyAutoConfigEnable : 1
  ProxyAutoConfigURLString : http://wpad.example.com/proxy.pac
  ProxyAutoDiscoveryEnable : 1
}"#;

        let facts = parse_scutil_output(output).unwrap();

        assert_eq!(
            facts.exclusions,
            Some(vec![
                "localhost".to_string(),
                "*.internal".to_string(),
                "169.254/16".to_string(),
            ])
        );
        assert_eq!(facts.ftp.usable(), Some(("ftp.example.com", 2121)));
        assert!(facts.auto_config_enabled);
        assert_eq!(
            facts.auto_config_url.as_deref(),
            Some("http://wpad.example.com/proxy.pac")
        );
        assert_eq!(facts.auto_detect, Some(true));
    }

    #[test]
    fn test_scoped_dictionaries_are_ignored() {
        let output = r#"<dictionary> {
  HTTPEnable : 0
  __SCOPED__ : <dictionary> {
    en0 : <dictionary> {
      ExceptionsList : <array> {
        0 : scoped.example
      }
      HTTPEnable : 1
      HTTPPort : 3128
      HTTPProxy : 10.1.1.1
    }
  }
  SOCKSEnable : 1
  SOCKSPort : 1080
  SOCKSProxy : 10.0.0.2
}"#;

        let facts = parse_scutil_output(output).unwrap();

        assert!(!facts.http.enabled);
        assert!(facts.http.host.is_none());
        assert!(facts.exclusions.is_none());
        assert_eq!(facts.socks.usable(), Some(("10.0.0.2", 1080)));
    }

    #[test]
    fn test_degenerate_port() {
        let output = r#"<dictionary> {
  HTTPEnable : 1
  HTTPPort : 0
  HTTPProxy : 127.0.0.1
}"#;

        let facts = parse_scutil_output(output).unwrap();
        assert!(facts.http.enabled);
        assert!(facts.http.usable().is_none());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_scutil_output("No proxy settings").is_err());
    }
}
