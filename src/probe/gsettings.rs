//! # GNOME 代理配置解析（Linux）
//!
//! 通过 `gsettings get org.gnome.system.proxy ...` 读取桌面会话的代理设置。
//!
//! ## 键映射
//! - `mode`: none / manual / auto
//! - `org.gnome.system.proxy.{http,https,socks,ftp}` 的 `host` / `port`
//! - `ignore-hosts`: 例外列表
//! - `autoconfig-url`: PAC 地址（mode 为 auto 时生效）
//!
//! mode 为 auto 且没有 PAC 地址时，GNOME 使用 WPAD 自动发现。
//!
//! 非 GNOME 或无桌面的系统上可能有 gsettings 但没有代理 schema，
//! 这时 [`has_proxy_schema`] 返回 false，能力检测退回环境变量层。

use std::process::Command;

use anyhow::{Context, Result};
use log::debug;
use url::Url;

use super::{candidates_for_url, network, ProxyProbe};
use crate::error::ProbeError;
use crate::model::{KindFacts, ProxyEndpoint, ProxyKind, RawProxyFacts};

const PROXY_SCHEMA: &str = "org.gnome.system.proxy";

/// 基于 gsettings 的探测器
pub struct GsettingsProbe {
    program: String,
}

impl GsettingsProbe {
    pub fn new() -> Self {
        Self {
            program: "gsettings".to_string(),
        }
    }

    /// 执行 `gsettings get <schema> <key>`，返回去掉首尾空白的输出
    fn get(&self, schema: &str, key: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["get", schema, key])
            .output()
            .with_context(|| format!("Failed to execute gsettings get {} {}", schema, key))?;

        if !output.status.success() {
            anyhow::bail!(
                "gsettings get {} {} failed: {}",
                schema,
                key,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// 执行 `gsettings list-schemas`
    pub fn list_schemas(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("list-schemas")
            .output()
            .context("Failed to execute gsettings list-schemas")?;

        if !output.status.success() {
            anyhow::bail!(
                "gsettings list-schemas failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn read(&self) -> Result<RawProxyFacts> {
        read_facts(|schema, key| self.get(schema, key))
    }
}

impl Default for GsettingsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyProbe for GsettingsProbe {
    fn name(&self) -> &'static str {
        "gsettings"
    }

    fn query(&self) -> Result<RawProxyFacts, ProbeError> {
        let mut facts = self.read()?;
        facts.network = network::detect();
        Ok(facts)
    }

    fn proxies_for_url(&self, url: &Url) -> Result<Vec<ProxyEndpoint>, ProbeError> {
        let facts = self.read()?;
        Ok(candidates_for_url(&facts, url))
    }
}

/// 已安装的 schema 列表里是否有 GNOME 代理 schema
///
/// `list` 返回 `gsettings list-schemas` 的输出，每行一个 schema。
pub fn has_proxy_schema<F>(list: F) -> bool
where
    F: FnOnce() -> Result<String>,
{
    match list() {
        Ok(schemas) => schemas.lines().any(|line| line.trim() == PROXY_SCHEMA),
        Err(e) => {
            debug!("Cannot list gsettings schemas: {:#}", e);
            false
        }
    }
}

/// 用给定的读取函数组装原始代理事实
///
/// `get(schema, key)` 返回 gsettings 打印的 GVariant 文本。
pub fn read_facts<F>(mut get: F) -> Result<RawProxyFacts>
where
    F: FnMut(&str, &str) -> Result<String>,
{
    let mode = parse_gvariant_string(&get(PROXY_SCHEMA, "mode")?);
    debug!("GNOME proxy mode: {}", mode);

    let mut facts = RawProxyFacts {
        exclusions: Some(parse_gvariant_list(&get(PROXY_SCHEMA, "ignore-hosts")?)),
        ..RawProxyFacts::default()
    };

    match mode.as_str() {
        "manual" => {
            for kind in ProxyKind::ALL {
                let schema = format!("{}.{}", PROXY_SCHEMA, kind);
                let host = parse_gvariant_string(&get(&schema, "host")?);
                let port = parse_gvariant_port(&get(&schema, "port")?);
                // GNOME 没有单独的启用开关，手动模式下填了主机就算启用
                *facts.kind_mut(kind) = KindFacts {
                    enabled: !host.is_empty(),
                    host: Some(host),
                    port,
                };
            }
            facts.auto_detect = Some(false);
        }
        "auto" => {
            let pac_url = parse_gvariant_string(&get(PROXY_SCHEMA, "autoconfig-url")?);
            facts.auto_config_enabled = true;
            facts.auto_detect = Some(pac_url.is_empty());
            if !pac_url.is_empty() {
                facts.auto_config_url = Some(pac_url);
            }
        }
        "none" => {
            facts.auto_detect = Some(false);
        }
        other => anyhow::bail!("Unknown GNOME proxy mode: {}", other),
    }

    Ok(facts)
}

/// 解析 GVariant 字符串字面量：`'manual'`、`"it's"`
///
/// 不带引号的输入原样返回。
pub fn parse_gvariant_string(raw: &str) -> String {
    let raw = raw.trim();
    let quoted = raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')));
    if !quoted {
        return raw.to_string();
    }

    let inner = &raw[1..raw.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// 解析 GVariant 字符串数组：`['localhost', '127.0.0.0/8']`、`@as []`
pub fn parse_gvariant_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("@as").unwrap_or(raw).trim();
    let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                ',' => {
                    items.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    items.push(current);

    items
        .iter()
        .map(|item| parse_gvariant_string(item))
        .filter(|item| !item.is_empty())
        .collect()
}

/// 解析端口：`8080` 或带类型前缀的 `int32 8080`
fn parse_gvariant_port(raw: &str) -> Option<u16> {
    raw.split_whitespace().last()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fake_settings(values: &[(&str, &str, &str)]) -> impl FnMut(&str, &str) -> Result<String> {
        let map: HashMap<(String, String), String> = values
            .iter()
            .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
            .collect();
        move |schema: &str, key: &str| {
            Ok(map
                .get(&(schema.to_string(), key.to_string()))
                .cloned()
                .unwrap_or_else(|| match key {
                    "host" => "''".to_string(),
                    "port" => "0".to_string(),
                    _ => "''".to_string(),
                }))
        }
    }

    #[test]
    fn test_has_proxy_schema() {
        let installed = "org.gnome.desktop.interface\norg.gnome.system.proxy\norg.gnome.system.proxy.http\n";
        assert!(has_proxy_schema(|| Ok(installed.to_string())));

        // 只有子 schema 不算
        assert!(!has_proxy_schema(|| Ok(
            "org.gnome.system.proxy.http\n".to_string()
        )));
        assert!(!has_proxy_schema(|| Ok(String::new())));
        assert!(!has_proxy_schema(|| Err(anyhow::anyhow!(
            "No schemas installed"
        ))));
    }

    #[test]
    fn test_parse_gvariant_string() {
        assert_eq!(parse_gvariant_string("'manual'"), "manual");
        assert_eq!(parse_gvariant_string("\"it's\""), "it's");
        assert_eq!(parse_gvariant_string("'a\\'b'"), "a'b");
        assert_eq!(parse_gvariant_string("''"), "");
        assert_eq!(parse_gvariant_string("8080"), "8080");
    }

    #[test]
    fn test_parse_gvariant_list() {
        assert_eq!(
            parse_gvariant_list("['localhost', '127.0.0.0/8', '::1']"),
            vec!["localhost", "127.0.0.0/8", "::1"]
        );
        assert_eq!(parse_gvariant_list("['a,b', \"c'd\"]"), vec!["a,b", "c'd"]);
        assert!(parse_gvariant_list("@as []").is_empty());
        assert!(parse_gvariant_list("garbage").is_empty());
    }

    #[test]
    fn test_parse_gvariant_port() {
        assert_eq!(parse_gvariant_port("8080"), Some(8080));
        assert_eq!(parse_gvariant_port("int32 3128"), Some(3128));
        assert_eq!(parse_gvariant_port("-1"), None);
    }

    #[test]
    fn test_manual_mode() {
        let facts = read_facts(fake_settings(&[
            ("org.gnome.system.proxy", "mode", "'manual'"),
            ("org.gnome.system.proxy", "ignore-hosts", "['localhost', '*.internal']"),
            ("org.gnome.system.proxy.http", "host", "'10.0.0.1'"),
            ("org.gnome.system.proxy.http", "port", "8080"),
            ("org.gnome.system.proxy.socks", "host", "'10.0.0.2'"),
            ("org.gnome.system.proxy.socks", "port", "1080"),
        ]))
        .unwrap();

        assert_eq!(facts.http.usable(), Some(("10.0.0.1", 8080)));
        assert_eq!(facts.socks.usable(), Some(("10.0.0.2", 1080)));
        assert!(!facts.https.enabled);
        assert!(!facts.ftp.enabled);
        assert_eq!(
            facts.exclusions,
            Some(vec!["localhost".to_string(), "*.internal".to_string()])
        );
        assert_eq!(facts.auto_detect, Some(false));
        assert!(!facts.auto_config_enabled);
    }

    #[test]
    fn test_auto_mode_with_pac() {
        let facts = read_facts(fake_settings(&[
            ("org.gnome.system.proxy", "mode", "'auto'"),
            ("org.gnome.system.proxy", "ignore-hosts", "@as []"),
            (
                "org.gnome.system.proxy",
                "autoconfig-url",
                "'http://wpad.example.com/proxy.pac'",
            ),
        ]))
        .unwrap();

        assert!(facts.auto_config_enabled);
        assert_eq!(
            facts.auto_config_url.as_deref(),
            Some("http://wpad.example.com/proxy.pac")
        );
        assert_eq!(facts.auto_detect, Some(false));
        assert!(facts.http.usable().is_none());
    }

    #[test]
    fn test_auto_mode_without_pac_means_wpad() {
        let facts = read_facts(fake_settings(&[
            ("org.gnome.system.proxy", "mode", "'auto'"),
            ("org.gnome.system.proxy", "ignore-hosts", "@as []"),
        ]))
        .unwrap();

        assert_eq!(facts.auto_detect, Some(true));
        assert!(facts.auto_config_url.is_none());
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        let result = read_facts(fake_settings(&[(
            "org.gnome.system.proxy",
            "mode",
            "'bogus'",
        )]));
        assert!(result.is_err());
    }
}
