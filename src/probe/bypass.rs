//! # 绕过列表匹配
//!
//! 判断一个主机名是否命中系统的例外列表。支持的条目形式：
//! - 精确主机名或 IP：`localhost`、`10.0.0.1`
//! - 通配符：`*.local`、`.example.com`、`*internal*`
//! - `<local>`：不含点的简单主机名
//! - CIDR：`127.0.0.0/8`、`::1/128`，以及 macOS 的缩写形式 `169.254/16`

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

/// 主机名是否命中任意例外条目
pub fn is_bypassed(host: &str, entries: &[String]) -> bool {
    let host = normalize_host(host);
    entries
        .iter()
        .any(|entry| matches_entry(&host, entry.trim()))
}

/// 去掉 IPv6 方括号，统一小写
fn normalize_host(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}

fn matches_entry(host: &str, entry: &str) -> bool {
    if entry.is_empty() {
        return false;
    }
    if entry == "*" {
        return true;
    }
    if entry.eq_ignore_ascii_case("<local>") {
        return !host.contains('.') && !host.contains(':');
    }
    if entry.contains('/') {
        return matches_cidr(host, entry);
    }

    let entry = entry.to_ascii_lowercase();

    // "*.example.com" 也匹配 example.com 本身
    if let Some(suffix) = entry.strip_prefix("*.") {
        if !suffix.contains('*') {
            return host == suffix || host.ends_with(&format!(".{}", suffix));
        }
    }
    if let Some(suffix) = entry.strip_prefix('.') {
        return host == suffix || host.ends_with(&entry);
    }
    if entry.contains('*') {
        return wildcard_match(&entry, host);
    }

    host == entry
}

/// 只支持 '*' 的通配符匹配
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = text;

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }

    // 模式以 '*' 结尾时剩余部分任意
    pattern.ends_with('*') || rest.is_empty()
}

fn matches_cidr(host: &str, entry: &str) -> bool {
    let Ok(addr) = host.parse::<IpAddr>() else {
        return false;
    };
    parse_cidr(entry).map_or(false, |net| net.contains(&addr))
}

/// 解析 CIDR 条目，先把 "169.254/16" 这类缩写补全成 "169.254.0.0/16"
fn parse_cidr(entry: &str) -> Option<IpNet> {
    let (network, prefix) = entry.split_once('/')?;
    let network = expand_ipv4(network.trim())?;
    IpNet::from_str(&format!("{}/{}", network, prefix.trim())).ok()
}

/// 补全缩写的 IPv4 网络地址；IPv6 与完整地址原样返回
fn expand_ipv4(network: &str) -> Option<String> {
    if network.contains(':') {
        return Some(network.to_string());
    }

    let mut octets: Vec<&str> = network.split('.').collect();
    if octets.len() > 4 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
        return None;
    }
    octets.resize(4, "0");
    Some(octets.join("."))
}
