//! # 网络传输能力探测
//!
//! 从默认路由推断当前活动网络的传输能力（有无外网、Wi-Fi、蜂窝）。
//! 只读取不需要特权的信息，任何失败都返回 None，由调用方省略这些字段。
//!
//! ## 平台实现
//! - Linux: `/proc/net/route` + `/sys/class/net/<iface>/wireless`
//! - macOS: `route -n get default` + `networksetup -listallhardwareports`

use std::process::Command;

use anyhow::{Context, Result};
use log::debug;

use crate::model::NetworkFlags;

/// 读取当前平台的网络传输能力
pub fn detect() -> Option<NetworkFlags> {
    #[cfg(target_os = "linux")]
    {
        linux_flags()
    }
    #[cfg(target_os = "macos")]
    {
        macos_flags()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(target_os = "linux")]
fn linux_flags() -> Option<NetworkFlags> {
    let routes = match std::fs::read_to_string("/proc/net/route") {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read /proc/net/route: {}", e);
            return None;
        }
    };

    let iface = parse_proc_net_route(&routes);
    let is_wifi = iface.as_deref().map_or(false, |name| {
        name.starts_with("wl")
            || std::path::Path::new(&format!("/sys/class/net/{}/wireless", name)).exists()
    });

    Some(flags_for_interface(iface.as_deref(), is_wifi))
}

#[cfg(target_os = "macos")]
fn macos_flags() -> Option<NetworkFlags> {
    let iface = match default_route_interface() {
        Ok(iface) => iface,
        Err(e) => {
            debug!("Cannot determine default route: {:#}", e);
            return None;
        }
    };

    let is_wifi = match (&iface, list_hardware_ports()) {
        (Some(name), Ok(ports)) => ports
            .iter()
            .any(|(port, device)| device == name && is_wifi_port(port)),
        _ => false,
    };

    Some(flags_for_interface(iface.as_deref(), is_wifi))
}

/// 根据默认路由接口组装能力标志
pub fn flags_for_interface(iface: Option<&str>, is_wifi: bool) -> NetworkFlags {
    match iface {
        None => NetworkFlags::default(),
        Some(name) => NetworkFlags {
            has_internet: true,
            has_wifi: is_wifi,
            has_cellular: is_cellular_interface(name),
        },
    }
}

/// 蜂窝接口的常见命名
///
/// - Linux: wwan*, rmnet*, ppp*
/// - macOS/iOS: pdp_ip*
pub fn is_cellular_interface(iface: &str) -> bool {
    ["wwan", "rmnet", "ppp", "pdp_ip"]
        .iter()
        .any(|prefix| iface.starts_with(prefix))
}

// ========================================
// Linux: /proc/net/route
// ========================================

/// 解析 `/proc/net/route`，返回度量值最小的默认路由接口
///
/// 格式示例：
/// ```text
/// Iface   Destination Gateway  Flags RefCnt Use Metric Mask     MTU Window IRTT
/// wlan0   00000000    0102A8C0 0003  0      0   600    00000000 0   0      0
/// ```
pub fn parse_proc_net_route(content: &str) -> Option<String> {
    const RTF_UP: u32 = 0x1;

    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 8 {
                return None;
            }
            let flags = u32::from_str_radix(fields[3], 16).ok()?;
            let metric: u32 = fields[6].parse().ok()?;
            let is_default = fields[1] == "00000000" && fields[7] == "00000000";
            (is_default && flags & RTF_UP != 0).then(|| (metric, fields[0].to_string()))
        })
        .min_by_key(|(metric, _)| *metric)
        .map(|(_, iface)| iface)
}

// ========================================
// macOS: route / networksetup
// ========================================

/// 获取默认路由接口名称；没有默认路由时返回 None
pub fn default_route_interface() -> Result<Option<String>> {
    let output = Command::new("/sbin/route")
        .args(["-n", "get", "default"])
        .output()
        .context("Failed to execute route -n get default")?;

    // 即使命令失败也尝试解析（没有默认路由时 route 会报错）
    let output_str = String::from_utf8_lossy(&output.stdout);
    Ok(parse_route_get_output(&output_str))
}

/// 解析 `route -n get default` 的 `interface:` 行
pub fn parse_route_get_output(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("interface:"))
        .map(|iface| iface.trim().to_string())
        .filter(|iface| !iface.is_empty())
}

/// 执行 `networksetup -listallhardwareports`
pub fn list_hardware_ports() -> Result<Vec<(String, String)>> {
    let output = Command::new("networksetup")
        .arg("-listallhardwareports")
        .output()
        .context("Failed to execute networksetup -listallhardwareports")?;

    if !output.status.success() {
        anyhow::bail!("networksetup failed with status: {}", output.status);
    }

    Ok(parse_hardware_ports(&String::from_utf8_lossy(&output.stdout)))
}

/// 解析硬件端口列表，返回 (端口名, 设备名) 对
///
/// 输出格式示例：
/// ```text
/// Hardware Port: Wi-Fi
/// Device: en0
/// Ethernet Address: a4:83:e7:00:00:00
/// ```
pub fn parse_hardware_ports(output: &str) -> Vec<(String, String)> {
    let mut ports = Vec::new();
    let mut current_port: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(port) = line.strip_prefix("Hardware Port:") {
            current_port = Some(port.trim().to_string());
        } else if let Some(device) = line.strip_prefix("Device:") {
            if let Some(port) = current_port.take() {
                ports.push((port, device.trim().to_string()));
            }
        }
    }

    ports
}

/// 旧系统上 Wi-Fi 端口名为 AirPort
pub fn is_wifi_port(port: &str) -> bool {
    port == "Wi-Fi" || port == "AirPort"
}
