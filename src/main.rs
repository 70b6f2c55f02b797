//! # proxy-detector
//!
//! CLI 工具，报告操作系统当前公布的代理配置。
//!
//! ## 功能
//! - 摘要视图：是否启用代理、有效代理、绕过列表、WPAD、PAC
//! - 详细视图：按 HTTP / HTTPS / SOCKS / FTP 列出启用的代理和网络能力
//! - 按 URL 查询会使用的代理
//! - 以宿主方法名调用命令通道（JSON 输入输出）
//!
//! ## 使用
//! ```bash
//! # 摘要
//! proxy-detector settings
//!
//! # 详细视图，JSON 输出
//! proxy-detector detailed --json
//!
//! # 某个 URL 会走哪个代理
//! proxy-detector url https://example.com
//!
//! # 强制使用环境变量层
//! proxy-detector --strategy env settings
//!
//! # 按宿主方法名调用
//! proxy-detector call getProxyForURL --args '{"url": "https://example.com"}'
//! ```

use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use proxy_detector::channel::{self, Method};
use proxy_detector::{ProxyResolver, ResolverConfig, Strategy};

// ========================================
// CLI 参数定义
// ========================================

/// 系统代理配置检测工具
#[derive(Parser)]
#[command(name = "proxy-detector")]
#[command(version = "0.1.0")]
#[command(about = "Report the proxy configuration the operating system currently advertises")]
struct Cli {
    /// 探测层级选择（默认读取 PROXY_DETECTOR_STRATEGY，再默认 auto）
    #[arg(long, value_enum, global = true)]
    strategy: Option<Strategy>,

    /// JSON 格式输出
    #[arg(long, global = true)]
    json: bool,

    /// 显示调试日志
    #[arg(long, global = true)]
    debug: bool,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 支持的子命令
#[derive(Subcommand)]
enum Commands {
    /// 显示摘要代理配置
    Settings,
    /// 是否启用了代理
    Enabled,
    /// 显示有效代理服务器
    Server,
    /// 显示按类型展开的详细配置
    Detailed,
    /// 查询某个 URL 会使用的代理
    Url {
        /// 目标 URL
        url: String,
    },
    /// 按宿主方法名调用命令通道
    Call {
        /// 方法名，如 getProxySettings
        method: String,

        /// JSON 格式的参数
        #[arg(long, value_name = "JSON")]
        args: Option<String>,
    },
}

// ========================================
// 主函数
// ========================================

fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志：--debug 时默认 debug，其余默认 warn，RUST_LOG 优先
    let default_filter = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // 配置优先级: 1. CLI 参数  2. 环境变量  3. auto
    let config = ResolverConfig::from_env().with_override(cli.strategy);
    let resolver = ProxyResolver::from_config(&config);
    log::debug!("Using {} probe", resolver.probe_name());

    // 执行对应的子命令
    let result = match cli.command {
        Commands::Settings => run_settings(&resolver, cli.json),
        Commands::Enabled => run_enabled(&resolver, cli.json),
        Commands::Server => run_server(&resolver, cli.json),
        Commands::Detailed => run_detailed(&resolver, cli.json),
        Commands::Url { url } => run_url(&resolver, &url, cli.json),
        Commands::Call { method, args } => run_call(&resolver, &method, args.as_deref()),
    };

    // 处理错误
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

// ========================================
// 子命令实现
// ========================================

fn run_settings(resolver: &ProxyResolver, json: bool) -> Result<()> {
    let config = resolver.resolve();

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Proxy enabled:   {}", yes_no(config.is_enabled));
    println!("Proxy server:    {}", or_dash(&config.effective_server));
    println!("Bypass list:     {}", or_dash(&config.bypass_list_joined()));
    println!("Auto detect:     {}", yes_no(config.auto_detect));
    println!("Auto config URL: {}", or_dash(&config.auto_config_url));
    Ok(())
}

fn run_enabled(resolver: &ProxyResolver, json: bool) -> Result<()> {
    let enabled = resolver.is_proxy_enabled();
    if json {
        println!("{}", Value::Bool(enabled));
    } else {
        println!("{}", yes_no(enabled));
    }
    Ok(())
}

fn run_server(resolver: &ProxyResolver, json: bool) -> Result<()> {
    let server = resolver.proxy_server();
    if json {
        println!("{}", Value::String(server));
    } else {
        println!("{}", or_dash(&server));
    }
    Ok(())
}

fn run_detailed(resolver: &ProxyResolver, json: bool) -> Result<()> {
    let details = resolver.resolve_detailed();

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    // 1. 打印表头
    println!("{:<8}\t{:<30}\t{:<6}", "KIND", "HOST", "PORT");

    // 2. 打印每个启用的代理类型
    for (kind, record) in &details.kinds {
        println!(
            "{:<8}\t{:<30}\t{:<6}",
            kind,
            record.host.as_deref().unwrap_or("-"),
            record
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    if details.kinds.is_empty() {
        println!("(no proxy kind enabled)");
    }

    println!();
    if let Some(ref list) = details.bypass_list {
        println!("Bypass list:     {}", or_dash(&list.join(";")));
    }
    if let Some(auto_detect) = details.auto_detect {
        println!("Auto detect:     {}", yes_no(auto_detect));
    }
    if let Some(ref url) = details.auto_config_url {
        println!("Auto config URL: {}", url);
    }
    if let Some(network) = details.network {
        println!(
            "Network:         internet={} wifi={} cellular={}",
            yes_no(network.has_internet),
            yes_no(network.has_wifi),
            yes_no(network.has_cellular)
        );
    }
    Ok(())
}

fn run_url(resolver: &ProxyResolver, url: &str, json: bool) -> Result<()> {
    let endpoint = resolver.resolve_for_url(url)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&endpoint)?);
    } else {
        match endpoint {
            Some(endpoint) => println!("Proxy for {} → {}", url, endpoint),
            None => println!("Proxy for {} → DIRECT", url),
        }
    }
    Ok(())
}

/// 宿主分发层：未知方法名在这里回应"未实现"
fn run_call(resolver: &ProxyResolver, name: &str, args: Option<&str>) -> Result<()> {
    let args: Value = match args {
        Some(raw) => serde_json::from_str(raw).context("Failed to parse --args as JSON")?,
        None => Value::Null,
    };

    let Some(method) = Method::parse(name, &args) else {
        anyhow::bail!("method '{}' is not implemented", name);
    };

    let value = channel::handle(resolver, &method)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
