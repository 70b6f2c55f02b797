//! # proxy-detector
//!
//! 读取操作系统当前对外公布的代理配置，并整理成稳定的结构。
//!
//! ## 组成
//! - [`probe`]: 从系统读取原始代理事实（scutil / gsettings / WinINet / 环境变量）
//! - [`resolver`]: 优先级与归一化逻辑，输出摘要视图和详细视图
//! - [`channel`]: 供宿主应用按方法名调用的命令面
//!
//! ## 使用
//! ```no_run
//! use proxy_detector::ProxyResolver;
//!
//! let resolver = ProxyResolver::detect();
//! let config = resolver.resolve();
//! if config.is_enabled {
//!     println!("proxy: {}", config.effective_server);
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod model;
pub mod probe;
pub mod resolver;

// 重新导出常用类型
pub use config::{ResolverConfig, Strategy};
pub use error::{ProbeError, ResolveError};
pub use model::{
    DetailedProxyConfiguration, KindFacts, KindRecord, NetworkFlags, ProxyConfiguration,
    ProxyEndpoint, ProxyKind, ProxyScheme, RawProxyFacts,
};
pub use probe::{Capability, ProxyProbe};
pub use resolver::ProxyResolver;
