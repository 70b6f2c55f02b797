//! # 解析器配置
//!
//! 配置来源优先级：
//! 1. CLI 参数 `--strategy`
//! 2. 环境变量 `PROXY_DETECTOR_STRATEGY`
//! 3. 默认值 `auto`

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use log::warn;

/// 选择探测层级的环境变量
pub const STRATEGY_ENV: &str = "PROXY_DETECTOR_STRATEGY";

/// 探测层级选择策略
///
/// 同时作为 `--strategy` 的取值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// 自动检测：现代层可用就用，否则退回环境变量
    #[default]
    Auto,
    /// 强制使用平台的现代层
    System,
    /// 强制使用环境变量
    #[value(alias = "environment")]
    Env,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Strategy::Auto),
            "system" => Ok(Strategy::System),
            "env" | "environment" => Ok(Strategy::Env),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Auto => write!(f, "auto"),
            Strategy::System => write!(f, "system"),
            Strategy::Env => write!(f, "env"),
        }
    }
}

/// 构建解析器所需的配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    pub strategy: Strategy,
}

impl ResolverConfig {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    /// 从环境变量读取配置；无法解析的值记录警告后忽略
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从给定的变量来源读取配置
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let strategy = match lookup(STRATEGY_ENV) {
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!("Ignoring {}: {}", STRATEGY_ENV, e);
                Strategy::Auto
            }),
            None => Strategy::Auto,
        };
        Self { strategy }
    }

    /// CLI 参数覆盖环境变量
    pub fn with_override(self, strategy: Option<Strategy>) -> Self {
        match strategy {
            Some(strategy) => Self { strategy },
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("auto".parse::<Strategy>(), Ok(Strategy::Auto));
        assert_eq!("SYSTEM".parse::<Strategy>(), Ok(Strategy::System));
        assert_eq!("environment".parse::<Strategy>(), Ok(Strategy::Env));
        assert!("bogus".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_value_names() {
        assert_eq!(
            <Strategy as ValueEnum>::from_str("env", true),
            Ok(Strategy::Env)
        );
        assert_eq!(
            <Strategy as ValueEnum>::from_str("environment", true),
            Ok(Strategy::Env)
        );
        for strategy in Strategy::value_variants() {
            let name = strategy.to_possible_value().unwrap();
            assert_eq!(name.get_name(), strategy.to_string());
        }
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ResolverConfig::from_lookup(|_| Some("env".to_string()));
        assert_eq!(config.strategy, Strategy::Env);

        let config = ResolverConfig::from_lookup(|_| Some("bogus".to_string()));
        assert_eq!(config.strategy, Strategy::Auto);

        let config = ResolverConfig::from_lookup(|_| None);
        assert_eq!(config.strategy, Strategy::Auto);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = ResolverConfig::from_lookup(|_| Some("env".to_string()))
            .with_override(Some(Strategy::System));
        assert_eq!(config.strategy, Strategy::System);

        let config = ResolverConfig::new(Strategy::Env).with_override(None);
        assert_eq!(config.strategy, Strategy::Env);
    }
}
