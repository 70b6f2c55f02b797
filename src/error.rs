//! # 错误类型
//!
//! - [`ProbeError`]: 探测器边界上的错误，只在解析器内部出现，最终折叠成"全部未启用"
//! - [`ResolveError`]: 唯一会返回给调用方的错误（按 URL 查询时的参数校验）

use thiserror::Error;

/// 探测器查询失败
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 当前探测器没有对应的系统原语（例如环境变量层没有 PAC 概念）
    #[error("operation not supported by the {0} probe")]
    Unsupported(&'static str),

    /// 系统 API 调用或输出解析失败
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 解析器返回给调用方的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{0}")]
    InvalidArgument(String),
}

impl ResolveError {
    /// 对宿主报告的错误码
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }
}
