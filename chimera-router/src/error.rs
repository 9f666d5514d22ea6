//! 路由错误类型
//!
//! 两类错误严格分开：
//! 1. **注册期错误** [`RouterError`] - 配置错误，注册时立即返回，不可重试
//! 2. **分发期错误** [`DispatchError`] - 经由 `Outcome::Fail` 在处理链中传递，
//!    可被后续的错误处理器恢复，否则交给最外层调用方

use http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// 注册期配置错误
#[derive(Debug, Error)]
pub enum RouterError {
    /// 路径模式无法编译
    #[error("Invalid path pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// 注册时未提供任何处理器
    #[error("{context} requires at least one handler")]
    EmptyHandlers { context: String },

    /// 参数名不合法
    #[error("Invalid param name '{0}'")]
    InvalidParamName(String),
}

pub type RouterResult<T> = Result<T, RouterError>;

/// 分发期错误
///
/// 可廉价克隆：参数回调的记忆表需要在同值命中时重放同一个错误。
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// 路径参数百分号解码失败 - 400
    #[error("Failed to decode param '{value}'")]
    InvalidParam { value: String },

    /// 处理器 panic，在层边界被捕获
    #[error("Handler panicked: {message}")]
    Panicked { message: String },

    /// 处理器指定了 HTTP 状态码的错误
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// 处理器返回的任意错误
    #[error("{0}")]
    Handler(Arc<anyhow::Error>),
}

impl DispatchError {
    /// 带状态码的错误
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        DispatchError::Status {
            status,
            message: message.into(),
        }
    }

    /// 包装任意标准错误
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DispatchError::Handler(Arc::new(anyhow::Error::new(err)))
    }

    /// 错误对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::InvalidParam { .. } => StatusCode::BAD_REQUEST,
            DispatchError::Status { status, .. } => *status,
            DispatchError::Panicked { .. } | DispatchError::Handler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        DispatchError::Handler(Arc::new(err))
    }
}
