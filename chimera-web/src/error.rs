//! Web 层错误类型

use thiserror::Error;

/// 服务器启动与运行期间的错误
#[derive(Debug, Error)]
pub enum WebError {
    /// 监听地址绑定失败
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务运行失败
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub type WebResult<T> = Result<T, WebError>;
