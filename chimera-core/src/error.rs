/// 统一的错误处理类型
///
/// 应用层代码使用 anyhow::Result，通过 .context() 方法添加错误上下文信息。
///
/// # 示例
///
/// ```rust,ignore
/// use anyhow::{Context, Result};
///
/// fn load(path: &str) -> Result<Environment> {
///     let source = TomlPropertySource::from_file(path)
///         .with_context(|| format!("Failed to load '{}'", path))?;
///     ...
/// }
/// ```
pub use anyhow::Result;

use std::path::PathBuf;
use thiserror::Error;

/// chimera-core 自身产生的错误
#[derive(Debug, Error)]
pub enum CoreError {
    /// 配置文件读取失败
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置内容解析失败
    #[error("Failed to parse TOML source '{name}': {source}")]
    ConfigParse {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    /// 配置值无法转换为目标类型
    #[error("Invalid value for config '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// 日志系统初始化失败（通常是重复初始化）
    #[error("Logging init failed: {0}")]
    LoggingInitFailed(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
