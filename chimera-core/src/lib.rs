// chimera-core: Chimera 路由框架的公共基础设施
//
// 提供：
// - 分层配置（TOML 文件 / 环境变量 / 内存）
// - 日志系统初始化（基于 tracing-subscriber）
// - 统一错误类型

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// 重新导出常用类型
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use constants::*;
pub use error::{CoreError, CoreResult, Result};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::config::{
        ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
        TomlPropertySource,
    };
    pub use crate::error::{CoreError, CoreResult, Result};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
