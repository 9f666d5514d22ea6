//! 框架配置常量定义
//!
//! 定义所有框架使用的配置键名称

// ==================== Router 配置 ====================

/// 路径匹配是否区分大小写
pub const ROUTER_CASE_SENSITIVE: &str = "chimera.router.case-sensitive";

/// 是否严格匹配结尾斜杠
pub const ROUTER_STRICT: &str = "chimera.router.strict";

/// 子路由是否合并父路由的路径参数
pub const ROUTER_MERGE_PARAMS: &str = "chimera.router.merge-params";

// ==================== Server 配置 ====================

/// 服务器监听地址
pub const SERVER_HOST: &str = "server.host";

/// 服务器监听端口
pub const SERVER_PORT: &str = "server.port";

/// 请求超时时间（秒）
pub const SERVER_REQUEST_TIMEOUT: &str = "server.request-timeout";

/// 请求体大小上限（字节）
pub const SERVER_MAX_BODY_SIZE: &str = "server.max-body-size";

/// 是否启用请求日志
pub const SERVER_ENABLE_REQUEST_LOGGING: &str = "server.enable-request-logging";

// ==================== Logging 配置 ====================

/// 日志级别
pub const LOGGING_LEVEL: &str = "logging.level";

/// 日志格式
pub const LOGGING_FORMAT: &str = "logging.format";

/// 自定义过滤器
pub const LOGGING_FILTER: &str = "logging.filter";
