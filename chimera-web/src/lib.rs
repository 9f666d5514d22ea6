//! # Chimera Web
//!
//! 通过 Axum 对外提供 HTTP 服务的路由宿主
//!
//! ## 核心特性
//!
//! - **分发桥接** - 所有请求经由 axum fallback 交给 [`chimera_router::Dispatcher`]
//! - **统一收尾** - 未匹配返回 404，未处理的错误返回 JSON 错误体
//! - **中间件支持** - 请求 ID、请求日志、Tower 的 Trace / Timeout 层

pub mod error;
pub mod final_handler;
pub mod middleware;
pub mod server;

pub use error::{WebError, WebResult};
pub use final_handler::{finish, ErrorResponse};
pub use middleware::{request_id, request_logging, RequestId, REQUEST_ID_HEADER};
pub use server::{ChimeraWebServer, ServerProperties};

pub mod prelude {
    //! 预导入模块

    pub use crate::error::{WebError, WebResult};
    pub use crate::final_handler::ErrorResponse;
    pub use crate::middleware::{request_id, RequestId};
    pub use crate::server::{ChimeraWebServer, ServerProperties};

    pub use chimera_router::prelude::*;
}
