// chimera-router: Chimera 框架的中间件路由与分发引擎
//
// 提供：
// - 路径模式编译（命名参数、可选参数、通配符、内联正则、模式列表）
// - 中间件 / Route / 子 Router 组成的有序栈
// - 显式的控制流结果（继续 / 出错 / 跳过 Route / 跳出 Router / 已完成）
// - 参数预处理回调、mergeParams、自动 OPTIONS 应答
//
// 注册期使用 `Router` 构建，`Router::build()` 冻结为只读的 `Dispatcher`，
// 可被并发请求共享。

pub mod dispatch;
pub mod error;
pub mod handler;
pub mod layer;
pub mod params;
pub mod path;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod url;

// 重新导出常用类型
pub use dispatch::{Dispatcher, Disposition, RouteId, RouterId};
pub use error::{DispatchError, RouterError, RouterResult};
pub use handler::{
    error_handler, handler, BoxFuture, ErrorMiddleware, Handler, HandlerKind, IntoHandlers, Middleware,
    Outcome, ParamCallback,
};
pub use params::Params;
pub use path::{MatchOptions, Matcher, ParamKey, PathMatch, PathPattern};
pub use request::Request;
pub use response::Response;
pub use route::Route;
pub use router::{Router, RouterOptions};

/// Prelude 模块，包含注册路由时常用的类型
pub mod prelude {
    pub use crate::dispatch::{Dispatcher, Disposition};
    pub use crate::error::{DispatchError, RouterError, RouterResult};
    pub use crate::handler::{
        error_handler, handler, ErrorMiddleware, Handler, IntoHandlers, Middleware, Outcome,
    };
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::router::{Router, RouterOptions};
    pub use async_trait::async_trait;
    pub use http::{Method, StatusCode};
}
