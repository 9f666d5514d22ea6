//! 中间件模块
//!
//! - [`request_id`]：路由中间件，为每个请求分配 `X-Request-ID`
//! - [`request_logging`]：axum 中间件，记录请求耗时与状态码

use axum::{extract::Request, middleware::Next, response::Response};
use chimera_router::{Handler, Outcome};
use http::header::HeaderName;
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 当前请求的 ID，存放在 `Request::extensions` 中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// 请求 ID 中间件
///
/// 沿用客户端传入的 `X-Request-ID`，否则生成一个 UUID v4；
/// 同时写入响应头和请求扩展。
pub fn request_id() -> Handler {
    Handler::normal(|req, res| {
        let id = req
            .header(REQUEST_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let outcome = match res.set_header(HeaderName::from_static(REQUEST_ID_HEADER), &id) {
            Ok(_) => {
                req.extensions.insert(RequestId(id));
                Outcome::Continue
            }
            Err(e) => Outcome::Fail(e),
        };
        Box::pin(async move { outcome })
    })
    .named("request_id")
}

/// 请求日志中间件
pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        elapsed = ?elapsed,
        "Request completed"
    );

    response
}
