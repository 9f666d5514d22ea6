//! Web 服务器模块
//!
//! 基于 Axum 的 Web 服务器：所有请求经由 fallback 交给路由分发器，
//! 分发结束后由 [`final_handler::finish`](crate::final_handler::finish) 收尾。

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    response::{IntoResponse, Response as AxumResponse},
};
use chimera_core::constants::{
    SERVER_ENABLE_REQUEST_LOGGING, SERVER_HOST, SERVER_MAX_BODY_SIZE, SERVER_PORT,
    SERVER_REQUEST_TIMEOUT,
};
use chimera_core::Environment;
use chimera_router::{Dispatcher, Request, Response};
use http::{Extensions, HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::{WebError, WebResult};
use crate::final_handler;
use crate::middleware::request_logging;

/// Web 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProperties {
    /// 服务器监听地址
    pub host: String,

    /// 服务器监听端口
    pub port: u16,

    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 请求体大小上限（字节）
    pub max_body_size: usize,

    /// 是否启用请求日志
    pub enable_request_logging: bool,
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: 30,
            max_body_size: 2 * 1024 * 1024,
            enable_request_logging: true,
        }
    }
}

impl ServerProperties {
    /// 从 Environment 加载配置
    pub fn from_environment(env: &Environment) -> Self {
        let defaults = Self::default();
        Self {
            host: env.get_string(SERVER_HOST).unwrap_or(defaults.host),
            port: env
                .get_i64(SERVER_PORT)
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(defaults.port),
            request_timeout: env
                .get_i64(SERVER_REQUEST_TIMEOUT)
                .and_then(|t| u64::try_from(t).ok())
                .unwrap_or(defaults.request_timeout),
            max_body_size: env
                .get_i64(SERVER_MAX_BODY_SIZE)
                .and_then(|s| usize::try_from(s).ok())
                .unwrap_or(defaults.max_body_size),
            enable_request_logging: env
                .get_bool(SERVER_ENABLE_REQUEST_LOGGING)
                .unwrap_or(defaults.enable_request_logging),
        }
    }

    /// 获取服务器地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// Chimera Web 服务器
pub struct ChimeraWebServer {
    config: ServerProperties,
    dispatcher: Arc<Dispatcher>,
}

impl ChimeraWebServer {
    pub fn new(config: ServerProperties, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn from_environment(env: &Environment, dispatcher: Dispatcher) -> Self {
        Self::new(ServerProperties::from_environment(env), dispatcher)
    }

    pub fn config(&self) -> &ServerProperties {
        &self.config
    }

    /// 转换为 axum 路由，便于嵌入已有应用或在测试中直接调用
    pub fn into_router(self) -> axum::Router {
        let state = AppState {
            dispatcher: self.dispatcher,
        };

        let mut app = axum::Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.config.max_body_size));

        if self.config.enable_request_logging {
            app = app.layer(axum::middleware::from_fn(request_logging));
        }

        app.layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout)))
            .layer(TraceLayer::new_for_http())
    }

    /// 启动服务器，收到 Ctrl+C 后优雅退出
    pub async fn run(self) -> WebResult<()> {
        let addr = self.config.address();
        let app = self.into_router();

        tracing::info!("Starting Chimera Web Server on {}", addr);

        let listener = TcpListener::bind(&addr).await.map_err(|source| WebError::Bind {
            addr: addr.clone(),
            source,
        })?;

        tracing::info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
            })
            .await
            .map_err(WebError::Serve)?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

/// axum fallback：把请求交给路由分发器
///
/// 请求体超过上限时返回 413，读取失败（如连接中断）返回 400。
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    extensions: Extensions,
    body: Result<Bytes, BytesRejection>,
) -> AxumResponse {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(
                status = %rejection.status().as_u16(),
                error = %rejection.body_text(),
                "Failed to read request body"
            );
            return rejection.into_response();
        }
    };

    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut req = Request::new(method, url).with_headers(headers).with_body(body);
    req.extensions = extensions;
    let mut res = Response::new();

    let result = state.dispatcher.handle(&mut req, &mut res).await;
    let res = final_handler::finish(result, &req, res);

    let (status, headers, body) = res.into_parts();
    let mut response = AxumResponse::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
