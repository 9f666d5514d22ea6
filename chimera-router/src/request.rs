//! 请求模型
//!
//! 分发引擎会改写 `url` / `base_url` / `params` / `route_path`，
//! 其余字段原样透传给处理器。

use bytes::Bytes;
use http::{header::AsHeaderName, Extensions, HeaderMap, Method};

use crate::params::Params;
use crate::url;

/// 路由视角下的 HTTP 请求
#[derive(Debug)]
pub struct Request {
    /// 请求方法
    pub method: Method,

    /// 当前路由层看到的 URL（挂载点前缀已被剥离）
    pub url: String,

    /// 已被剥离的挂载前缀
    pub base_url: String,

    /// 进入最外层路由时的原始 URL，分发过程中不变
    pub original_url: String,

    /// 当前匹配层捕获的路径参数
    pub params: Params,

    pub headers: HeaderMap,

    pub body: Bytes,

    /// 正在分发的 Route 的路径模式
    pub route_path: Option<String>,

    /// 中间件之间传递的类型化数据
    pub extensions: Extensions,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            method,
            original_url: url.clone(),
            url,
            base_url: String::new(),
            params: Params::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            route_path: None,
            extensions: Extensions::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 当前 URL 的 pathname（不含查询串）
    pub fn path(&self) -> &str {
        url::pathname(&self.url)
    }

    pub fn query(&self) -> Option<&str> {
        url::query(&self.url)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
