//! 响应模型
//!
//! 路由本身只在自动 OPTIONS 响应中写入响应，其余情况原样交给处理器。

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::error::DispatchError;

/// 路由视角下的 HTTP 响应
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finished: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// 设置响应头，值不合法时返回错误
    pub fn set_header(&mut self, name: header::HeaderName, value: &str) -> Result<&mut Self, DispatchError> {
        let value = HeaderValue::from_str(value).map_err(DispatchError::new)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 是否已经写完响应
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 发送文本响应；未设置 Content-Type 时默认为 HTML
    pub fn send(&mut self, body: impl Into<String>) -> &mut Self {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
        }
        self.body = Bytes::from(body.into());
        self.finished = true;
        self
    }

    /// 发送 JSON 响应
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, DispatchError> {
        let body = serde_json::to_vec(value).map_err(DispatchError::new)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Bytes::from(body);
        self.finished = true;
        Ok(self)
    }

    /// 结束响应，不修改响应体
    pub fn end(&mut self) -> &mut Self {
        self.finished = true;
        self
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_sets_default_content_type() {
        let mut res = Response::new();
        res.send("hello");
        assert!(res.is_finished());
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(res.body().as_ref(), b"hello");
    }

    #[test]
    fn test_send_keeps_explicit_content_type() {
        let mut res = Response::new();
        res.set_header(header::CONTENT_TYPE, "text/plain").unwrap();
        res.set_status(StatusCode::CREATED).send("ok");
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_json() {
        let mut res = Response::new();
        res.json(&serde_json::json!({ "id": 1 })).unwrap();
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body().as_ref(), br#"{"id":1}"#);
    }

    #[test]
    fn test_invalid_header_value() {
        let mut res = Response::new();
        assert!(res.set_header(header::ALLOW, "GET\n").is_err());
    }
}
