//! 最外层的收尾处理
//!
//! 分发结束后：
//! - 已完成的响应原样返回
//! - 没有处理器完成响应 → `404 Cannot <METHOD> <path>`
//! - 未被处理的错误 → 错误状态码 + JSON [`ErrorResponse`]

use chimera_router::url;
use chimera_router::{DispatchError, Disposition, Request, Response};
use http::{header, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// 标准错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>, // 额外错误详情
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown Error").to_string(),
            message: message.into(),
            path: path.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// 错误对应的响应状态码；不在 4xx/5xx 范围内的一律视为 500
fn error_status(err: &DispatchError) -> StatusCode {
    let status = err.status_code();
    if status.is_client_error() || status.is_server_error() {
        status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// 根据分发结果生成最终响应
pub fn finish(result: Result<Disposition, DispatchError>, req: &Request, res: Response) -> Response {
    let path = url::pathname(&req.original_url).to_string();

    match result {
        Ok(Disposition::Handled) => res,
        Ok(Disposition::Unhandled) if res.is_finished() => res,
        Ok(Disposition::Unhandled) => {
            tracing::debug!(method = %req.method, path = %path, "No handler matched");
            let mut res = Response::new();
            res.set_status(StatusCode::NOT_FOUND);
            res.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            res.send(format!("Cannot {} {}", req.method, path));
            res
        }
        Err(err) => {
            let status = error_status(&err);
            if status.is_server_error() {
                tracing::error!(path = %path, status = %status.as_u16(), error = %err, "Unhandled dispatch error");
            } else {
                tracing::warn!(path = %path, status = %status.as_u16(), error = %err, "Unhandled dispatch error");
            }

            if res.is_finished() {
                return res;
            }

            let mut body = ErrorResponse::new(status, err.to_string(), path);
            if let DispatchError::InvalidParam { value } = &err {
                body = body.with_details(serde_json::json!({ "param": value }));
            }
            let mut error_res = Response::new();
            error_res.set_status(status);
            if let Err(e) = error_res.json(&body) {
                tracing::error!(error = %e, "Failed to serialize error response");
                error_res.send(status.to_string());
            }
            error_res
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_unhandled_is_404() {
        let req = Request::new(Method::DELETE, "/missing?x=1");
        let res = finish(Ok(Disposition::Unhandled), &req, Response::new());

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"Cannot DELETE /missing");
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_handled_passes_through() {
        let req = Request::get("/");
        let mut res = Response::new();
        res.set_status(StatusCode::CREATED).send("made");

        let res = finish(Ok(Disposition::Handled), &req, res);
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.body().as_ref(), b"made");
    }

    #[test]
    fn test_error_becomes_json() {
        let req = Request::get("/teapot");
        let err = DispatchError::status(StatusCode::IM_A_TEAPOT, "short and stout");
        let res = finish(Err(err), &req, Response::new());

        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], 418);
        assert_eq!(body["message"], "short and stout");
        assert_eq!(body["path"], "/teapot");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_decode_error_carries_details() {
        let req = Request::get("/user/%zz");
        let err = DispatchError::InvalidParam { value: "%zz".into() };
        let res = finish(Err(err), &req, Response::new());

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["details"]["param"], "%zz");
        assert_eq!(body["error"], "Bad Request");
    }

    #[test]
    fn test_non_error_status_becomes_500() {
        let req = Request::get("/");
        let err = DispatchError::status(StatusCode::OK, "not really an error");
        let res = finish(Err(err), &req, Response::new());
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
