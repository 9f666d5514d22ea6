//! 处理器与控制流
//!
//! 处理器只有两种形态，在注册时显式区分：
//! - 普通处理器 `(req, res) -> Outcome`
//! - 错误处理器 `(err, req, res) -> Outcome`
//!
//! 处理器通过返回 [`Outcome`] 告诉引擎下一步做什么，取代了"继续 / 出错 /
//! 跳过 Route / 跳出 Router"四种语义混用同一个回调参数的写法。

use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::Response;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 处理器执行完毕后的去向
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 继续匹配下一层
    Continue,
    /// 进入错误模式：当前栈剩余部分只匹配错误处理器，然后向上传播
    Fail(DispatchError),
    /// 放弃当前 Route，回到所属 Router 继续寻找下一个匹配
    SkipRoute,
    /// 放弃整个当前 Router（含其中正在执行的 Route）
    SkipRouter,
    /// 响应已完成，不再继续分发
    Handled,
}

impl Outcome {
    pub fn fail(err: impl Into<DispatchError>) -> Self {
        Outcome::Fail(err.into())
    }

    /// 把 `Result` 风格的处理器体转换为 Outcome
    pub fn from_result<E: Into<DispatchError>>(result: Result<Outcome, E>) -> Self {
        result.unwrap_or_else(|err| Outcome::Fail(err.into()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Fail(_))
    }
}

type NormalFn =
    dyn for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome> + Send + Sync;

type ErrorFn = dyn for<'a> Fn(DispatchError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
    + Send
    + Sync;

type ParamFn = dyn for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, Outcome>
    + Send
    + Sync;

/// 处理器形态
#[derive(Clone)]
pub enum HandlerKind {
    Normal(Arc<NormalFn>),
    Error(Arc<ErrorFn>),
}

/// 注册到 Router / Route 上的处理器
#[derive(Clone)]
pub struct Handler {
    name: Option<Arc<str>>,
    kind: HandlerKind,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name())
            .field("error_handler", &self.is_error_handler())
            .finish()
    }
}

impl Handler {
    /// 普通处理器
    ///
    /// ```ignore
    /// Handler::normal(|req, res| Box::pin(async move {
    ///     res.send(format!("user {}", req.param("id").unwrap_or_default()));
    ///     Outcome::Handled
    /// }))
    /// ```
    pub fn normal<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            kind: HandlerKind::Normal(Arc::new(f)),
        }
    }

    /// 错误处理器，只在有待处理错误时被调用
    pub fn error<F>(f: F) -> Self
    where
        F: for<'a> Fn(DispatchError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            kind: HandlerKind::Error(Arc::new(f)),
        }
    }

    /// 由实现了 [`Middleware`] 的类型构造
    pub fn from_middleware<M: Middleware + 'static>(middleware: M) -> Self {
        let middleware = Arc::new(middleware);
        let name: Arc<str> = Arc::from(middleware.name());
        let mut handler = Self::normal(move |req, res| {
            let middleware = Arc::clone(&middleware);
            Box::pin(async move { middleware.handle(req, res).await })
        });
        handler.name = Some(name);
        handler
    }

    /// 由实现了 [`ErrorMiddleware`] 的类型构造
    pub fn from_error_middleware<M: ErrorMiddleware + 'static>(middleware: M) -> Self {
        let middleware = Arc::new(middleware);
        let name: Arc<str> = Arc::from(middleware.name());
        let mut handler = Self::error(move |err, req, res| {
            let middleware = Arc::clone(&middleware);
            Box::pin(async move { middleware.handle_error(err, req, res).await })
        });
        handler.name = Some(name);
        handler
    }

    /// 设置名称（用于日志）
    pub fn named(mut self, name: impl AsRef<str>) -> Self {
        self.name = Some(Arc::from(name.as_ref()));
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    pub fn is_error_handler(&self) -> bool {
        matches!(self.kind, HandlerKind::Error(_))
    }

    /// 以请求路径调用；错误处理器在此路径上被跳过
    pub(crate) async fn invoke_request(&self, req: &mut Request, res: &mut Response) -> Outcome {
        match &self.kind {
            HandlerKind::Normal(f) => guard(self.name(), move || f(req, res)).await,
            HandlerKind::Error(_) => Outcome::Continue,
        }
    }

    /// 以错误路径调用；普通处理器在此路径上被跳过，错误原样传下去
    pub(crate) async fn invoke_error(
        &self,
        err: DispatchError,
        req: &mut Request,
        res: &mut Response,
    ) -> Outcome {
        match &self.kind {
            HandlerKind::Error(f) => guard(self.name(), move || f(err, req, res)).await,
            HandlerKind::Normal(_) => Outcome::Fail(err),
        }
    }
}

/// 路径参数预处理回调
///
/// 回调收到当前捕获值，可以改写 `req.params` 中的同名值供后续处理器使用。
#[derive(Clone)]
pub struct ParamCallback(Arc<ParamFn>);

impl fmt::Debug for ParamCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamCallback")
    }
}

impl ParamCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) async fn invoke(&self, req: &mut Request, res: &mut Response, value: String) -> Outcome {
        guard("param callback", move || (self.0)(req, res, value)).await
    }
}

/// 处理器内部的 panic（无论发生在构造 future 时还是 poll 时）一律转换为 `Outcome::Fail`
async fn guard<'a, F>(name: &str, call: F) -> Outcome
where
    F: FnOnce() -> BoxFuture<'a, Outcome>,
{
    let result = match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(panic) => Err(panic),
    };

    match result {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(handler = name, error = %message, "Handler panicked");
            Outcome::Fail(DispatchError::Panicked { message })
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic occurred".to_string()
    }
}

/// 结构体形式的普通中间件
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, req: &mut Request, res: &mut Response) -> Outcome;
}

/// 结构体形式的错误处理中间件
#[async_trait]
pub trait ErrorMiddleware: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle_error(&self, err: DispatchError, req: &mut Request, res: &mut Response) -> Outcome;
}

/// `Handler::normal` 的简写
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    Handler::normal(f)
}

/// `Handler::error` 的简写
pub fn error_handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(DispatchError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
        + Send
        + Sync
        + 'static,
{
    Handler::error(f)
}

/// 可以转换为处理器列表的类型
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<Handler>;
}

impl IntoHandlers for Handler {
    fn into_handlers(self) -> Vec<Handler> {
        vec![self]
    }
}

impl IntoHandlers for Vec<Handler> {
    fn into_handlers(self) -> Vec<Handler> {
        self
    }
}

impl<const N: usize> IntoHandlers for [Handler; N] {
    fn into_handlers(self) -> Vec<Handler> {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    struct Tag;

    #[async_trait]
    impl Middleware for Tag {
        fn name(&self) -> &str {
            "tag"
        }

        async fn handle(&self, req: &mut Request, _res: &mut Response) -> Outcome {
            req.extensions.insert(7u32);
            Outcome::Continue
        }
    }

    #[tokio::test]
    async fn test_error_handler_skipped_on_request_path() {
        let h = error_handler(|_err, _req, res| {
            Box::pin(async move {
                res.send("handled");
                Outcome::Handled
            })
        });
        let mut req = Request::get("/");
        let mut res = Response::new();

        assert!(matches!(h.invoke_request(&mut req, &mut res).await, Outcome::Continue));
        assert!(!res.is_finished());
    }

    #[tokio::test]
    async fn test_normal_handler_passes_error_through() {
        let h = handler(|_req, _res| Box::pin(async { Outcome::Handled }));
        let mut req = Request::get("/");
        let mut res = Response::new();
        let err = DispatchError::status(StatusCode::CONFLICT, "conflict");

        match h.invoke_error(err, &mut req, &mut res).await {
            Outcome::Fail(e) => assert_eq!(e.status_code(), StatusCode::CONFLICT),
            other => panic!("Expected Fail, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_fail() {
        let h = handler(|_req, _res| {
            Box::pin(async {
                if true {
                    panic!("kaboom");
                }
                Outcome::Continue
            })
        });
        let mut req = Request::get("/");
        let mut res = Response::new();

        match h.invoke_request(&mut req, &mut res).await {
            Outcome::Fail(DispatchError::Panicked { message }) => assert_eq!(message, "kaboom"),
            other => panic!("Expected Panicked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_middleware_trait() {
        let h = Handler::from_middleware(Tag);
        assert_eq!(h.name(), "tag");
        assert!(!h.is_error_handler());

        let mut req = Request::get("/");
        let mut res = Response::new();
        h.invoke_request(&mut req, &mut res).await;
        assert_eq!(req.extensions.get::<u32>(), Some(&7));
    }

    #[test]
    fn test_from_result() {
        let ok: Result<Outcome, anyhow::Error> = Ok(Outcome::SkipRoute);
        assert!(matches!(Outcome::from_result(ok), Outcome::SkipRoute));

        let err: Result<Outcome, anyhow::Error> = Err(anyhow::anyhow!("nope"));
        assert!(Outcome::from_result(err).is_error());
    }
}
