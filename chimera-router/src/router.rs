//! Router 注册接口
//!
//! `Router` 是注册期的构建器：中间件、Route、子 Router 和参数回调按注册顺序
//! 进入栈中。调用 [`Router::build`] 后整棵树被冻结为 [`Dispatcher`]，之后只读。

use chimera_core::constants::{ROUTER_CASE_SENSITIVE, ROUTER_MERGE_PARAMS, ROUTER_STRICT};
use chimera_core::Environment;
use http::Method;
use std::collections::HashMap;

use crate::dispatch::Dispatcher;
use crate::error::{RouterError, RouterResult};
use crate::handler::{BoxFuture, IntoHandlers, Outcome, ParamCallback};
use crate::handler::Handler;
use crate::layer::Layer;
use crate::path::{MatchOptions, PathPattern};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;

/// Router 选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// 路径匹配区分大小写
    pub case_sensitive: bool,
    /// Route 路径的结尾斜杠不可省略
    pub strict: bool,
    /// 继承父路由已捕获的参数
    pub merge_params: bool,
}

impl RouterOptions {
    /// 从配置读取
    ///
    /// - `chimera.router.case-sensitive`
    /// - `chimera.router.strict`
    /// - `chimera.router.merge-params`
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            case_sensitive: env.get_bool_or(ROUTER_CASE_SENSITIVE, false),
            strict: env.get_bool_or(ROUTER_STRICT, false),
            merge_params: env.get_bool_or(ROUTER_MERGE_PARAMS, false),
        }
    }

    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }

    pub fn merge_params(mut self, value: bool) -> Self {
        self.merge_params = value;
        self
    }

    fn prefix_options(&self) -> MatchOptions {
        MatchOptions {
            sensitive: self.case_sensitive,
            strict: false,
            end: false,
        }
    }

    fn route_options(&self) -> MatchOptions {
        MatchOptions {
            sensitive: self.case_sensitive,
            strict: self.strict,
            end: true,
        }
    }
}

/// 构建期的栈项
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Middleware(Handler),
    /// `Router::routes` 中的下标
    Route(usize),
    Mount(Box<Router>),
}

/// 路由器构建器
#[derive(Debug, Clone, Default)]
pub struct Router {
    pub(crate) options: RouterOptions,
    pub(crate) stack: Vec<Layer<Entry>>,
    pub(crate) routes: Vec<Route>,
    pub(crate) params: HashMap<String, Vec<ParamCallback>>,
}

macro_rules! verb {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $name(
                &mut self,
                path: impl Into<PathPattern>,
                handlers: impl IntoHandlers,
            ) -> RouterResult<&mut Self> {
                self.method(Method::$method, path, handlers)
            }
        )*
    };
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn router_options(&self) -> RouterOptions {
        self.options
    }

    /// 在路径前缀下注册中间件，每个处理器各占一层
    pub fn middleware(
        &mut self,
        path: impl Into<PathPattern>,
        handlers: impl IntoHandlers,
    ) -> RouterResult<&mut Self> {
        let pattern = path.into();
        let handlers = handlers.into_handlers();
        if handlers.is_empty() {
            return Err(RouterError::EmptyHandlers {
                context: format!("Router.middleware('{}')", pattern),
            });
        }

        for handler in handlers {
            tracing::debug!(path = %pattern, handler = handler.name(), "Middleware registered");
            let layer = Layer::new(&pattern, self.options.prefix_options(), Entry::Middleware(handler))?;
            self.stack.push(layer);
        }
        Ok(self)
    }

    /// 在根路径下注册中间件
    pub fn middleware_fn(&mut self, handlers: impl IntoHandlers) -> RouterResult<&mut Self> {
        self.middleware("/", handlers)
    }

    /// 把子路由挂载到路径前缀下
    ///
    /// 子路由被移入当前路由；同一个子路由需要挂载多次时先 `clone()`。
    pub fn mount(&mut self, path: impl Into<PathPattern>, router: Router) -> RouterResult<&mut Self> {
        let pattern = path.into();
        tracing::debug!(path = %pattern, layers = router.stack.len(), "Router mounted");
        let layer = Layer::new(&pattern, self.options.prefix_options(), Entry::Mount(Box::new(router)))?;
        self.stack.push(layer);
        Ok(self)
    }

    /// 为路径创建一个新的 Route 并返回它，用于链式注册各方法的处理器
    pub fn route(&mut self, path: impl Into<PathPattern>) -> RouterResult<&mut Route> {
        let pattern = path.into();
        let index = self.routes.len();
        let layer = Layer::new(&pattern, self.options.route_options(), Entry::Route(index))?;

        self.stack.push(layer);
        self.routes.push(Route::new(pattern.to_string()));
        Ok(&mut self.routes[index])
    }

    /// 为任意方法注册 Route 处理器
    pub fn method(
        &mut self,
        method: Method,
        path: impl Into<PathPattern>,
        handlers: impl IntoHandlers,
    ) -> RouterResult<&mut Self> {
        self.route(path)?.method(method, handlers)?;
        Ok(self)
    }

    /// 为所有方法注册 Route 处理器
    pub fn all(&mut self, path: impl Into<PathPattern>, handlers: impl IntoHandlers) -> RouterResult<&mut Self> {
        self.route(path)?.all(handlers)?;
        Ok(self)
    }

    verb! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }

    /// 注册参数预处理回调
    ///
    /// 回调按注册顺序执行，收到当前捕获值。同一次分发中同名参数以相同的值
    /// 再次被捕获时不会重复执行。
    ///
    /// ```ignore
    /// router.param("id", |req, _res, id| Box::pin(async move {
    ///     req.extensions.insert(UserId(id));
    ///     Outcome::Continue
    /// }))?;
    /// ```
    pub fn param<F>(&mut self, name: &str, callback: F) -> RouterResult<&mut Self>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        let name = match name.strip_prefix(':') {
            Some(stripped) => {
                tracing::warn!(name = name, "Leading ':' in param name is ignored, use '{}'", stripped);
                stripped
            }
            None => name,
        };
        if name.is_empty() {
            return Err(RouterError::InvalidParamName(name.to_string()));
        }

        tracing::debug!(name = name, "Param callback registered");
        self.params
            .entry(name.to_string())
            .or_default()
            .push(ParamCallback::new(callback));
        Ok(self)
    }

    /// 冻结为只读的分发器
    pub fn build(self) -> Dispatcher {
        Dispatcher::from_router(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use chimera_core::MapPropertySource;

    fn ok() -> Handler {
        handler(|_req, _res| Box::pin(async { Outcome::Continue }))
    }

    #[test]
    fn test_options_from_environment() {
        let env = Environment::new().with_source(
            MapPropertySource::new("test")
                .with_property(ROUTER_CASE_SENSITIVE, true)
                .with_property(ROUTER_MERGE_PARAMS, "true"),
        );
        let options = RouterOptions::from_environment(&env);
        assert!(options.case_sensitive);
        assert!(!options.strict);
        assert!(options.merge_params);
    }

    #[test]
    fn test_registration_order() {
        let mut router = Router::new();
        router
            .middleware_fn(ok())
            .unwrap()
            .get("/a", ok())
            .unwrap()
            .mount("/b", Router::new())
            .unwrap();

        assert_eq!(router.stack.len(), 3);
        assert!(matches!(router.stack[0].handler(), Entry::Middleware(_)));
        assert!(matches!(router.stack[1].handler(), Entry::Route(0)));
        assert!(matches!(router.stack[2].handler(), Entry::Mount(_)));
    }

    #[test]
    fn test_options_verb_and_options_getter() {
        let options = RouterOptions::default().strict(true);
        let mut router = Router::with_options(options);
        router.options("/users", ok()).unwrap();

        assert!(router.router_options().strict);
        assert_eq!(router.routes[0].allowed_methods(), vec![Method::OPTIONS]);
    }

    #[test]
    fn test_each_handler_gets_a_layer() {
        let mut router = Router::new();
        router.middleware("/api", vec![ok(), ok(), ok()]).unwrap();
        assert_eq!(router.stack.len(), 3);
    }

    #[test]
    fn test_route_chaining() {
        let mut router = Router::new();
        router.route("/users").unwrap().get(ok()).unwrap().post(ok()).unwrap();

        let route = &router.routes[0];
        assert_eq!(route.path(), "/users");
        assert_eq!(route.allowed_methods(), vec![Method::GET, Method::HEAD, Method::POST]);
    }

    #[test]
    fn test_registration_errors() {
        let mut router = Router::new();
        assert!(matches!(
            router.middleware_fn(Vec::<Handler>::new()),
            Err(RouterError::EmptyHandlers { .. })
        ));
        assert!(matches!(
            router.get("/:id(\\d+", ok()),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            router.param("", |_req, _res, _v| Box::pin(async { Outcome::Continue })),
            Err(RouterError::InvalidParamName(_))
        ));
    }

    #[test]
    fn test_param_name_colon_stripped() {
        let mut router = Router::new();
        router
            .param(":id", |_req, _res, _v| Box::pin(async { Outcome::Continue }))
            .unwrap();
        assert!(router.params.contains_key("id"));
    }
}
