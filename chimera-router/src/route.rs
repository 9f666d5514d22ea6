//! Route：单一路径下按 HTTP 方法区分的处理器集合

use http::Method;

use crate::error::{RouterError, RouterResult};
use crate::handler::{Handler, IntoHandlers};

/// Route 栈中的一项；`method` 为 `None` 表示匹配所有方法
#[derive(Debug, Clone)]
pub(crate) struct RouteLayer {
    pub method: Option<Method>,
    pub handler: Handler,
}

impl RouteLayer {
    pub fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().map_or(true, |m| m == method)
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    stack: Vec<RouteLayer>,
    /// 按注册顺序记录的显式方法
    methods: Vec<Method>,
    all: bool,
}

macro_rules! verb {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, handlers: impl IntoHandlers) -> RouterResult<&mut Self> {
                self.method(Method::$method, handlers)
            }
        )*
    };
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stack: Vec::new(),
            methods: Vec::new(),
            all: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 为所有方法注册处理器
    pub fn all(&mut self, handlers: impl IntoHandlers) -> RouterResult<&mut Self> {
        self.push(None, handlers)?;
        self.all = true;
        Ok(self)
    }

    /// 为指定方法注册处理器
    pub fn method(&mut self, method: Method, handlers: impl IntoHandlers) -> RouterResult<&mut Self> {
        self.push(Some(method.clone()), handlers)?;
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
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

    fn push(&mut self, method: Option<Method>, handlers: impl IntoHandlers) -> RouterResult<()> {
        let handlers = handlers.into_handlers();
        if handlers.is_empty() {
            let verb = method.as_ref().map_or("all", Method::as_str);
            return Err(RouterError::EmptyHandlers {
                context: format!("Route.{}('{}')", verb.to_lowercase(), self.path),
            });
        }

        tracing::debug!(
            path = %self.path,
            method = method.as_ref().map_or("_all", Method::as_str),
            count = handlers.len(),
            "Route handlers registered"
        );

        self.stack.extend(handlers.into_iter().map(|handler| RouteLayer {
            method: method.clone(),
            handler,
        }));
        Ok(())
    }

    /// 是否能处理该方法；HEAD 在没有显式注册时回退到 GET
    pub fn handles_method(&self, method: &Method) -> bool {
        if self.all {
            return true;
        }
        if *method == Method::HEAD && !self.has_method(&Method::HEAD) {
            return self.has_method(&Method::GET);
        }
        self.has_method(method)
    }

    /// 显式支持的方法，按注册顺序；注册了 GET 而没有 HEAD 时，HEAD 紧随 GET
    pub fn allowed_methods(&self) -> Vec<Method> {
        let implied_head = !self.has_method(&Method::HEAD);
        let mut methods = Vec::with_capacity(self.methods.len() + 1);
        for method in &self.methods {
            methods.push(method.clone());
            if implied_head && *method == Method::GET {
                methods.push(Method::HEAD);
            }
        }
        methods
    }

    pub(crate) fn has_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub(crate) fn stack(&self) -> &[RouteLayer] {
        &self.stack
    }

    /// 分发时实际使用的方法：没有注册 HEAD 时 HEAD 按 GET 处理
    pub(crate) fn effective_method(&self, method: &Method) -> Method {
        if *method == Method::HEAD && !self.has_method(&Method::HEAD) {
            Method::GET
        } else {
            method.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler, Outcome};

    fn ok() -> Handler {
        handler(|_req, _res| Box::pin(async { Outcome::Continue }))
    }

    #[test]
    fn test_handles_method() {
        let mut route = Route::new("/users");
        route.get(ok()).unwrap().post(ok()).unwrap();

        assert!(route.handles_method(&Method::GET));
        assert!(route.handles_method(&Method::HEAD));
        assert!(route.handles_method(&Method::POST));
        assert!(!route.handles_method(&Method::DELETE));
        assert!(!route.handles_method(&Method::OPTIONS));
    }

    #[test]
    fn test_all_handles_everything() {
        let mut route = Route::new("/any");
        route.all(ok()).unwrap();
        assert!(route.handles_method(&Method::PATCH));
        assert!(route.allowed_methods().is_empty());
    }

    #[test]
    fn test_allowed_methods() {
        let mut route = Route::new("/users");
        route.get(ok()).unwrap().post(ok()).unwrap().get(ok()).unwrap();
        assert_eq!(route.allowed_methods(), vec![Method::GET, Method::HEAD, Method::POST]);

        let mut explicit = Route::new("/x");
        explicit.head(ok()).unwrap().get(ok()).unwrap();
        assert_eq!(explicit.allowed_methods(), vec![Method::HEAD, Method::GET]);
    }

    #[test]
    fn test_effective_method() {
        let mut route = Route::new("/");
        route.get(ok()).unwrap();
        assert_eq!(route.effective_method(&Method::HEAD), Method::GET);

        route.head(ok()).unwrap();
        assert_eq!(route.effective_method(&Method::HEAD), Method::HEAD);
    }

    #[test]
    fn test_empty_handlers_rejected() {
        let mut route = Route::new("/users");
        let err = route.get(Vec::<Handler>::new()).unwrap_err();
        assert!(matches!(err, RouterError::EmptyHandlers { .. }));
        assert!(err.to_string().contains("Route.get('/users')"));
    }
}
