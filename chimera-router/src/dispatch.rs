//! 分发引擎
//!
//! [`Dispatcher`] 持有冻结后的路由树：所有 Router 与 Route 存放在两个数组中，
//! 层之间通过 [`RouterId`] / [`RouteId`] 互相引用。整棵树只读，可被任意多个
//! 并发请求共享。
//!
//! 每次 [`Dispatcher::handle`] 调用在本地维护一个帧栈：
//! - `RouterFrame`：游标、挂载前缀改写记录、OPTIONS 候选方法、参数回调记忆表
//! - `RouteFrame`：游标和规范化后的方法
//!
//! 处理器返回的 [`Outcome`] 作为"下一步"信号交回栈顶帧；帧结束时把结果
//! 交给下层帧，直到根帧结束。整个过程是一个显式循环，没有递归。

use http::{header, Method};
use std::collections::HashMap;

use crate::error::DispatchError;
use crate::handler::{Handler, Outcome, ParamCallback};
use crate::layer::Layer;
use crate::params::Params;
use crate::path::ParamKey;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::router::{Entry, Router, RouterOptions};
use crate::url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(usize);

/// 层的处理目标
#[derive(Debug)]
enum Target {
    Middleware(Handler),
    Route(RouteId),
    Mount(RouterId),
}

#[derive(Debug)]
struct RouterNode {
    options: RouterOptions,
    stack: Vec<Layer<Target>>,
    params: HashMap<String, Vec<ParamCallback>>,
}

/// 分发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 某个处理器完成了响应
    Handled,
    /// 遍历结束，没有处理器完成响应
    Unhandled,
}

/// 冻结后的路由树
#[derive(Debug)]
pub struct Dispatcher {
    routers: Vec<RouterNode>,
    routes: Vec<Route>,
    root: RouterId,
}

impl Dispatcher {
    pub(crate) fn from_router(router: Router) -> Self {
        let mut dispatcher = Self {
            routers: Vec::new(),
            routes: Vec::new(),
            root: RouterId(0),
        };
        dispatcher.root = dispatcher.intern(router);

        tracing::debug!(
            routers = dispatcher.routers.len(),
            routes = dispatcher.routes.len(),
            "Router tree built"
        );
        dispatcher
    }

    /// 子路由先于父路由入栈，根路由最后
    fn intern(&mut self, router: Router) -> RouterId {
        let Router {
            options,
            stack,
            routes,
            params,
        } = router;

        let route_base = self.routes.len();
        self.routes.extend(routes);

        let layers = stack
            .into_iter()
            .map(|layer| {
                layer.map(|entry| match entry {
                    Entry::Middleware(handler) => Target::Middleware(handler),
                    Entry::Route(index) => Target::Route(RouteId(route_base + index)),
                    Entry::Mount(router) => Target::Mount(self.intern(*router)),
                })
            })
            .collect();

        self.routers.push(RouterNode {
            options,
            stack: layers,
            params,
        });
        RouterId(self.routers.len() - 1)
    }

    /// Router 数量（含根路由）
    pub fn routers(&self) -> usize {
        self.routers.len()
    }

    /// Route 数量
    pub fn routes(&self) -> usize {
        self.routes.len()
    }

    fn node(&self, id: RouterId) -> &RouterNode {
        &self.routers[id.0]
    }

    fn route(&self, id: RouteId) -> &Route {
        &self.routes[id.0]
    }

    /// 分发一个请求
    ///
    /// `Ok(Handled)` 表示响应已完成；`Ok(Unhandled)` 表示没有任何处理器完成响应；
    /// `Err` 为遍历结束时仍未被处理的错误。
    pub async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<Disposition, DispatchError> {
        if req.original_url.is_empty() {
            req.original_url = req.url.clone();
        }

        tracing::debug!(method = %req.method, url = %req.url, "Dispatching request");

        let mut frames = vec![Frame::Router(RouterFrame::enter(self.node(self.root), req))];
        let mut signal = Outcome::Continue;

        while let Some(frame) = frames.last_mut() {
            let step = match frame {
                Frame::Router(frame) => self.next_layer(frame, signal, req, res).await,
                Frame::Route(frame) => frame.next(signal, req, res).await,
            };

            match step {
                Step::Next(Outcome::Handled) | Step::Done(Outcome::Handled) => {
                    return Ok(Disposition::Handled);
                }
                Step::Next(outcome) => signal = outcome,
                Step::Push(frame) => {
                    frames.push(frame);
                    signal = Outcome::Continue;
                }
                Step::Done(outcome) => {
                    frames.pop();
                    if frames.is_empty() {
                        return match outcome {
                            Outcome::Fail(err) => Err(err),
                            _ => Ok(Disposition::Unhandled),
                        };
                    }
                    signal = outcome;
                }
            }
        }

        Ok(Disposition::Unhandled)
    }

    /// 从游标处继续寻找下一个匹配的层并调用它
    async fn next_layer<'d>(
        &'d self,
        frame: &mut RouterFrame<'d>,
        signal: Outcome,
        req: &mut Request,
        res: &mut Response,
    ) -> Step<'d> {
        frame.undo_rewrite(req);

        let mut layer_error = match signal {
            Outcome::SkipRouter => {
                tracing::debug!(base_url = %frame.parent_url, "Router skipped");
                return frame.done(None, req, res);
            }
            Outcome::Fail(err) => Some(err),
            _ => None,
        };

        let path = url::pathname(&req.url).to_string();
        let node = frame.node;
        let stack = &node.stack;
        let mut found = None;

        while frame.cursor < stack.len() {
            let layer = &stack[frame.cursor];
            frame.cursor += 1;

            let matched = match layer.matches(&path) {
                Ok(Some(matched)) => matched,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(pattern = layer.pattern(), path = %path, error = %err, "Param decode failed");
                    layer_error.get_or_insert(err);
                    continue;
                }
            };

            if let Target::Route(id) = layer.handler() {
                if layer_error.is_some() {
                    continue;
                }
                let route = self.route(*id);
                let handles = route.handles_method(&req.method);
                if !handles && req.method == Method::OPTIONS {
                    frame.fold_options(route.allowed_methods());
                }
                if !handles && req.method != Method::HEAD {
                    continue;
                }
            }

            found = Some((layer, matched));
            break;
        }

        let Some((layer, matched)) = found else {
            return frame.done(layer_error, req, res);
        };

        tracing::trace!(pattern = layer.pattern(), path = %path, "Layer matched");

        if let Target::Route(id) = layer.handler() {
            req.route_path = Some(self.route(*id).path().to_string());
        }

        req.params = if node.options.merge_params {
            matched.params.merge_into_parent(&frame.parent_params)
        } else {
            matched.params
        };

        match frame.process_params(layer.keys(), req, res).await {
            Outcome::Continue => {}
            Outcome::Handled => return Step::Next(Outcome::Handled),
            stop => return Step::Next(layer_error.map_or(stop, Outcome::Fail)),
        }

        match layer.handler() {
            Target::Route(id) => Step::Push(Frame::Route(RouteFrame::new(self.route(*id), &req.method))),
            target => {
                if !frame.trim_prefix(&matched.path, &path, req) {
                    return Step::Next(layer_error.map_or(Outcome::Continue, Outcome::Fail));
                }
                match (target, layer_error) {
                    (Target::Middleware(handler), Some(err)) => {
                        Step::Next(handler.invoke_error(err, req, res).await)
                    }
                    (Target::Middleware(handler), None) => Step::Next(handler.invoke_request(req, res).await),
                    (_, Some(err)) => Step::Next(Outcome::Fail(err)),
                    (Target::Mount(id), None) => {
                        tracing::trace!(base_url = %req.base_url, url = %req.url, "Entering mounted router");
                        Step::Push(Frame::Router(RouterFrame::enter(self.node(*id), req)))
                    }
                    (Target::Route(_), None) => Step::Next(Outcome::Continue),
                }
            }
        }
    }
}

/// 一次推进的结果
enum Step<'d> {
    /// 把结果作为下一步信号交回当前帧
    Next(Outcome),
    /// 进入新帧
    Push(Frame<'d>),
    /// 当前帧结束，结果交给下层帧
    Done(Outcome),
}

enum Frame<'d> {
    Router(RouterFrame<'d>),
    Route(RouteFrame<'d>),
}

/// 参数回调的记忆项
struct ParamMemo {
    /// 触发回调时捕获到的值
    matched: String,
    /// 回调执行后的值
    value: Option<String>,
    /// 回调中断遍历时的结果
    stop: Option<Outcome>,
}

struct RouterFrame<'d> {
    node: &'d RouterNode,
    cursor: usize,
    protohost: String,
    /// 上一层剥离的前缀
    removed: String,
    slash_added: bool,
    /// 进入时的 base_url
    parent_url: String,
    /// 进入时的参数
    parent_params: Params,
    memo: HashMap<String, ParamMemo>,
    /// OPTIONS 请求的候选方法，按遇到的顺序去重
    options: Vec<Method>,
}

impl<'d> RouterFrame<'d> {
    fn enter(node: &'d RouterNode, req: &Request) -> Self {
        Self {
            node,
            cursor: 0,
            protohost: url::protohost(&req.url).to_string(),
            removed: String::new(),
            slash_added: false,
            parent_url: req.base_url.clone(),
            parent_params: req.params.clone(),
            memo: HashMap::new(),
            options: Vec::new(),
        }
    }

    /// 撤销上一个层对 URL 的改写
    fn undo_rewrite(&mut self, req: &mut Request) {
        if self.slash_added {
            if !req.url.is_empty() {
                req.url.remove(0);
            }
            self.slash_added = false;
        }

        if !self.removed.is_empty() {
            let rest = req.url.get(self.protohost.len()..).unwrap_or_default();
            req.url = format!("{}{}{}", self.protohost, self.removed, rest);
            req.base_url = self.parent_url.clone();
            self.removed.clear();
        }
    }

    /// 剥离匹配到的前缀；前缀后面紧跟的不是 `/`、`.` 或结尾时视为不匹配
    fn trim_prefix(&mut self, layer_path: &str, path: &str, req: &mut Request) -> bool {
        if layer_path.is_empty() {
            return true;
        }
        if !path.starts_with(layer_path) {
            return false;
        }
        if let Some(c) = path[layer_path.len()..].chars().next() {
            if c != '/' && c != '.' {
                return false;
            }
        }

        let rest = req
            .url
            .get(self.protohost.len() + layer_path.len()..)
            .unwrap_or_default();
        req.url = format!("{}{}", self.protohost, rest);

        if self.protohost.is_empty() && !req.url.starts_with('/') {
            req.url.insert(0, '/');
            self.slash_added = true;
        }

        req.base_url = format!(
            "{}{}",
            self.parent_url,
            layer_path.strip_suffix('/').unwrap_or(layer_path)
        );
        self.removed = layer_path.to_string();

        tracing::trace!(removed = %self.removed, url = %req.url, base_url = %req.base_url, "Mount prefix trimmed");
        true
    }

    fn fold_options(&mut self, methods: Vec<Method>) {
        for method in methods {
            if !self.options.contains(&method) {
                self.options.push(method);
            }
        }
    }

    /// 栈遍历结束：OPTIONS 请求在没有错误且有候选方法时自动应答，
    /// 其余情况恢复进入时的 base_url 与参数后交给下层帧
    fn done(&mut self, err: Option<DispatchError>, req: &mut Request, res: &mut Response) -> Step<'d> {
        let mut err = err;

        if err.is_none() && req.method == Method::OPTIONS && !self.options.is_empty() {
            let allow = self
                .options
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(",");
            match res.set_header(header::ALLOW, &allow) {
                Ok(res) => {
                    tracing::debug!(allow = %allow, "Automatic OPTIONS response");
                    res.send(allow);
                    return Step::Done(Outcome::Handled);
                }
                Err(e) => err = Some(e),
            }
        }

        req.base_url = self.parent_url.clone();
        req.params = std::mem::take(&mut self.parent_params);
        Step::Done(err.map_or(Outcome::Continue, Outcome::Fail))
    }

    /// 按参数顺序执行回调
    ///
    /// 同名参数以相同的值再次出现时恢复上次的结果而不重新执行。
    /// 返回 `Continue` 表示所有回调都已通过。
    async fn process_params(&mut self, keys: &[ParamKey], req: &mut Request, res: &mut Response) -> Outcome {
        let node = self.node;
        let callbacks = &node.params;
        if keys.is_empty() || callbacks.is_empty() {
            return Outcome::Continue;
        }

        for key in keys {
            let name = &key.name;
            let Some(chain) = callbacks.get(name) else {
                continue;
            };
            let Some(value) = req.params.get(name).map(str::to_string) else {
                continue;
            };

            if let Some(memo) = self.memo.get(name).filter(|memo| memo.matched == value) {
                match &memo.value {
                    Some(v) => req.params.insert(name.clone(), v.clone()),
                    None => {
                        req.params.remove(name);
                    }
                }
                tracing::trace!(param = %name, value = %value, "Param callback reused");
                match &memo.stop {
                    Some(stop) => return stop.clone(),
                    None => continue,
                }
            }

            let mut memo = ParamMemo {
                matched: value.clone(),
                value: Some(value.clone()),
                stop: None,
            };

            for callback in chain {
                tracing::trace!(param = %name, value = %value, "Running param callback");
                let outcome = callback.invoke(req, res, value.clone()).await;
                memo.value = req.params.get(name).map(str::to_string);

                match outcome {
                    Outcome::Continue => {}
                    Outcome::Handled => return Outcome::Handled,
                    stop => {
                        memo.stop = Some(stop.clone());
                        self.memo.insert(name.clone(), memo);
                        return stop;
                    }
                }
            }

            self.memo.insert(name.clone(), memo);
        }

        Outcome::Continue
    }
}

struct RouteFrame<'d> {
    route: &'d Route,
    method: Method,
    cursor: usize,
}

impl<'d> RouteFrame<'d> {
    fn new(route: &'d Route, method: &Method) -> Self {
        Self {
            route,
            method: route.effective_method(method),
            cursor: 0,
        }
    }

    async fn next(&mut self, signal: Outcome, req: &mut Request, res: &mut Response) -> Step<'d> {
        let err = match signal {
            Outcome::SkipRoute => {
                tracing::debug!(route = %self.route.path(), "Route skipped");
                return Step::Done(Outcome::Continue);
            }
            Outcome::SkipRouter => return Step::Done(Outcome::SkipRouter),
            Outcome::Handled => return Step::Done(Outcome::Handled),
            Outcome::Fail(err) => Some(err),
            Outcome::Continue => None,
        };

        let stack = self.route.stack();
        while self.cursor < stack.len() {
            let layer = &stack[self.cursor];
            self.cursor += 1;
            if !layer.accepts(&self.method) {
                continue;
            }

            let outcome = match err {
                Some(err) => layer.handler.invoke_error(err, req, res).await,
                None => layer.handler.invoke_request(req, res).await,
            };
            return Step::Next(outcome);
        }

        Step::Done(err.map_or(Outcome::Continue, Outcome::Fail))
    }
}
