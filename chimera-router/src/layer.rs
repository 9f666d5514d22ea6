//! 路由层：一个路径匹配器绑定一个处理目标
//!
//! 层在注册后不可变。匹配结果作为返回值交给调用方，层本身不记录任何
//! 与某次请求相关的状态，因此同一个层可以被并发请求共享。

use crate::error::{DispatchError, RouterResult};
use crate::path::{MatchOptions, Matcher, ParamKey, PathMatch, PathPattern};

#[derive(Debug, Clone)]
pub struct Layer<H> {
    matcher: Matcher,
    handler: H,
}

impl<H> Layer<H> {
    pub fn new(pattern: &PathPattern, options: MatchOptions, handler: H) -> RouterResult<Self> {
        Ok(Self {
            matcher: Matcher::compile(pattern, options)?,
            handler,
        })
    }

    /// 纯函数匹配，不修改层本身
    pub fn matches(&self, path: &str) -> Result<Option<PathMatch>, DispatchError> {
        self.matcher.matches(path)
    }

    pub fn keys(&self) -> &[ParamKey] {
        self.matcher.keys()
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// 保留匹配器，替换处理目标
    pub fn map<T>(self, f: impl FnOnce(H) -> T) -> Layer<T> {
        Layer {
            matcher: self.matcher,
            handler: f(self.handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_is_pure() {
        let options = MatchOptions {
            end: false,
            ..MatchOptions::default()
        };
        let layer = Layer::new(&"/user/:id".into(), options, "users").unwrap();

        let a = layer.matches("/user/1/posts").unwrap().unwrap();
        let b = layer.matches("/user/2").unwrap().unwrap();

        assert_eq!(a.params.get("id"), Some("1"));
        assert_eq!(a.path, "/user/1");
        assert_eq!(b.params.get("id"), Some("2"));
        assert_eq!(layer.keys().len(), 1);
    }

    #[test]
    fn test_map_keeps_matcher() {
        let layer = Layer::new(&"/a".into(), MatchOptions::default(), 1u8).unwrap();
        let mapped = layer.map(|n| n as u32 + 1);
        assert_eq!(*mapped.handler(), 2);
        assert_eq!(mapped.pattern(), "/a");
        assert!(mapped.matches("/a").unwrap().is_some());
    }
}
