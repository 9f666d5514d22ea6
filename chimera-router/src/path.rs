//! 路径模式编译与匹配
//!
//! 支持的模式：
//! - 字面路径 `/users`
//! - 命名参数 `/users/:id`，遇到 `/`（以及前缀为 `.` 时的 `.`）停止
//! - 可选参数 `/users/:id?`、内联正则 `/users/:id(\d+)`、延续捕获 `/src/:path*`
//! - 通配符 `*`，贪婪匹配剩余路径（可跨越 `/`），按序号命名
//! - 匿名分组 `(a|b)`，按序号命名
//! - 多个模式组成的列表（任一分支匹配即可，参数表贯穿所有分支）
//! - 预先构建好的正则（分组按序号命名，命名分组保留原名）
//!
//! 编译结果不可变，可被任意多个并发请求共享。匹配是纯函数，
//! 返回一个独立的 [`PathMatch`]。

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::fmt;

use crate::error::{DispatchError, RouterError, RouterResult};
use crate::params::Params;

/// 参数槽位在正则中的分组名前缀
const SLOT_PREFIX: &str = "_k";
/// 非终止匹配的边界分组名前缀
const TAIL_PREFIX: &str = "_t";

/// 编译选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// 区分大小写
    pub sensitive: bool,
    /// 严格模式下结尾斜杠不可省略
    pub strict: bool,
    /// 是否必须匹配到路径末尾；`false` 时作为挂载前缀使用
    pub end: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }
}

/// 路径模式
#[derive(Debug, Clone)]
pub enum PathPattern {
    Text(String),
    List(Vec<PathPattern>),
    Regex(Regex),
}

impl From<&str> for PathPattern {
    fn from(s: &str) -> Self {
        PathPattern::Text(s.to_string())
    }
}

impl From<String> for PathPattern {
    fn from(s: String) -> Self {
        PathPattern::Text(s)
    }
}

impl From<&String> for PathPattern {
    fn from(s: &String) -> Self {
        PathPattern::Text(s.clone())
    }
}

impl From<Regex> for PathPattern {
    fn from(r: Regex) -> Self {
        PathPattern::Regex(r)
    }
}

impl<T: Into<PathPattern>> From<Vec<T>> for PathPattern {
    fn from(list: Vec<T>) -> Self {
        PathPattern::List(list.into_iter().map(Into::into).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathPattern {
    fn from(list: [&str; N]) -> Self {
        PathPattern::List(list.iter().map(|s| PathPattern::from(*s)).collect())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Text(s) => f.write_str(s),
            PathPattern::Regex(r) => write!(f, "/{}/", r.as_str()),
            PathPattern::List(list) => {
                f.write_str("[")?;
                for (i, p) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// 参数描述：名字（命名参数）或序号（匿名捕获），以及是否可选
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamKey {
    pub name: String,
    pub optional: bool,
}

/// 一次成功匹配的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// 被模式消费的路径前缀
    pub path: String,
    /// 已解码的参数
    pub params: Params,
}

#[derive(Debug, Clone)]
enum Strategy {
    /// `/` 作为挂载前缀：匹配一切，不消费任何路径
    AnyPrefix,
    /// `*`：整条路径进入序号 0
    Wildcard,
    Regex {
        regex: Regex,
        /// (分组下标, 参数下标)
        slots: Vec<(usize, usize)>,
        /// 非终止匹配的边界分组下标
        tails: Vec<usize>,
    },
}

/// 编译后的路径匹配器
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    keys: Vec<ParamKey>,
    strategy: Strategy,
}

impl Matcher {
    pub fn compile(pattern: &PathPattern, options: MatchOptions) -> RouterResult<Self> {
        let shown = pattern.to_string();

        if let PathPattern::Text(text) = pattern {
            if text == "*" {
                return Ok(Self {
                    pattern: shown,
                    keys: vec![ParamKey {
                        name: "0".to_string(),
                        optional: false,
                    }],
                    strategy: Strategy::Wildcard,
                });
            }
            if text == "/" && !options.end {
                return Ok(Self {
                    pattern: shown,
                    keys: Vec::new(),
                    strategy: Strategy::AnyPrefix,
                });
            }
        }

        let invalid = |message: String| RouterError::InvalidPattern {
            pattern: shown.clone(),
            message,
        };

        let mut builder = SourceBuilder::default();
        let body = builder.pattern(pattern, options).map_err(&invalid)?;
        let source = match pattern {
            PathPattern::Regex(_) => body,
            _ if options.sensitive => body,
            _ => format!("(?i){}", body),
        };

        let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;

        let mut slots = Vec::new();
        let mut tails = Vec::new();
        for (group, name) in regex.capture_names().enumerate() {
            let Some(name) = name else { continue };
            if let Some(idx) = name.strip_prefix(SLOT_PREFIX).and_then(|n| n.parse().ok()) {
                slots.push((group, idx));
            } else if name.starts_with(TAIL_PREFIX) {
                tails.push(group);
            }
        }

        tracing::trace!(pattern = %shown, source = %source, "Path pattern compiled");

        Ok(Self {
            pattern: shown,
            keys: builder.keys,
            strategy: Strategy::Regex {
                regex,
                slots,
                tails,
            },
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 按捕获顺序排列的参数描述
    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    /// 匹配路径
    ///
    /// 返回 `Ok(None)` 表示不匹配；参数解码失败返回 `Err`，由调用方决定如何传播。
    pub fn matches(&self, path: &str) -> Result<Option<PathMatch>, DispatchError> {
        match &self.strategy {
            Strategy::AnyPrefix => Ok(Some(PathMatch {
                path: String::new(),
                params: Params::new(),
            })),
            Strategy::Wildcard => {
                let mut params = Params::new();
                params.insert("0", decode_param(path)?);
                Ok(Some(PathMatch {
                    path: path.to_string(),
                    params,
                }))
            }
            Strategy::Regex {
                regex,
                slots,
                tails,
            } => {
                let Some(caps) = regex.captures(path) else {
                    return Ok(None);
                };
                let Some(whole) = caps.get(0) else {
                    return Ok(None);
                };

                let end = tails
                    .iter()
                    .find_map(|&t| caps.get(t))
                    .map(|m| m.start())
                    .unwrap_or(whole.end());

                let mut params = Params::new();
                for &(group, key) in slots {
                    if let Some(m) = caps.get(group) {
                        params.insert(self.keys[key].name.clone(), decode_param(m.as_str())?);
                    }
                }

                Ok(Some(PathMatch {
                    path: path[whole.start()..end].to_string(),
                    params,
                }))
            }
        }
    }
}

/// 百分号解码；畸形的转义序列或非法 UTF-8 视为解码失败
pub fn decode_param(value: &str) -> Result<String, DispatchError> {
    if !value.contains('%') {
        return Ok(value.to_string());
    }

    let invalid = || DispatchError::InvalidParam {
        value: value.to_string(),
    };

    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !well_formed {
                return Err(invalid());
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| invalid())
}

/// 正则源码生成器；参数表在列表模式的所有分支之间共享
#[derive(Default)]
struct SourceBuilder {
    keys: Vec<ParamKey>,
    tails: usize,
}

impl SourceBuilder {
    fn slot(&mut self, name: impl Into<String>, optional: bool) -> String {
        let idx = self.keys.len();
        self.keys.push(ParamKey {
            name: name.into(),
            optional,
        });
        format!("(?P<{}{}>", SLOT_PREFIX, idx)
    }

    fn pattern(&mut self, pattern: &PathPattern, options: MatchOptions) -> Result<String, String> {
        match pattern {
            PathPattern::Text(text) => self.text(text, options),
            PathPattern::Regex(regex) => {
                let chars: Vec<char> = regex.as_str().chars().collect();
                let mut ordinal = 0;
                let mut out = String::new();
                let mut i = 0;
                while i < chars.len() {
                    i = self.passthrough(&chars, i, &mut ordinal, &mut out)?;
                }
                Ok(out)
            }
            PathPattern::List(list) => {
                let branches = list
                    .iter()
                    .map(|p| self.pattern(p, options))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("(?:{})", branches.join("|")))
            }
        }
    }

    /// 编译一个文本模式分支，序号从 0 开始
    fn text(&mut self, text: &str, options: MatchOptions) -> Result<String, String> {
        let mut raw = text.to_string();
        if !options.strict {
            raw.push_str(if raw.ends_with('/') { "?" } else { "/?" });
        }

        let chars: Vec<char> = raw.chars().collect();
        let mut ordinal = 0;
        let mut out = String::from("^");
        let mut i = 0;

        while i < chars.len() {
            if let Some(next) = self.key(&chars, i, &mut ordinal, &mut out)? {
                i = next;
                continue;
            }
            match chars[i] {
                '*' => {
                    let slot = self.slot(ordinal.to_string(), false);
                    ordinal += 1;
                    out.push_str(&slot);
                    out.push_str(".*)");
                    i += 1;
                }
                '.' => {
                    out.push_str("\\.");
                    i += 1;
                }
                _ => i = self.passthrough(&chars, i, &mut ordinal, &mut out)?,
            }
        }

        if options.end {
            out.push('$');
        } else if !out.ends_with('/') {
            out.push_str(&format!("(?P<{}{}>/|$)", TAIL_PREFIX, self.tails));
            self.tails += 1;
        }

        Ok(out)
    }

    /// 尝试在 `i` 处解析 `[/][.]:name[(regex)][*][?]`，成功时返回下一个位置
    fn key(
        &mut self,
        chars: &[char],
        i: usize,
        ordinal: &mut usize,
        out: &mut String,
    ) -> Result<Option<usize>, String> {
        let mut j = i;
        let slash = chars.get(j) == Some(&'/');
        if slash {
            j += 1;
        }
        let format = chars.get(j) == Some(&'.');
        if format {
            j += 1;
        }
        if chars.get(j) != Some(&':') {
            return Ok(None);
        }
        j += 1;

        let name_start = j;
        while j < chars.len() && is_word(chars[j]) {
            j += 1;
        }
        if j == name_start {
            return Ok(None);
        }
        let name: String = chars[name_start..j].iter().collect();

        let capture = if chars.get(j) == Some(&'(') {
            let close = matching_paren(chars, j)?;
            let inner = &chars[j + 1..close];
            j = close + 1;
            Some(inner)
        } else {
            None
        };
        let star = chars.get(j) == Some(&'*');
        if star {
            j += 1;
        }
        let optional = chars.get(j) == Some(&'?');
        if optional {
            j += 1;
        }

        let slash_src = if slash { "/" } else { "" };
        let format_src = if format { "\\." } else { "" };
        let stop = if format { "/." } else { "/" };

        if !optional {
            out.push_str(slash_src);
        }
        out.push_str("(?:");
        out.push_str(format_src);
        if optional {
            out.push_str(slash_src);
        }
        out.push_str(&self.slot(name, optional));
        match capture {
            Some(inner) => {
                let mut k = 0;
                while k < inner.len() {
                    k = self.passthrough(inner, k, ordinal, out)?;
                }
            }
            None => {
                out.push_str(&format!("[^{}]+?", stop));
            }
        }
        out.push(')');
        if star {
            let slot = self.slot(ordinal.to_string(), false);
            *ordinal += 1;
            out.push_str(&slot);
            out.push_str(&format!("(?:[{}].+?)?)", stop));
        }
        out.push(')');
        if optional {
            out.push('?');
        }

        Ok(Some(j))
    }

    /// 原样拷贝一个正则单元，把捕获分组改写为参数槽位
    fn passthrough(
        &mut self,
        chars: &[char],
        i: usize,
        ordinal: &mut usize,
        out: &mut String,
    ) -> Result<usize, String> {
        match chars[i] {
            '\\' => {
                out.push('\\');
                match chars.get(i + 1) {
                    Some(c) => {
                        out.push(*c);
                        Ok(i + 2)
                    }
                    None => Err("trailing backslash".to_string()),
                }
            }
            '[' => {
                let close = matching_bracket(chars, i)?;
                out.extend(&chars[i..=close]);
                Ok(close + 1)
            }
            '(' if chars.get(i + 1) == Some(&'?') => {
                let rest: String = chars[i..].iter().take(4).collect();
                let name_start = if rest.starts_with("(?P<") {
                    Some(i + 4)
                } else if rest.starts_with("(?<") && !matches!(chars.get(i + 3), Some('=') | Some('!')) {
                    Some(i + 3)
                } else {
                    None
                };
                match name_start {
                    Some(start) => {
                        let end = chars[start..]
                            .iter()
                            .position(|&c| c == '>')
                            .map(|p| start + p)
                            .ok_or_else(|| "unterminated group name".to_string())?;
                        let name: String = chars[start..end].iter().collect();
                        out.push_str(&self.slot(name, false));
                        Ok(end + 1)
                    }
                    None => {
                        out.push('(');
                        Ok(i + 1)
                    }
                }
            }
            '(' => {
                let slot = self.slot(ordinal.to_string(), false);
                *ordinal += 1;
                out.push_str(&slot);
                Ok(i + 1)
            }
            c => {
                out.push(c);
                Ok(i + 1)
            }
        }
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// 找到与 `open` 处 `(` 配对的 `)`，跳过转义与字符类
fn matching_paren(chars: &[char], open: usize) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => i = matching_bracket(chars, i)?,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err("unbalanced '(' in parameter capture".to_string())
}

/// 找到字符类 `[` 对应的 `]`
fn matching_bracket(chars: &[char], open: usize) -> Result<usize, String> {
    let mut i = open + 1;
    if chars.get(i) == Some(&'^') {
        i += 1;
    }
    // 紧跟在开头的 `]` 是字面量
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            ']' => return Ok(i),
            _ => {}
        }
        i += 1;
    }
    Err("unterminated character class".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(pattern: impl Into<PathPattern>) -> Matcher {
        Matcher::compile(&pattern.into(), MatchOptions::default()).unwrap()
    }

    fn prefix(pattern: impl Into<PathPattern>) -> Matcher {
        let options = MatchOptions {
            end: false,
            ..MatchOptions::default()
        };
        Matcher::compile(&pattern.into(), options).unwrap()
    }

    fn params_of(m: &Matcher, path: &str) -> Params {
        m.matches(path).unwrap().expect("expected a match").params
    }

    #[test]
    fn test_named_param() {
        let m = route("/user/:id");
        assert_eq!(params_of(&m, "/user/42").get("id"), Some("42"));
        assert_eq!(params_of(&m, "/user/42/").get("id"), Some("42"));
        assert!(m.matches("/user/42/x").unwrap().is_none());
        assert!(m.matches("/user").unwrap().is_none());
        assert_eq!(m.keys(), &[ParamKey { name: "id".into(), optional: false }]);
    }

    #[test]
    fn test_strict_trailing_slash() {
        let options = MatchOptions {
            strict: true,
            ..MatchOptions::default()
        };
        let m = Matcher::compile(&"/user/:id".into(), options).unwrap();
        assert!(m.matches("/user/42").unwrap().is_some());
        assert!(m.matches("/user/42/").unwrap().is_none());
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(route("/Foo").matches("/foo").unwrap().is_some());

        let options = MatchOptions {
            sensitive: true,
            ..MatchOptions::default()
        };
        let m = Matcher::compile(&"/Foo".into(), options).unwrap();
        assert!(m.matches("/foo").unwrap().is_none());
        assert!(m.matches("/Foo").unwrap().is_some());
    }

    #[test]
    fn test_wildcard() {
        let m = route("/files/*");
        assert_eq!(params_of(&m, "/files/a/b.txt").get("0"), Some("a/b.txt"));

        let star = route("*");
        let matched = star.matches("/any/where").unwrap().unwrap();
        assert_eq!(matched.params.get("0"), Some("/any/where"));
        assert_eq!(matched.path, "/any/where");
    }

    #[test]
    fn test_optional_param() {
        let m = route("/user/:id?");
        assert_eq!(params_of(&m, "/user/5").get("id"), Some("5"));
        let p = params_of(&m, "/user");
        assert!(!p.contains_key("id"));
        assert!(m.keys()[0].optional);
    }

    #[test]
    fn test_format_param() {
        let m = route("/:file.:ext");
        let p = params_of(&m, "/report.pdf");
        assert_eq!(p.get("file"), Some("report"));
        assert_eq!(p.get("ext"), Some("pdf"));
    }

    #[test]
    fn test_custom_capture() {
        let m = route("/post/:id(\\d+)");
        assert_eq!(params_of(&m, "/post/12").get("id"), Some("12"));
        assert!(m.matches("/post/ab").unwrap().is_none());
    }

    #[test]
    fn test_unnamed_group_is_positional() {
        let m = route("/(foo|bar)/:id");
        let p = params_of(&m, "/bar/9");
        assert_eq!(p.get("0"), Some("bar"));
        assert_eq!(p.get("id"), Some("9"));
    }

    #[test]
    fn test_continuation_capture() {
        let m = route("/src/:path*");
        let p = params_of(&m, "/src/a/b/c");
        assert_eq!(p.get("path"), Some("a"));
        assert_eq!(p.get("0"), Some("/b/c"));
    }

    #[test]
    fn test_list_shares_key_names() {
        let m = route(vec!["/a/:id", "/b/:id"]);
        assert_eq!(params_of(&m, "/a/1").get("id"), Some("1"));
        assert_eq!(params_of(&m, "/b/2").get("id"), Some("2"));
        assert!(m.matches("/c/3").unwrap().is_none());
    }

    #[test]
    fn test_list_positional_restarts_per_branch() {
        let m = route(["/a/*", "/b/*"]);
        assert_eq!(params_of(&m, "/b/x/y").get("0"), Some("x/y"));
    }

    #[test]
    fn test_raw_regex() {
        let m = route(Regex::new(r"^/post/(\d+)$").unwrap());
        assert_eq!(params_of(&m, "/post/7").get("0"), Some("7"));

        let named = route(Regex::new(r"^/blog/(?P<slug>[a-z-]+)$").unwrap());
        assert_eq!(params_of(&named, "/blog/hello-world").get("slug"), Some("hello-world"));
    }

    #[test]
    fn test_prefix_matching() {
        let m = prefix("/foo");
        assert_eq!(m.matches("/foo/bar").unwrap().unwrap().path, "/foo");
        assert_eq!(m.matches("/foo").unwrap().unwrap().path, "/foo");
        assert_eq!(m.matches("/foo/").unwrap().unwrap().path, "/foo/");
        assert!(m.matches("/foobar").unwrap().is_none());

        let p = prefix("/user/:id");
        let matched = p.matches("/user/7/posts").unwrap().unwrap();
        assert_eq!(matched.path, "/user/7");
        assert_eq!(matched.params.get("id"), Some("7"));
    }

    #[test]
    fn test_root_prefix_fast_path() {
        let m = prefix("/");
        let matched = m.matches("/anything/at/all").unwrap().unwrap();
        assert_eq!(matched.path, "");
        assert!(matched.params.is_empty());
        assert!(m.keys().is_empty());
    }

    #[test]
    fn test_root_route() {
        let m = route("/");
        assert!(m.matches("/").unwrap().is_some());
        assert!(m.matches("/x").unwrap().is_none());
    }

    #[test]
    fn test_decoding() {
        let m = route("/user/:name");
        assert_eq!(params_of(&m, "/user/caf%C3%A9").get("name"), Some("café"));
        assert_eq!(params_of(&m, "/user/a+b").get("name"), Some("a+b"));

        assert!(matches!(
            m.matches("/user/%zz"),
            Err(DispatchError::InvalidParam { .. })
        ));
        assert!(matches!(
            m.matches("/user/%E0%A4"),
            Err(DispatchError::InvalidParam { .. })
        ));
        assert!(matches!(m.matches("/user/50%"), Err(DispatchError::InvalidParam { .. })));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(Matcher::compile(&"/:id(\\d+".into(), MatchOptions::default()).is_err());
        assert!(Matcher::compile(&"/[abc".into(), MatchOptions::default()).is_err());
    }

    #[test]
    fn test_decode_param() {
        assert_eq!(decode_param("plain").unwrap(), "plain");
        assert_eq!(decode_param("%2F").unwrap(), "/");
        assert_eq!(decode_param("").unwrap(), "");
        assert!(decode_param("%").is_err());
        assert!(decode_param("%4").is_err());
    }
}
