//! 请求 URL 的切分工具
//!
//! 路由只关心 pathname：查询串与片段不参与匹配；绝对形式的 URL
//! （`http://host/path`）的 scheme+host 前缀在每次改写中原样保留。

/// 绝对形式 URL 的 scheme+host 前缀，相对形式返回空串
pub fn protohost(url: &str) -> &str {
    if url.is_empty() || url.starts_with('/') {
        return "";
    }

    let end = url.find(['?', '#']).unwrap_or(url.len());
    let head = &url[..end];
    match head.find("://") {
        Some(idx) => {
            let after = idx + 3;
            match head[after..].find('/') {
                Some(slash) => &url[..after + slash],
                None => head,
            }
        }
        None => "",
    }
}

/// URL 的 pathname 部分
pub fn pathname(url: &str) -> &str {
    let rest = &url[protohost(url).len()..];
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() && !url.is_empty() && !url.starts_with(['?', '#']) {
        "/"
    } else {
        path
    }
}

/// URL 的查询串（不含 `?`）
pub fn query(url: &str) -> Option<&str> {
    let start = url.find('?')? + 1;
    let rest = &url[start..];
    let end = rest.find('#').unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protohost() {
        assert_eq!(protohost("/foo/bar"), "");
        assert_eq!(protohost("http://example.com/foo"), "http://example.com");
        assert_eq!(protohost("http://example.com"), "http://example.com");
        assert_eq!(protohost("/redirect?to=http://x/y"), "");
        assert_eq!(protohost("foo?bar=http://x/y"), "");
    }

    #[test]
    fn test_pathname() {
        assert_eq!(pathname("/foo/bar?x=1"), "/foo/bar");
        assert_eq!(pathname("/foo#frag"), "/foo");
        assert_eq!(pathname("http://example.com/a/b?q"), "/a/b");
        assert_eq!(pathname("http://example.com"), "/");
        assert_eq!(pathname("/"), "/");
    }

    #[test]
    fn test_query() {
        assert_eq!(query("/a?x=1&y=2"), Some("x=1&y=2"));
        assert_eq!(query("/a?x=1#f"), Some("x=1"));
        assert_eq!(query("/a"), None);
    }
}
