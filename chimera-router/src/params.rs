//! 路径参数表
//!
//! 命名参数（`:id`）以名字为键，匿名捕获（`*`、内联正则分组）以从 0 开始的
//! 序号为键。插入顺序即捕获顺序。

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// 有序的路径参数表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 按序号读取匿名捕获
    pub fn index(&self, index: usize) -> Option<&str> {
        self.get(&index.to_string())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// 插入或覆盖；覆盖时保持原有位置
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 从 0 开始连续的序号键个数
    fn positional_len(&self) -> usize {
        let mut n = 0;
        while self.contains_key(&n.to_string()) {
            n += 1;
        }
        n
    }

    /// 与父路由的参数合并（`merge_params` 开启时使用）
    ///
    /// 命名键取并集，同名时子路由覆盖父路由。若双方都有序号键 `0`，
    /// 子路由的连续序号键整体后移到父路由最大序号之后，例如
    /// `{0: "10"}` 合并 `{0: "20", 1: "30"}` 得到 `{0: "10", 1: "20", 2: "30"}`。
    pub fn merge_into_parent(self, parent: &Params) -> Params {
        let mut merged = parent.clone();

        if !(self.contains_key("0") && parent.contains_key("0")) {
            merged.extend(self);
            return merged;
        }

        let offset = parent.positional_len();
        let count = self.positional_len();
        for (key, value) in self.entries {
            let shifted = (0..count)
                .find(|n| key == n.to_string())
                .map(|n| (n + offset).to_string());
            merged.insert(shifted.unwrap_or(key), value);
        }
        merged
    }
}

impl Extend<(String, String)> for Params {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
        }
        f.write_str("}")
    }
}

/// 按捕获顺序序列化为 JSON 对象
impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut p = params(&[("a", "1"), ("b", "2")]);
        p.insert("a", "3");
        let keys: Vec<_> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(p.get("a"), Some("3"));
    }

    #[test]
    fn test_merge_positional_shift() {
        let parent = params(&[("0", "10")]);
        let child = params(&[("0", "20"), ("1", "30")]);

        let merged = child.merge_into_parent(&parent);
        assert_eq!(merged, params(&[("0", "10"), ("1", "20"), ("2", "30")]));
    }

    #[test]
    fn test_merge_named_union_child_wins() {
        let parent = params(&[("user", "tj"), ("id", "1")]);
        let child = params(&[("id", "2"), ("post", "9")]);

        let merged = child.merge_into_parent(&parent);
        assert_eq!(merged.get("user"), Some("tj"));
        assert_eq!(merged.get("id"), Some("2"));
        assert_eq!(merged.get("post"), Some("9"));
    }

    #[test]
    fn test_merge_positional_only_on_one_side() {
        let parent = params(&[("id", "1")]);
        let child = params(&[("0", "a/b")]);

        let merged = child.merge_into_parent(&parent);
        assert_eq!(merged, params(&[("id", "1"), ("0", "a/b")]));
    }

    #[test]
    fn test_merge_mixed_keys() {
        let parent = params(&[("0", "x"), ("1", "y"), ("name", "p")]);
        let child = params(&[("0", "z"), ("name", "c")]);

        let merged = child.merge_into_parent(&parent);
        assert_eq!(merged.get("0"), Some("x"));
        assert_eq!(merged.get("1"), Some("y"));
        assert_eq!(merged.get("2"), Some("z"));
        assert_eq!(merged.get("name"), Some("c"));
    }

    #[test]
    fn test_serialize_as_object() {
        let p = params(&[("user", "tj"), ("0", "a/b")]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"user":"tj","0":"a/b"}"#);
    }
}
