//! 宣言子合成の出力断片
//!
//! 型環境から生成される宣言テキスト。整形（改行・インデント）は行わず、
//! トークン列をそのまま連結した文字列として保持する。

use std::fmt;

/// 宣言テキストの断片
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodeFragment(String);

impl CodeFragment {
    /// 空の断片を作成
    pub fn new() -> Self {
        Self(String::new())
    }

    /// 文字列から断片を作成
    pub fn token(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// 文字列として参照
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 所有する文字列を取り出す
    pub fn into_string(self) -> String {
        self.0
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 断片をスペース区切りで後ろに連結
    ///
    /// どちらかが空の場合は区切りを入れない。
    pub fn then(mut self, other: impl AsRef<str>) -> Self {
        let other = other.as_ref();
        if other.is_empty() {
            return self;
        }
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(other);
        self
    }

    /// 区切り文字列で連結
    pub fn join<I>(sep: &str, items: I) -> Self
    where
        I: IntoIterator<Item = CodeFragment>,
    {
        let parts: Vec<String> = items.into_iter().map(CodeFragment::into_string).collect();
        Self(parts.join(sep))
    }
}

impl fmt::Display for CodeFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CodeFragment {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CodeFragment {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for CodeFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for CodeFragment {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for CodeFragment {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_then_skips_empty() {
        let frag = CodeFragment::token("int").then("").then("x");
        assert_eq!(frag, "int x");
        assert_eq!(CodeFragment::new().then("x"), "x");
    }

    #[test]
    fn test_join() {
        let joined = CodeFragment::join(
            ", ",
            vec![CodeFragment::token("int a"), CodeFragment::token("char *b")],
        );
        assert_eq!(joined.as_str(), "int a, char *b");
        assert!(CodeFragment::join(", ", Vec::new()).is_empty());
    }
}
