//! 型名置換マップ
//!
//! 1 行に `元の識別子 置換後の識別子` を空白区切りで書いたファイル。
//! 型テーブルに出力する識別子を差し替える。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::type_record::TypeId;

/// ラベル型の既定の識別子
pub const LABEL_TYPE: &str = "Label";

/// 型名置換マップの読み込みエラー
#[derive(Debug)]
pub enum TypeNameMapError {
    Io(io::Error),
    /// 2 語に満たない行（行番号は 1 始まり）
    Malformed { line: usize, text: String },
}

impl fmt::Display for TypeNameMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNameMapError::Io(e) => write!(f, "cannot read typename map: {}", e),
            TypeNameMapError::Malformed { line, text } => {
                write!(f, "typename map line {}: read error: {:?}", line, text)
            }
        }
    }
}

impl std::error::Error for TypeNameMapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TypeNameMapError::Io(e) => Some(e),
            TypeNameMapError::Malformed { .. } => None,
        }
    }
}

impl From<io::Error> for TypeNameMapError {
    fn from(e: io::Error) -> Self {
        TypeNameMapError::Io(e)
    }
}

/// 型名置換マップ
#[derive(Debug, Clone, Default)]
pub struct TypeNameMap {
    map: HashMap<String, String>,
}

impl TypeNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// テキストからパース
    ///
    /// 空行は読み飛ばす。3 語目以降は無視する。
    pub fn parse(text: &str) -> Result<Self, TypeNameMapError> {
        let mut map = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some(lhs), Some(rhs)) => {
                    map.insert(lhs.to_string(), rhs.to_string());
                }
                _ => {
                    return Err(TypeNameMapError::Malformed {
                        line: i + 1,
                        text: line.to_string(),
                    });
                }
            }
        }
        Ok(Self { map })
    }

    /// ファイルから読み込み
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TypeNameMapError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.map.insert(from.into(), to.into());
    }

    pub fn get(&self, from: &str) -> Option<&str> {
        self.map.get(from).map(String::as_str)
    }

    /// 識別子を置換（対応がなければそのまま）
    pub fn apply(&self, id: &TypeId) -> TypeId {
        match self.get(id.as_str()) {
            Some(to) if !to.is_empty() => TypeId::from(to),
            _ => id.clone(),
        }
    }

    /// ラベル型の識別子
    pub fn label_type(&self) -> TypeId {
        self.apply(&TypeId::from(LABEL_TYPE))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
