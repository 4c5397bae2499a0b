//! 型テーブル文書
//!
//! 順方向が出力し、逆方向が読み込む中間表現。JSON で永続化する。
//! 属性値はすべて文字列で、真偽値は "0" / "1" / "true" / "false" のみ許す。

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::type_record::{AccessSpec, ArraySize, BaseEdge, Qualifiers, TypeId};

// エントリ種別
pub const BASIC_TYPE: &str = "basicType";
pub const POINTER_TYPE: &str = "pointerType";
pub const FUNCTION_TYPE: &str = "functionType";
pub const ARRAY_TYPE: &str = "arrayType";
pub const STRUCT_TYPE: &str = "structType";
pub const UNION_TYPE: &str = "unionType";
pub const CLASS_TYPE: &str = "classType";
pub const ENUM_TYPE: &str = "enumType";

// 属性名
pub const ATTR_NAME: &str = "name";
pub const ATTR_REF: &str = "ref";
pub const ATTR_RETURN_TYPE: &str = "return_type";
pub const ATTR_ELEMENT_TYPE: &str = "element_type";
pub const ATTR_ARRAY_SIZE: &str = "array_size";
pub const ATTR_TAG: &str = "tag";
pub const ATTR_POINTER_KIND: &str = "pointer_kind";
pub const ATTR_IS_CONST: &str = "is_const";
pub const ATTR_IS_VOLATILE: &str = "is_volatile";
pub const ATTR_IS_RESTRICT: &str = "is_restrict";
pub const ATTR_IS_VARIADIC: &str = "is_variadic";
pub const ATTR_IS_COMPLETE: &str = "is_complete";

/// 真偽値属性をパース
pub fn parse_flag(attr: &str, value: &str) -> Result<bool, TableError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(TableError::InvalidBool {
            attr: attr.to_string(),
            value: value.to_string(),
        }),
    }
}

/// 関数パラメータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamEntry {
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// シンボル（メンバーまたはグローバル変数・関数）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_field: Option<String>,
}

impl SymbolEntry {
    /// 名前と型だけのシンボル
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            access: None,
            bit_field: None,
        }
    }

    /// アクセス指定子（不正な値はエラー）
    pub fn access_spec(&self) -> Result<Option<AccessSpec>, TableError> {
        self.access.as_deref().map(AccessSpec::parse).transpose()
    }

    /// ビットフィールド幅（不正な値はエラー）
    pub fn bit_width(&self) -> Result<Option<u32>, TableError> {
        self.bit_field
            .as_deref()
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| TableError::InvalidBitField(s.to_string()))
            })
            .transpose()
    }
}

/// 基底クラス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEntry {
    pub access: String,
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_virtual: Option<String>,
}

impl BaseEntry {
    pub fn from_edge(edge: &BaseEdge) -> Self {
        Self {
            access: edge.access.as_str().to_string(),
            ty: edge.base.clone(),
            is_virtual: edge.is_virtual.then(|| "1".to_string()),
        }
    }

    pub fn to_edge(&self) -> Result<BaseEdge, TableError> {
        let access = AccessSpec::parse(&self.access)?;
        let is_virtual = match &self.is_virtual {
            Some(v) => parse_flag("is_virtual", v)?,
            None => false,
        };
        Ok(BaseEdge::new(access, self.ty.clone(), is_virtual))
    }
}

/// 型テーブルのエントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub kind: String,
    #[serde(rename = "type")]
    pub ty: TypeId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<SymbolEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<BaseEntry>,
}

impl TypeEntry {
    pub fn new(kind: impl Into<String>, ty: TypeId) -> Self {
        Self {
            kind: kind.into(),
            ty,
            attrs: BTreeMap::new(),
            params: Vec::new(),
            symbols: Vec::new(),
            bases: Vec::new(),
        }
    }

    /// 属性を設定（ビルダー形式）
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// 型識別子を参照する属性（なければ nullType）
    pub fn type_ref(&self, name: &str) -> TypeId {
        self.attr(name).map(TypeId::from).unwrap_or_else(TypeId::null)
    }

    /// 真偽値属性（なければ false、不正な値はエラー）
    pub fn flag(&self, name: &str) -> Result<bool, TableError> {
        match self.attr(name) {
            Some(value) => parse_flag(name, value),
            None => Ok(false),
        }
    }

    /// 修飾子属性
    pub fn qualifiers(&self) -> Result<Qualifiers, TableError> {
        Ok(Qualifiers {
            is_const: self.flag(ATTR_IS_CONST)?,
            is_volatile: self.flag(ATTR_IS_VOLATILE)?,
            is_restrict: self.flag(ATTR_IS_RESTRICT)?,
        })
    }

    /// 修飾子属性を設定
    pub fn set_qualifiers(&mut self, quals: Qualifiers) {
        for (attr, on) in [
            (ATTR_IS_CONST, quals.is_const),
            (ATTR_IS_VOLATILE, quals.is_volatile),
            (ATTR_IS_RESTRICT, quals.is_restrict),
        ] {
            if on {
                self.attrs.insert(attr.to_string(), "1".to_string());
            }
        }
    }

    /// 配列サイズ（属性なしと "*" は可変長）
    pub fn array_size(&self) -> Result<ArraySize, TableError> {
        match self.attr(ATTR_ARRAY_SIZE) {
            None | Some("*") => Ok(ArraySize::Variable),
            Some(s) => s
                .parse::<u64>()
                .map(ArraySize::Fixed)
                .map_err(|_| TableError::InvalidArraySize(s.to_string())),
        }
    }
}

/// 型テーブル文書
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTableDoc {
    #[serde(rename = "typeTable", default)]
    pub type_table: Vec<TypeEntry>,
    #[serde(rename = "globalSymbols", default)]
    pub global_symbols: Vec<SymbolEntry>,
}

impl TypeTableDoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// 識別子でエントリを探す（重複時は後のエントリ）
    pub fn entry(&self, id: &str) -> Option<&TypeEntry> {
        self.type_table.iter().rev().find(|e| e.ty.as_str() == id)
    }

    /// JSONファイルに保存
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// JSON文字列にシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// JSONファイルから読み込み
    pub fn load_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// JSON文字列からデシリアライズ
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("is_const", "1"), Ok(true));
        assert_eq!(parse_flag("is_const", "false"), Ok(false));
        assert_eq!(
            parse_flag("is_const", "yes"),
            Err(TableError::InvalidBool {
                attr: "is_const".to_string(),
                value: "yes".to_string(),
            })
        );
    }

    #[test]
    fn test_array_size() {
        let entry = TypeEntry::new(ARRAY_TYPE, TypeId::from("Array0"));
        assert_eq!(entry.array_size(), Ok(ArraySize::Variable));
        let entry = entry.with_attr(ATTR_ARRAY_SIZE, "16");
        assert_eq!(entry.array_size(), Ok(ArraySize::Fixed(16)));
        let entry = entry.with_attr(ATTR_ARRAY_SIZE, "*");
        assert_eq!(entry.array_size(), Ok(ArraySize::Variable));
        let entry = entry.with_attr(ATTR_ARRAY_SIZE, "N");
        assert_eq!(
            entry.array_size(),
            Err(TableError::InvalidArraySize("N".to_string()))
        );
    }

    #[test]
    fn test_missing_ref_is_null() {
        let entry = TypeEntry::new(POINTER_TYPE, TypeId::from("Pointer0"));
        assert!(entry.type_ref(ATTR_REF).is_null());
    }

    #[test]
    fn test_json_field_names() {
        let mut doc = TypeTableDoc::new();
        let mut entry =
            TypeEntry::new(BASIC_TYPE, TypeId::from("Basic0")).with_attr(ATTR_NAME, "int");
        entry.set_qualifiers(Qualifiers::constant());
        doc.type_table.push(entry);
        doc.global_symbols
            .push(SymbolEntry::new("x", TypeId::from("Basic0")));

        let json = doc.to_json().unwrap();
        assert!(json.contains("\"typeTable\""));
        assert!(json.contains("\"globalSymbols\""));
        assert!(json.contains("\"is_const\": \"1\""));
        // 空の配列は出力しない
        assert!(!json.contains("\"params\""));
        assert_eq!(TypeTableDoc::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn test_base_entry_virtual_flag() {
        let base = BaseEntry {
            access: "protected".to_string(),
            ty: TypeId::from("Class0"),
            is_virtual: Some("true".to_string()),
        };
        let edge = base.to_edge().unwrap();
        assert_eq!(edge.access, AccessSpec::Protected);
        assert!(edge.is_virtual);

        let bad = BaseEntry {
            access: "friend".to_string(),
            ..base
        };
        assert_eq!(
            bad.to_edge(),
            Err(TableError::InvalidAccess("friend".to_string()))
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");
        let mut doc = TypeTableDoc::new();
        doc.type_table
            .push(TypeEntry::new(ENUM_TYPE, TypeId::from("Enum0")).with_attr(ATTR_TAG, "color"));
        doc.save_json(&path).unwrap();
        assert_eq!(TypeTableDoc::load_json(&path).unwrap(), doc);
    }
}
