//! 型レコードモジュール
//!
//! 型テーブルの 1 エントリに相当する型レコードと、その構成要素を定義する。
//! レコードは参照先の型そのものではなく `TypeId` だけを保持するため、
//! 自己参照する構造体も通常のデータとして表現できる。

use std::cell::OnceCell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::id_alloc::UniqueNamer;

/// 型識別子
///
/// 1 つの翻訳単位の型テーブル内で一意な文字列。
/// `Pointer0` のような綴りは慣習にすぎず、呼び出し側は解析してはならない。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    /// 「型なし」を表す識別子
    pub const NULL: &'static str = "nullType";

    /// 新しい識別子を作成
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// 「型なし」の識別子
    pub fn null() -> Self {
        Self(Self::NULL.to_string())
    }

    /// 「型なし」かどうか
    pub fn is_null(&self) -> bool {
        self.0 == Self::NULL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for TypeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// 型修飾子
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers {
        is_const: false,
        is_volatile: false,
        is_restrict: false,
    };

    /// const のみ
    pub fn constant() -> Self {
        Self {
            is_const: true,
            ..Self::NONE
        }
    }

    /// 修飾子が 1 つもないかどうか
    pub fn is_empty(&self) -> bool {
        !self.is_const && !self.is_volatile && !self.is_restrict
    }

    /// 2 つの修飾子集合の和
    pub fn union(self, other: Qualifiers) -> Self {
        Self {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
            is_restrict: self.is_restrict || other.is_restrict,
        }
    }

    /// 宣言に書く綴り（"const volatile" など）
    pub fn spelling(&self) -> String {
        let mut words = Vec::new();
        if self.is_const {
            words.push("const");
        }
        if self.is_volatile {
            words.push("volatile");
        }
        if self.is_restrict {
            words.push("restrict");
        }
        words.join(" ")
    }
}

/// アクセス指定子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessSpec {
    Public,
    Private,
    Protected,
}

impl AccessSpec {
    /// 文字列からパース
    ///
    /// public / private / protected 以外は生成側のバグとみなしエラーにする。
    pub fn parse(s: &str) -> Result<Self, TableError> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "protected" => Ok(Self::Protected),
            other => Err(TableError::InvalidAccess(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
        }
    }
}

impl fmt::Display for AccessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 基底クラスへの辺
///
/// 宣言順に保持し、並べ替えも重複除去もしない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEdge {
    pub access: AccessSpec,
    pub base: TypeId,
    pub is_virtual: bool,
}

impl BaseEdge {
    pub fn new(access: AccessSpec, base: impl Into<TypeId>, is_virtual: bool) -> Self {
        Self {
            access,
            base: base.into(),
            is_virtual,
        }
    }
}

/// 構造体・クラスのメンバー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: Option<String>,
    pub ty: TypeId,
    /// クラスメンバーのアクセス指定子（C の構造体では None）
    pub access: Option<AccessSpec>,
    /// ビットフィールド幅
    pub bit_field: Option<u32>,
}

/// 関数パラメータ
///
/// 名前は表示専用で、型の同一性には含まれない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ty: TypeId,
    pub name: Option<String>,
}

/// 配列サイズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArraySize {
    Fixed(u64),
    Variable,
}

/// ポインタの種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PointerKind {
    #[default]
    Pointer,
    LValueReference,
    RValueReference,
    Block,
    Member,
}

impl PointerKind {
    /// 宣言子に書く記号
    pub fn sigil(&self) -> &'static str {
        match self {
            Self::Pointer | Self::Member => "*",
            Self::LValueReference => "&",
            Self::RValueReference => "&&",
            Self::Block => "^",
        }
    }

    /// 型テーブルの `pointer_kind` 属性値（通常のポインタは None）
    pub fn attr_value(&self) -> Option<&'static str> {
        match self {
            Self::Pointer => None,
            Self::LValueReference => Some("lvalue_reference"),
            Self::RValueReference => Some("rvalue_reference"),
            Self::Block => Some("block"),
            Self::Member => Some("member"),
        }
    }

    /// 属性値からパース（未知の値は通常のポインタ扱い）
    pub fn from_attr(s: Option<&str>) -> Self {
        match s {
            Some("lvalue_reference") => Self::LValueReference,
            Some("rvalue_reference") => Self::RValueReference,
            Some("block") => Self::Block,
            Some("member") => Self::Member,
            _ => Self::Pointer,
        }
    }
}

/// struct と union の区別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKey {
    Struct,
    Union,
}

impl StructKey {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
        }
    }
}

/// 集成型の名前スロット
///
/// ソース上の名前があれば最初から埋まっている。無名の場合は
/// 最初の問い合わせで一意な名前を割り当て、以後は同じ名前を返す。
#[derive(Debug, Clone, Default)]
pub struct NameSlot(OnceCell<String>);

impl NameSlot {
    /// 名前付き（または無名）のスロットを作成
    pub fn new(name: Option<String>) -> Self {
        let cell = OnceCell::new();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            let _ = cell.set(name);
        }
        Self(cell)
    }

    /// 割り当て済みの名前
    pub fn get(&self) -> Option<&str> {
        self.0.get().map(|s| s.as_str())
    }

    /// 名前を取得（未割り当てなら namer から割り当てる）
    pub fn get_or_assign(&self, namer: &UniqueNamer) -> &str {
        self.0.get_or_init(|| namer.fresh())
    }
}

/// 型レコードの種別
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// 基本型（綴りをそのまま出力する）
    Reserved { spelling: String },
    /// 修飾付き型（構造は非修飾型 `base` に委ねる）
    Qualified { base: TypeId },
    /// ポインタ・参照
    Pointer { pointee: TypeId, kind: PointerKind },
    /// 関数型
    Function {
        return_type: TypeId,
        params: Vec<Param>,
        is_variadic: bool,
    },
    /// 配列型
    Array { element: TypeId, size: ArraySize },
    /// 構造体・共用体（`complete` は本体の定義があるか）
    Struct {
        key: StructKey,
        tag: NameSlot,
        complete: bool,
        members: Vec<Member>,
    },
    /// クラス
    Class {
        name: NameSlot,
        complete: bool,
        members: Vec<Member>,
        bases: Vec<BaseEdge>,
    },
    /// 列挙型
    Enum { tag: NameSlot },
    /// 未対応の型（変換を止めないための代替）
    Other { opaque: String },
}

/// 型レコード
#[derive(Debug, Clone)]
pub struct TypeRecord {
    pub id: TypeId,
    pub quals: Qualifiers,
    pub kind: TypeKind,
}

impl TypeRecord {
    /// 修飾子なしのレコードを作成
    pub fn new(id: impl Into<TypeId>, kind: TypeKind) -> Self {
        Self {
            id: id.into(),
            quals: Qualifiers::NONE,
            kind,
        }
    }

    /// 修飾子を設定
    pub fn with_quals(mut self, quals: Qualifiers) -> Self {
        self.quals = quals;
        self
    }

    /// 基本型レコード
    pub fn reserved(id: impl Into<TypeId>, spelling: impl Into<String>) -> Self {
        Self::new(
            id,
            TypeKind::Reserved {
                spelling: spelling.into(),
            },
        )
    }

    /// 集成型の名前スロット（集成型以外は None）
    pub fn name_slot(&self) -> Option<&NameSlot> {
        match &self.kind {
            TypeKind::Struct { tag, .. } | TypeKind::Enum { tag } => Some(tag),
            TypeKind::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    /// 本体の定義を持つ struct / union / class か
    pub fn is_complete_aggregate(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Struct { complete: true, .. } | TypeKind::Class { complete: true, .. }
        )
    }

    /// 直接の構造的参照先
    ///
    /// 不変条件として、ここに自分自身の識別子が含まれることはない。
    pub fn direct_refs(&self) -> Vec<&TypeId> {
        match &self.kind {
            TypeKind::Reserved { .. } | TypeKind::Enum { .. } | TypeKind::Other { .. } => vec![],
            TypeKind::Qualified { base } => vec![base],
            TypeKind::Pointer { pointee, .. } => vec![pointee],
            TypeKind::Function {
                return_type,
                params,
                ..
            } => {
                let mut refs = vec![return_type];
                refs.extend(params.iter().map(|p| &p.ty));
                refs
            }
            TypeKind::Array { element, .. } => vec![element],
            TypeKind::Struct { members, .. } => members.iter().map(|m| &m.ty).collect(),
            TypeKind::Class { members, bases, .. } => members
                .iter()
                .map(|m| &m.ty)
                .chain(bases.iter().map(|b| &b.base))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_spec_parse() {
        assert_eq!(AccessSpec::parse("public").unwrap(), AccessSpec::Public);
        assert_eq!(AccessSpec::parse("protected").unwrap(), AccessSpec::Protected);
        assert!(matches!(
            AccessSpec::parse("friend"),
            Err(TableError::InvalidAccess(s)) if s == "friend"
        ));
    }

    #[test]
    fn test_qualifier_spelling() {
        let q = Qualifiers {
            is_const: true,
            is_volatile: true,
            is_restrict: false,
        };
        assert_eq!(q.spelling(), "const volatile");
        assert!(Qualifiers::NONE.is_empty());
        assert_eq!(Qualifiers::constant().union(q), q);
    }

    #[test]
    fn test_name_slot_assigns_once() {
        let namer = UniqueNamer::new();
        let slot = NameSlot::new(None);
        assert_eq!(slot.get(), None);
        let first = slot.get_or_assign(&namer).to_string();
        let second = slot.get_or_assign(&namer).to_string();
        assert_eq!(first, second);
        // 2 回目の問い合わせでカウンタは進まない
        assert_eq!(namer.fresh(), "__anon_2");
    }

    #[test]
    fn test_name_slot_keeps_source_name() {
        let namer = UniqueNamer::new();
        let slot = NameSlot::new(Some("node".to_string()));
        assert_eq!(slot.get_or_assign(&namer), "node");
        assert_eq!(namer.fresh(), "__anon_1");
    }

    #[test]
    fn test_pointer_kind_attr() {
        for kind in [
            PointerKind::Pointer,
            PointerKind::LValueReference,
            PointerKind::RValueReference,
            PointerKind::Block,
            PointerKind::Member,
        ] {
            assert_eq!(PointerKind::from_attr(kind.attr_value()), kind);
        }
    }

    #[test]
    fn test_type_id_null() {
        assert!(TypeId::null().is_null());
        assert!(!TypeId::from("int").is_null());
    }
}
