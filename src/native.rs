//! ネイティブ型の抽象
//!
//! 型レジストリが入力として受け取る型表現のインターフェース。
//! 具体的な型モデル（`c_type` など）はこのトレイトを実装する。

use std::fmt::Debug;
use std::hash::Hash;

use crate::type_record::{AccessSpec, ArraySize, PointerKind, Qualifiers};

/// 集成型のキーワード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Struct,
    Union,
    Class,
}

/// 関数パラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeParam<T> {
    pub ty: T,
    pub name: Option<String>,
}

/// 集成型のメンバー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMember<T> {
    pub name: Option<String>,
    pub ty: T,
    pub access: Option<AccessSpec>,
    pub bit_field: Option<u32>,
}

/// 基底クラス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBase<T> {
    pub ty: T,
    pub access: AccessSpec,
    pub is_virtual: bool,
}

/// 分類結果
///
/// 正規化済みかつ修飾子を外した型に対する分類。構成要素の型は
/// 元の表現のまま返し、レジストリが再帰的に登録する。
#[derive(Debug, Clone)]
pub enum NativeKind<T> {
    /// 組み込み型（綴り）
    Builtin { spelling: String },
    /// ポインタ・参照
    Pointer { pointee: T, kind: PointerKind },
    /// 配列
    Array { element: T, size: ArraySize },
    /// 関数
    Function {
        return_type: T,
        params: Vec<NativeParam<T>>,
        is_variadic: bool,
    },
    /// struct / union / class
    ///
    /// 不完全型では `complete` が false で `members` は空になる。
    Record {
        key: RecordKey,
        name: Option<String>,
        complete: bool,
        members: Vec<NativeMember<T>>,
        bases: Vec<NativeBase<T>>,
    },
    /// 列挙型
    Enum { name: Option<String> },
    /// 未対応のカテゴリ
    ///
    /// `tag` は型テーブル上のエントリ種別（`complexType` など）。
    Other { tag: String, description: String },
}

/// ネイティブ型のソース
///
/// 型の同一性は `Self::Type` の `Eq` / `Hash` で判定する。
/// 同じ正規型・同じ修飾子の型は等しくなければならない。
pub trait NativeTypeSource {
    type Type: Clone + Eq + Hash + Debug;

    /// 「型なし」かどうか
    fn is_null(&self, ty: &Self::Type) -> bool;

    /// 別名（typedef など）を含まない正規形かどうか
    fn is_canonical(&self, ty: &Self::Type) -> bool;

    /// 正規形
    fn canonical(&self, ty: &Self::Type) -> Self::Type;

    /// 最上位の修飾子
    fn qualifiers(&self, ty: &Self::Type) -> Qualifiers;

    /// 最上位の修飾子を外した型
    fn unqualified(&self, ty: &Self::Type) -> Self::Type;

    /// カテゴリと構成要素
    fn classify(&self, ty: &Self::Type) -> NativeKind<Self::Type>;

    /// トレース用の表示
    fn describe(&self, ty: &Self::Type) -> String {
        format!("{:?}", ty)
    }
}
