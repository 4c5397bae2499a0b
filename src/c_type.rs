//! C/C++ 型モデル
//!
//! 宣言パーサーが構築し、型レジストリが読む具体的な型表現。
//! 構造体・列挙の宣言は `CTypeContext` が所有し、型からは ID で参照する。
//! 名前的な型（struct/class/enum）は ID で同一性を判定するため、
//! 自己参照する構造体でも型の比較・ハッシュは停止する。

use std::fmt;
use std::rc::Rc;

use crate::native::{NativeBase, NativeKind, NativeMember, NativeParam, NativeTypeSource, RecordKey};
use crate::type_record::{ArraySize, PointerKind, Qualifiers};

/// 集成型宣言の ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u32);

/// 列挙宣言の ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumId(u32);

/// 型ノード
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CTypeNode {
    /// 型なし
    Null,
    /// 組み込み型（正規化された綴り）
    Builtin(String),
    Pointer {
        pointee: CType,
        kind: PointerKind,
    },
    Array {
        element: CType,
        size: ArraySize,
    },
    /// 関数型（パラメータ名は型の同一性に含めない）
    Function {
        return_type: CType,
        params: Vec<CType>,
        is_variadic: bool,
    },
    Record(RecordId),
    Enum(EnumId),
    /// typedef 名（別名）
    Typedef {
        name: String,
        aliased: CType,
    },
    /// _Complex 型
    Complex(CType),
    /// ベクトル型
    Vector {
        element: CType,
        lanes: u32,
    },
    /// 解決できない依存型
    Dependent(String),
}

/// 修飾子付きの型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CType {
    node: Rc<CTypeNode>,
    quals: Qualifiers,
}

impl CType {
    fn from_node(node: CTypeNode) -> Self {
        Self {
            node: Rc::new(node),
            quals: Qualifiers::NONE,
        }
    }

    /// 型なし
    pub fn null() -> Self {
        Self::from_node(CTypeNode::Null)
    }

    /// 組み込み型
    pub fn builtin(spelling: impl Into<String>) -> Self {
        Self::from_node(CTypeNode::Builtin(spelling.into()))
    }

    /// ポインタ
    pub fn pointer_to(pointee: CType) -> Self {
        Self::indirect(pointee, PointerKind::Pointer)
    }

    /// ポインタ・参照の種類を指定して作成
    pub fn indirect(pointee: CType, kind: PointerKind) -> Self {
        Self::from_node(CTypeNode::Pointer { pointee, kind })
    }

    /// 配列
    pub fn array_of(element: CType, size: ArraySize) -> Self {
        Self::from_node(CTypeNode::Array { element, size })
    }

    /// 関数
    pub fn function(return_type: CType, params: Vec<CType>, is_variadic: bool) -> Self {
        Self::from_node(CTypeNode::Function {
            return_type,
            params,
            is_variadic,
        })
    }

    /// 集成型
    pub fn record(id: RecordId) -> Self {
        Self::from_node(CTypeNode::Record(id))
    }

    /// 列挙型
    pub fn enumeration(id: EnumId) -> Self {
        Self::from_node(CTypeNode::Enum(id))
    }

    /// typedef 名
    pub fn typedef(name: impl Into<String>, aliased: CType) -> Self {
        Self::from_node(CTypeNode::Typedef {
            name: name.into(),
            aliased,
        })
    }

    /// _Complex 型
    pub fn complex(element: CType) -> Self {
        Self::from_node(CTypeNode::Complex(element))
    }

    /// ベクトル型
    pub fn vector(element: CType, lanes: u32) -> Self {
        Self::from_node(CTypeNode::Vector { element, lanes })
    }

    /// 依存型
    pub fn dependent(name: impl Into<String>) -> Self {
        Self::from_node(CTypeNode::Dependent(name.into()))
    }

    /// 修飾子を追加した型
    pub fn qualified(&self, quals: Qualifiers) -> Self {
        Self {
            node: Rc::clone(&self.node),
            quals: self.quals.union(quals),
        }
    }

    /// 修飾子を外した型
    pub fn unqualified(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
            quals: Qualifiers::NONE,
        }
    }

    pub fn node(&self) -> &CTypeNode {
        &self.node
    }

    pub fn quals(&self) -> Qualifiers {
        self.quals
    }

    pub fn is_function(&self) -> bool {
        matches!(*self.node, CTypeNode::Function { .. })
    }

    /// 別名を含むかどうか（深い判定）
    pub fn has_sugar(&self) -> bool {
        match &*self.node {
            CTypeNode::Typedef { .. } => true,
            CTypeNode::Pointer { pointee, .. } => pointee.has_sugar(),
            CTypeNode::Array { element, .. } => element.has_sugar(),
            CTypeNode::Function {
                return_type,
                params,
                ..
            } => return_type.has_sugar() || params.iter().any(CType::has_sugar),
            CTypeNode::Complex(element) | CTypeNode::Vector { element, .. } => {
                element.has_sugar()
            }
            CTypeNode::Null
            | CTypeNode::Builtin(_)
            | CTypeNode::Record(_)
            | CTypeNode::Enum(_)
            | CTypeNode::Dependent(_) => false,
        }
    }

    /// 別名をすべて展開した正規形
    pub fn desugar(&self) -> CType {
        if !self.has_sugar() {
            return self.clone();
        }
        let node = match &*self.node {
            CTypeNode::Typedef { aliased, .. } => {
                // 別名側の修飾子と参照側の修飾子を合わせる
                return aliased.desugar().qualified(self.quals);
            }
            CTypeNode::Pointer { pointee, kind } => CTypeNode::Pointer {
                pointee: pointee.desugar(),
                kind: *kind,
            },
            CTypeNode::Array { element, size } => CTypeNode::Array {
                element: element.desugar(),
                size: *size,
            },
            CTypeNode::Function {
                return_type,
                params,
                is_variadic,
            } => CTypeNode::Function {
                return_type: return_type.desugar(),
                params: params.iter().map(CType::desugar).collect(),
                is_variadic: *is_variadic,
            },
            CTypeNode::Complex(element) => CTypeNode::Complex(element.desugar()),
            CTypeNode::Vector { element, lanes } => CTypeNode::Vector {
                element: element.desugar(),
                lanes: *lanes,
            },
            other => other.clone(),
        };
        Self {
            node: Rc::new(node),
            quals: self.quals,
        }
    }
}

/// 集成型の宣言
#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub key: RecordKey,
    pub name: Option<String>,
    /// メンバー（不完全型なら None）
    pub members: Option<Vec<NativeMember<CType>>>,
    pub bases: Vec<NativeBase<CType>>,
}

impl RecordDecl {
    pub fn is_complete(&self) -> bool {
        self.members.is_some()
    }
}

/// 列挙の宣言
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Option<String>,
}

/// 型コンテキスト
///
/// 翻訳単位内の集成型・列挙の宣言を保持する。
#[derive(Debug, Default)]
pub struct CTypeContext {
    records: Vec<RecordDecl>,
    enums: Vec<EnumDecl>,
}

impl CTypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不完全な集成型を宣言
    pub fn declare_record(&mut self, key: RecordKey, name: Option<String>) -> RecordId {
        let id = RecordId(self.records.len() as u32);
        self.records.push(RecordDecl {
            key,
            name,
            members: None,
            bases: Vec::new(),
        });
        id
    }

    /// 集成型の定義を設定
    pub fn complete_record(
        &mut self,
        id: RecordId,
        members: Vec<NativeMember<CType>>,
        bases: Vec<NativeBase<CType>>,
    ) {
        if let Some(decl) = self.records.get_mut(id.0 as usize) {
            decl.members = Some(members);
            decl.bases = bases;
        }
    }

    pub fn record(&self, id: RecordId) -> Option<&RecordDecl> {
        self.records.get(id.0 as usize)
    }

    /// タグ名から集成型を探す（後の宣言を優先）
    pub fn find_record(&self, name: &str) -> Option<RecordId> {
        self.records
            .iter()
            .rposition(|r| r.name.as_deref() == Some(name))
            .map(|i| RecordId(i as u32))
    }

    /// 列挙を宣言
    pub fn declare_enum(&mut self, name: Option<String>) -> EnumId {
        let id = EnumId(self.enums.len() as u32);
        self.enums.push(EnumDecl { name });
        id
    }

    pub fn enum_decl(&self, id: EnumId) -> Option<&EnumDecl> {
        self.enums.get(id.0 as usize)
    }

    /// タグ名から列挙を探す
    pub fn find_enum(&self, name: &str) -> Option<EnumId> {
        self.enums
            .iter()
            .rposition(|e| e.name.as_deref() == Some(name))
            .map(|i| EnumId(i as u32))
    }

    /// 型を C 風の文字列で表示
    pub fn display<'a>(&'a self, ty: &'a CType) -> CTypeDisplay<'a> {
        CTypeDisplay { ctx: self, ty }
    }

    fn record_label(&self, id: RecordId) -> String {
        match self.record(id) {
            Some(decl) => {
                let key = match decl.key {
                    RecordKey::Struct => "struct",
                    RecordKey::Union => "union",
                    RecordKey::Class => "class",
                };
                match &decl.name {
                    Some(name) => format!("{} {}", key, name),
                    None => format!("{} <anonymous>", key),
                }
            }
            None => "<unknown record>".to_string(),
        }
    }

    fn enum_label(&self, id: EnumId) -> String {
        match self.enum_decl(id).and_then(|e| e.name.as_ref()) {
            Some(name) => format!("enum {}", name),
            None => "enum <anonymous>".to_string(),
        }
    }
}

/// `CTypeContext::display` の戻り値
pub struct CTypeDisplay<'a> {
    ctx: &'a CTypeContext,
    ty: &'a CType,
}

impl fmt::Display for CTypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quals = self.ty.quals.spelling();
        if !quals.is_empty() {
            write!(f, "{} ", quals)?;
        }
        match &*self.ty.node {
            CTypeNode::Null => write!(f, "<null>"),
            CTypeNode::Builtin(s) => write!(f, "{}", s),
            CTypeNode::Pointer { pointee, kind } => {
                let what = match kind {
                    PointerKind::Pointer => "pointer to",
                    PointerKind::LValueReference => "reference to",
                    PointerKind::RValueReference => "rvalue reference to",
                    PointerKind::Block => "block pointer to",
                    PointerKind::Member => "member pointer to",
                };
                write!(f, "{} {}", what, self.ctx.display(pointee))
            }
            CTypeNode::Array { element, size } => match size {
                ArraySize::Fixed(n) => write!(f, "array[{}] of {}", n, self.ctx.display(element)),
                ArraySize::Variable => write!(f, "array[] of {}", self.ctx.display(element)),
            },
            CTypeNode::Function {
                return_type,
                params,
                is_variadic,
            } => {
                write!(f, "function(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.ctx.display(param))?;
                }
                if *is_variadic {
                    write!(f, "{}...", if params.is_empty() { "" } else { ", " })?;
                }
                write!(f, ") returning {}", self.ctx.display(return_type))
            }
            CTypeNode::Record(id) => write!(f, "{}", self.ctx.record_label(*id)),
            CTypeNode::Enum(id) => write!(f, "{}", self.ctx.enum_label(*id)),
            CTypeNode::Typedef { name, .. } => write!(f, "{}", name),
            CTypeNode::Complex(element) => write!(f, "_Complex {}", self.ctx.display(element)),
            CTypeNode::Vector { element, lanes } => {
                write!(f, "vector[{}] of {}", lanes, self.ctx.display(element))
            }
            CTypeNode::Dependent(name) => write!(f, "{}", name),
        }
    }
}

impl NativeTypeSource for CTypeContext {
    type Type = CType;

    fn is_null(&self, ty: &CType) -> bool {
        matches!(*ty.node, CTypeNode::Null)
    }

    fn is_canonical(&self, ty: &CType) -> bool {
        !ty.has_sugar()
    }

    fn canonical(&self, ty: &CType) -> CType {
        ty.desugar()
    }

    fn qualifiers(&self, ty: &CType) -> Qualifiers {
        ty.quals
    }

    fn unqualified(&self, ty: &CType) -> CType {
        ty.unqualified()
    }

    fn classify(&self, ty: &CType) -> NativeKind<CType> {
        match &*ty.node {
            CTypeNode::Builtin(spelling) => NativeKind::Builtin {
                spelling: spelling.clone(),
            },
            CTypeNode::Pointer { pointee, kind } => NativeKind::Pointer {
                pointee: pointee.clone(),
                kind: *kind,
            },
            CTypeNode::Array { element, size } => NativeKind::Array {
                element: element.clone(),
                size: *size,
            },
            CTypeNode::Function {
                return_type,
                params,
                is_variadic,
            } => NativeKind::Function {
                return_type: return_type.clone(),
                params: params
                    .iter()
                    .map(|p| NativeParam {
                        ty: p.clone(),
                        name: None,
                    })
                    .collect(),
                is_variadic: *is_variadic,
            },
            CTypeNode::Record(id) => match self.record(*id) {
                Some(decl) => NativeKind::Record {
                    key: decl.key,
                    name: decl.name.clone(),
                    complete: decl.is_complete(),
                    members: decl.members.clone().unwrap_or_default(),
                    bases: decl.bases.clone(),
                },
                None => NativeKind::Other {
                    tag: "unknownRecordType".to_string(),
                    description: self.record_label(*id),
                },
            },
            CTypeNode::Enum(id) => NativeKind::Enum {
                name: self.enum_decl(*id).and_then(|e| e.name.clone()),
            },
            CTypeNode::Typedef { .. } => NativeKind::Other {
                tag: "typedefType".to_string(),
                description: self.describe(ty),
            },
            CTypeNode::Complex(_) => NativeKind::Other {
                tag: "complexType".to_string(),
                description: self.describe(ty),
            },
            CTypeNode::Vector { .. } => NativeKind::Other {
                tag: "vectorType".to_string(),
                description: self.describe(ty),
            },
            CTypeNode::Null | CTypeNode::Dependent(_) => NativeKind::Other {
                tag: "otherType".to_string(),
                description: self.describe(ty),
            },
        }
    }

    fn describe(&self, ty: &CType) -> String {
        self.display(ty).to_string()
    }
}
