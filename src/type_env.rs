//! 型環境モジュール
//!
//! 型テーブル文書を読み込み、識別子から型レコードを引けるようにする（逆方向）。
//! 環境は追記のみで、拡張すると親を変更せずに新しいエントリを重ねたビューを返す。

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::TableError;
use crate::fundamental;
use crate::id_alloc::UniqueNamer;
use crate::inheritance::InheritanceTable;
use crate::type_record::{
    BaseEdge, Member, NameSlot, Param, PointerKind, StructKey, TypeId, TypeKind, TypeRecord,
};
use crate::type_table::{self, BaseEntry, SymbolEntry, TypeEntry, TypeTableDoc};

/// 型環境
///
/// ルートは基本型だけを持つ。`extend` で作った子ビューは
/// 自分のエントリを先に探し、なければ親を探す。
#[derive(Debug)]
pub struct TypeEnv {
    parent: Option<Rc<TypeEnv>>,
    records: HashMap<TypeId, TypeRecord>,
    /// この層のエントリの文書順（基本型を除く）
    order: Vec<TypeId>,
    inheritance: InheritanceTable,
    namer: UniqueNamer,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    /// 基本型だけを持つ環境
    pub fn new() -> Self {
        Self::with_namer(UniqueNamer::new())
    }

    /// 名前生成器を指定して作成
    ///
    /// 同じ文書を扱うレジストリと namer を共有すると、無名型の名前が揃う。
    pub fn with_namer(namer: UniqueNamer) -> Self {
        let records = fundamental::iter()
            .map(|(ident, spelling)| {
                let id = TypeId::from(ident);
                (id.clone(), TypeRecord::reserved(id, spelling))
            })
            .collect();
        Self {
            parent: None,
            records,
            order: Vec::new(),
            inheritance: InheritanceTable::new(),
            namer,
        }
    }

    /// エントリ列から環境を構築
    pub fn from_entries(entries: &[TypeEntry]) -> Result<Self, TableError> {
        let mut env = Self::new();
        env.add_entries(entries)?;
        Ok(env)
    }

    /// 型テーブル文書から環境を構築
    pub fn from_doc(doc: &TypeTableDoc) -> Result<Self, TableError> {
        Self::from_entries(&doc.type_table)
    }

    /// エントリを追加する（同じ層での重複は後のエントリが勝つ）
    ///
    /// 文書中のタグは namer の使用済み名になり、無名型の生成名と衝突しない。
    pub fn add_entries(&mut self, entries: &[TypeEntry]) -> Result<(), TableError> {
        for entry in entries {
            if let Some(tag) = entry.attr(type_table::ATTR_TAG) {
                self.namer.reserve(tag);
            }
            let (record, edges) = record_from_entry(entry)?;
            let id = record.id.clone();
            if self.records.insert(id.clone(), record).is_none() || !self.order.contains(&id) {
                self.order.push(id.clone());
            }
            self.inheritance.replace(id, edges);
        }
        Ok(())
    }

    /// エントリを重ねた新しいビューを作る（親は変更しない）
    pub fn extend(self: &Rc<Self>, entries: &[TypeEntry]) -> Result<Rc<Self>, TableError> {
        let mut child = TypeEnv {
            parent: Some(Rc::clone(self)),
            records: HashMap::new(),
            order: Vec::new(),
            inheritance: InheritanceTable::new(),
            namer: self.namer.clone(),
        };
        child.add_entries(entries)?;
        Ok(Rc::new(child))
    }

    /// 識別子に対応するレコード
    pub fn lookup(&self, id: &TypeId) -> Option<&TypeRecord> {
        match self.records.get(id) {
            Some(record) => Some(record),
            None => self.parent.as_ref()?.lookup(id),
        }
    }

    pub fn contains(&self, id: &TypeId) -> bool {
        self.lookup(id).is_some()
    }

    /// 基底クラス辺（登録順）
    ///
    /// レコードを定義した層の情報を使う。
    pub fn base_edges(&self, id: &TypeId) -> &[BaseEdge] {
        if self.records.contains_key(id) {
            return self.inheritance.bases(id);
        }
        match &self.parent {
            Some(parent) => parent.base_edges(id),
            None => &[],
        }
    }

    /// 関数型の戻り値型
    pub fn return_type(&self, id: &TypeId) -> Option<&TypeId> {
        match &self.lookup(id)?.kind {
            TypeKind::Function { return_type, .. } => Some(return_type),
            _ => None,
        }
    }

    /// 型テーブル由来の識別子（文書順、親の層から）
    pub fn ids(&self) -> Vec<&TypeId> {
        let mut ids: Vec<&TypeId> = match &self.parent {
            Some(parent) => parent
                .ids()
                .into_iter()
                .filter(|id| !self.records.contains_key(*id))
                .collect(),
            None => Vec::new(),
        };
        ids.extend(self.order.iter());
        ids
    }

    /// 型テーブル由来のエントリ数
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn namer(&self) -> &UniqueNamer {
        &self.namer
    }
}

/// エントリをレコードと基底クラス辺に変換
fn record_from_entry(entry: &TypeEntry) -> Result<(TypeRecord, Vec<BaseEdge>), TableError> {
    let quals = entry.qualifiers()?;
    let edges = entry
        .bases
        .iter()
        .map(BaseEntry::to_edge)
        .collect::<Result<Vec<_>, _>>()?;
    let tag = || NameSlot::new(entry.attr(type_table::ATTR_TAG).map(str::to_string));
    // メンバーか基底があれば本体の定義があるものとみなす
    let complete = entry.flag(type_table::ATTR_IS_COMPLETE)?
        || !entry.symbols.is_empty()
        || !entry.bases.is_empty();

    let kind = match entry.kind.as_str() {
        type_table::BASIC_TYPE => TypeKind::Qualified {
            base: entry.type_ref(type_table::ATTR_NAME),
        },
        type_table::POINTER_TYPE => TypeKind::Pointer {
            pointee: entry.type_ref(type_table::ATTR_REF),
            kind: PointerKind::from_attr(entry.attr(type_table::ATTR_POINTER_KIND)),
        },
        type_table::FUNCTION_TYPE => TypeKind::Function {
            return_type: entry.type_ref(type_table::ATTR_RETURN_TYPE),
            params: entry
                .params
                .iter()
                .map(|p| Param {
                    ty: p.ty.clone(),
                    name: p.name.clone(),
                })
                .collect(),
            is_variadic: entry.flag(type_table::ATTR_IS_VARIADIC)?,
        },
        type_table::ARRAY_TYPE => TypeKind::Array {
            element: entry.type_ref(type_table::ATTR_ELEMENT_TYPE),
            size: entry.array_size()?,
        },
        type_table::STRUCT_TYPE => TypeKind::Struct {
            key: StructKey::Struct,
            tag: tag(),
            complete,
            members: members_from(&entry.symbols)?,
        },
        type_table::UNION_TYPE => TypeKind::Struct {
            key: StructKey::Union,
            tag: tag(),
            complete,
            members: members_from(&entry.symbols)?,
        },
        type_table::CLASS_TYPE => TypeKind::Class {
            name: tag(),
            complete,
            members: members_from(&entry.symbols)?,
            bases: edges.clone(),
        },
        type_table::ENUM_TYPE => TypeKind::Enum { tag: tag() },
        other => TypeKind::Other {
            opaque: other.to_string(),
        },
    };

    Ok((
        TypeRecord::new(entry.ty.clone(), kind).with_quals(quals),
        edges,
    ))
}

fn members_from(symbols: &[SymbolEntry]) -> Result<Vec<Member>, TableError> {
    symbols
        .iter()
        .map(|s| {
            Ok(Member {
                name: s.name.clone(),
                ty: s.ty.clone(),
                access: s.access_spec()?,
                bit_field: s.bit_width()?,
            })
        })
        .collect()
}
