//! 型レジストリモジュール
//!
//! ネイティブ型に型テーブル上の識別子を割り当てる（順方向）。
//! 構造的に同じ型は同じ識別子にまとめ、構成要素の型も再帰的に登録する。
//!
//! 再帰の前に自分の識別子を予約するため、自己参照する構造体でも
//! 登録は停止し、同じ型に 2 つの識別子が付くことはない。

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::fundamental;
use crate::id_alloc::{Category, IdAllocator, UniqueNamer};
use crate::inheritance::InheritanceTable;
use crate::native::{NativeKind, NativeTypeSource, RecordKey};
use crate::type_record::{
    AccessSpec, ArraySize, BaseEdge, Member, NameSlot, Param, StructKey, TypeId, TypeKind,
    TypeRecord,
};
use crate::type_table::{self, BaseEntry, ParamEntry, SymbolEntry, TypeEntry, TypeTableDoc};
use crate::typename_map::TypeNameMap;

/// 登録済みの型
#[derive(Debug, Clone)]
struct Registered {
    record: TypeRecord,
    /// 出力グループ（基本型は None で出力しない）
    category: Option<Category>,
    /// 型テーブル上のエントリ種別
    entry_kind: String,
    /// トレース用の表示
    description: String,
}

/// 登録統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// カテゴリ別の登録数（出力順）
    pub per_category: Vec<(Category, usize)>,
    /// 登録された基本型の数
    pub fundamental: usize,
    /// 別名を含めたメモ化済みの型の数
    pub memoized: usize,
}

impl RegistryStats {
    /// 出力されるエントリの総数
    pub fn emitted(&self) -> usize {
        self.per_category.iter().map(|(_, n)| n).sum()
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .per_category
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(c, n)| format!("{}: {}", c.prefix(), n))
            .collect();
        write!(
            f,
            "{} entries ({}), {} fundamental, {} memoized",
            self.emitted(),
            if parts.is_empty() {
                "none".to_string()
            } else {
                parts.join(", ")
            },
            self.fundamental,
            self.memoized
        )
    }
}

/// 型レジストリ
///
/// 1 つの翻訳単位につき 1 つ作り、深さ優先の走査の中で使う。
pub struct TypeRegistry<'a, S: NativeTypeSource> {
    source: &'a S,
    /// ネイティブ型から識別子へのメモ（別名も含む）
    memo: HashMap<S::Type, TypeId>,
    entries: HashMap<TypeId, Registered>,
    /// 予約順の識別子（基本型を除く）
    order: Vec<TypeId>,
    alloc: IdAllocator,
    namer: UniqueNamer,
    inheritance: InheritanceTable,
    typename_map: Option<TypeNameMap>,
    use_label_type: bool,
    /// 登録ごとのトレース出力
    trace: bool,
    /// メモのヒットもトレース出力
    full_trace: bool,
}

impl<'a, S: NativeTypeSource> TypeRegistry<'a, S> {
    /// 新しいレジストリを作成
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            memo: HashMap::new(),
            entries: HashMap::new(),
            order: Vec::new(),
            alloc: IdAllocator::new(),
            namer: UniqueNamer::new(),
            inheritance: InheritanceTable::new(),
            typename_map: None,
            use_label_type: false,
            trace: false,
            full_trace: false,
        }
    }

    /// 無名型の名前生成器を共有する
    pub fn with_namer(mut self, namer: UniqueNamer) -> Self {
        self.namer = namer;
        self
    }

    /// 出力する識別子に型名置換マップを適用する
    pub fn with_typename_map(mut self, map: TypeNameMap) -> Self {
        self.typename_map = Some(map);
        self
    }

    /// トレース出力を設定
    pub fn set_trace(&mut self, trace: bool, full_trace: bool) {
        self.trace = trace || full_trace;
        self.full_trace = full_trace;
    }

    pub fn namer(&self) -> &UniqueNamer {
        &self.namer
    }

    /// 型を登録して識別子を返す
    ///
    /// 登録済みならメモ化された識別子を返す。別名は正規形と同じ識別子になる。
    pub fn register(&mut self, ty: &S::Type) -> TypeId {
        let source = self.source;

        if source.is_null(ty) {
            return TypeId::null();
        }

        if let Some(id) = self.memo.get(ty) {
            if self.full_trace {
                eprintln!("[trace] hit {} = {}", id, source.describe(ty));
            }
            return id.clone();
        }

        if !source.is_canonical(ty) {
            let canonical = source.canonical(ty);
            let id = self.register(&canonical);
            if self.full_trace {
                eprintln!("[trace] alias {} = {}", id, source.describe(ty));
            }
            self.memo.insert(ty.clone(), id.clone());
            return id;
        }

        // 修飾子は分類より先に見る
        let quals = source.qualifiers(ty);
        if !quals.is_empty() {
            // 修飾付きの識別子を先に予約し、修飾付きの自己参照でも再帰を止める
            let id = self.reserve(ty, Category::Basic);
            let base = self.register(&source.unqualified(ty));
            let record = TypeRecord::new(id.clone(), TypeKind::Qualified { base }).with_quals(quals);
            self.store(ty, record, Some(Category::Basic), type_table::BASIC_TYPE);
            return id;
        }

        match source.classify(ty) {
            NativeKind::Builtin { spelling } => {
                let ident = fundamental::ident_for_spelling(&spelling);
                if fundamental::is_fundamental(&ident) {
                    let id = TypeId::from(ident);
                    self.memo.insert(ty.clone(), id.clone());
                    if !self.entries.contains_key(&id) {
                        let record = TypeRecord::reserved(id.clone(), spelling);
                        self.store(ty, record, None, type_table::BASIC_TYPE);
                    }
                    id
                } else {
                    let id = self.reserve(ty, Category::Other);
                    let record = TypeRecord::new(id.clone(), TypeKind::Other { opaque: spelling });
                    self.store(ty, record, Some(Category::Other), "otherType");
                    id
                }
            }

            NativeKind::Pointer { pointee, kind } => {
                let id = self.reserve(ty, Category::Pointer);
                let pointee = self.register(&pointee);
                let record = TypeRecord::new(id.clone(), TypeKind::Pointer { pointee, kind });
                self.store(ty, record, Some(Category::Pointer), type_table::POINTER_TYPE);
                id
            }

            NativeKind::Array { element, size } => {
                let id = self.reserve(ty, Category::Array);
                let element = self.register(&element);
                let record = TypeRecord::new(id.clone(), TypeKind::Array { element, size });
                self.store(ty, record, Some(Category::Array), type_table::ARRAY_TYPE);
                id
            }

            NativeKind::Function {
                return_type,
                params,
                is_variadic,
            } => {
                let id = self.reserve(ty, Category::Function);
                let return_type = self.register(&return_type);
                let params = params
                    .iter()
                    .map(|p| Param {
                        ty: self.register(&p.ty),
                        name: p.name.clone(),
                    })
                    .collect();
                let record = TypeRecord::new(
                    id.clone(),
                    TypeKind::Function {
                        return_type,
                        params,
                        is_variadic,
                    },
                );
                self.store(ty, record, Some(Category::Function), type_table::FUNCTION_TYPE);
                id
            }

            NativeKind::Record {
                key,
                name,
                complete,
                members,
                bases,
            } => {
                let (category, entry_kind) = match key {
                    RecordKey::Struct => (Category::Struct, type_table::STRUCT_TYPE),
                    RecordKey::Union => (Category::Union, type_table::UNION_TYPE),
                    RecordKey::Class => (Category::Class, type_table::CLASS_TYPE),
                };
                let id = self.reserve(ty, category);

                let members: Vec<Member> = members
                    .iter()
                    .map(|m| Member {
                        name: m.name.clone(),
                        ty: self.register(&m.ty),
                        access: m.access,
                        bit_field: m.bit_field,
                    })
                    .collect();

                let mut edges = Vec::new();
                for base in &bases {
                    let edge = BaseEdge::new(base.access, self.register(&base.ty), base.is_virtual);
                    self.inheritance.add(id.clone(), edge.clone());
                    edges.push(edge);
                }

                if let Some(name) = &name {
                    self.namer.reserve(name);
                }
                let slot = NameSlot::new(name);
                let kind = match key {
                    RecordKey::Struct => TypeKind::Struct {
                        key: StructKey::Struct,
                        tag: slot,
                        complete,
                        members,
                    },
                    RecordKey::Union => TypeKind::Struct {
                        key: StructKey::Union,
                        tag: slot,
                        complete,
                        members,
                    },
                    RecordKey::Class => TypeKind::Class {
                        name: slot,
                        complete,
                        members,
                        bases: edges,
                    },
                };
                self.store(ty, TypeRecord::new(id.clone(), kind), Some(category), entry_kind);
                id
            }

            NativeKind::Enum { name } => {
                let id = self.reserve(ty, Category::Enum);
                if let Some(name) = &name {
                    self.namer.reserve(name);
                }
                let record = TypeRecord::new(
                    id.clone(),
                    TypeKind::Enum {
                        tag: NameSlot::new(name),
                    },
                );
                self.store(ty, record, Some(Category::Enum), type_table::ENUM_TYPE);
                id
            }

            NativeKind::Other { tag, description } => {
                let id = self.reserve(ty, Category::Other);
                let record = TypeRecord::new(id.clone(), TypeKind::Other { opaque: description });
                self.store(ty, record, Some(Category::Other), &tag);
                id
            }
        }
    }

    /// 型名置換を適用した識別子（未登録なら登録する）
    pub fn type_name(&mut self, ty: &S::Type) -> TypeId {
        let id = self.register(ty);
        self.emitted(&id)
    }

    /// 識別子を予約する（構成要素の登録より前に呼ぶ）
    fn reserve(&mut self, ty: &S::Type, category: Category) -> TypeId {
        let id = self.alloc.next(category);
        self.memo.insert(ty.clone(), id.clone());
        self.order.push(id.clone());
        if self.trace {
            eprintln!("[trace] register {} = {}", id, self.source.describe(ty));
        }
        id
    }

    fn store(
        &mut self,
        ty: &S::Type,
        record: TypeRecord,
        category: Option<Category>,
        entry_kind: &str,
    ) {
        let description = self.source.describe(ty);
        self.entries.insert(
            record.id.clone(),
            Registered {
                record,
                category,
                entry_kind: entry_kind.to_string(),
                description,
            },
        );
    }

    /// 登録済みの型の識別子
    pub fn lookup(&self, ty: &S::Type) -> Option<&TypeId> {
        self.memo.get(ty)
    }

    /// 識別子に対応するレコード
    pub fn record(&self, id: &TypeId) -> Option<&TypeRecord> {
        self.entries.get(id).map(|r| &r.record)
    }

    /// 集成型の名前（無名なら一意な名前をここで割り当てる）
    ///
    /// 集成型でない識別子や未登録の識別子は None。
    pub fn get_name(&self, id: &TypeId) -> Option<&str> {
        let slot = self.entries.get(id)?.record.name_slot()?;
        Some(slot.get_or_assign(&self.namer))
    }

    /// 基底クラスを追加
    pub fn add_inheritance(
        &mut self,
        derived: &S::Type,
        base: &S::Type,
        access: AccessSpec,
        is_virtual: bool,
    ) {
        let derived = self.register(derived);
        let base = self.register(base);
        let edge = BaseEdge::new(access, base, is_virtual);
        if let Some(Registered {
            record:
                TypeRecord {
                    kind: TypeKind::Class { bases, .. },
                    ..
                },
            ..
        }) = self.entries.get_mut(&derived)
        {
            bases.push(edge.clone());
        }
        self.inheritance.add(derived, edge);
    }

    /// 基底クラス辺（登録順）
    pub fn bases(&self, id: &TypeId) -> &[BaseEdge] {
        self.inheritance.bases(id)
    }

    pub fn has_base_class(&self, id: &TypeId) -> bool {
        self.inheritance.has_bases(id)
    }

    /// ラベル型（void へのポインタ）を出力する
    pub fn register_label_type(&mut self) {
        self.use_label_type = true;
    }

    /// 登録済みの識別子（予約順、基本型を除く）
    pub fn ids(&self) -> impl Iterator<Item = &TypeId> {
        self.order.iter()
    }

    /// 登録済みのレコード数（基本型を含む）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn emitted(&self, id: &TypeId) -> TypeId {
        match &self.typename_map {
            Some(map) => map.apply(id),
            None => id.clone(),
        }
    }

    /// 型テーブル文書を生成
    ///
    /// カテゴリごとにまとめ、カテゴリ内は登録順に並べる。
    /// 基本型は出力しない（読み込み側が既定で持っている）。
    pub fn to_table(&self) -> TypeTableDoc {
        let mut groups: BTreeMap<Category, Vec<TypeEntry>> = BTreeMap::new();
        for id in &self.order {
            let Some(registered) = self.entries.get(id) else {
                continue;
            };
            if let Some(category) = registered.category {
                groups
                    .entry(category)
                    .or_default()
                    .push(self.entry_for(registered));
            }
        }

        let mut doc = TypeTableDoc::new();
        for category in Category::ALL {
            if let Some(entries) = groups.remove(&category) {
                doc.type_table.extend(entries);
            }
            if category == Category::Pointer && self.use_label_type {
                let label = match &self.typename_map {
                    Some(map) => map.label_type(),
                    None => TypeId::from(crate::typename_map::LABEL_TYPE),
                };
                doc.type_table.push(
                    TypeEntry::new(type_table::POINTER_TYPE, label)
                        .with_attr(type_table::ATTR_REF, "void"),
                );
            }
        }
        doc
    }

    fn entry_for(&self, registered: &Registered) -> TypeEntry {
        let record = &registered.record;
        let mut entry = TypeEntry::new(registered.entry_kind.clone(), self.emitted(&record.id));
        entry.set_qualifiers(record.quals);

        match &record.kind {
            TypeKind::Reserved { .. } | TypeKind::Other { .. } => {}
            TypeKind::Qualified { base } => {
                entry = entry.with_attr(type_table::ATTR_NAME, self.emitted(base).as_str());
            }
            TypeKind::Pointer { pointee, kind } => {
                entry = entry.with_attr(type_table::ATTR_REF, self.emitted(pointee).as_str());
                if let Some(value) = kind.attr_value() {
                    entry = entry.with_attr(type_table::ATTR_POINTER_KIND, value);
                }
            }
            TypeKind::Function {
                return_type,
                params,
                is_variadic,
            } => {
                entry = entry.with_attr(
                    type_table::ATTR_RETURN_TYPE,
                    self.emitted(return_type).as_str(),
                );
                if *is_variadic {
                    entry = entry.with_attr(type_table::ATTR_IS_VARIADIC, "1");
                }
                entry.params = params
                    .iter()
                    .map(|p| ParamEntry {
                        ty: self.emitted(&p.ty),
                        name: p.name.clone(),
                    })
                    .collect();
            }
            TypeKind::Array { element, size } => {
                entry =
                    entry.with_attr(type_table::ATTR_ELEMENT_TYPE, self.emitted(element).as_str());
                if let ArraySize::Fixed(n) = size {
                    entry = entry.with_attr(type_table::ATTR_ARRAY_SIZE, n.to_string());
                }
            }
            TypeKind::Struct {
                tag,
                complete,
                members,
                ..
            } => {
                if let Some(tag) = tag.get() {
                    entry = entry.with_attr(type_table::ATTR_TAG, tag);
                }
                if *complete {
                    entry = entry.with_attr(type_table::ATTR_IS_COMPLETE, "1");
                }
                entry.symbols = self.member_entries(members);
            }
            TypeKind::Class {
                name,
                complete,
                members,
                ..
            } => {
                if let Some(name) = name.get() {
                    entry = entry.with_attr(type_table::ATTR_TAG, name);
                }
                if *complete {
                    entry = entry.with_attr(type_table::ATTR_IS_COMPLETE, "1");
                }
                entry.symbols = self.member_entries(members);
            }
            TypeKind::Enum { tag } => {
                if let Some(tag) = tag.get() {
                    entry = entry.with_attr(type_table::ATTR_TAG, tag);
                }
            }
        }

        entry.bases = self
            .inheritance
            .bases(&record.id)
            .iter()
            .map(|edge| {
                let mut base = BaseEntry::from_edge(edge);
                base.ty = self.emitted(&edge.base);
                base
            })
            .collect();

        entry
    }

    fn member_entries(&self, members: &[Member]) -> Vec<SymbolEntry> {
        members
            .iter()
            .map(|m| SymbolEntry {
                name: m.name.clone(),
                ty: self.emitted(&m.ty),
                access: m.access.map(|a| a.as_str().to_string()),
                bit_field: m.bit_field.map(|w| w.to_string()),
            })
            .collect()
    }

    /// 識別子とネイティブ型の対応を一覧にする（トレース用）
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for id in &self.order {
            if let Some(registered) = self.entries.get(id) {
                out.push_str(&format!("{}: {}\n", id, registered.description));
            }
        }
        out
    }

    /// 登録統計
    pub fn stats(&self) -> RegistryStats {
        let per_category = Category::ALL
            .iter()
            .map(|c| {
                let n = self
                    .entries
                    .values()
                    .filter(|r| r.category == Some(*c))
                    .count();
                (*c, n)
            })
            .collect();
        RegistryStats {
            per_category,
            fundamental: self.entries.values().filter(|r| r.category.is_none()).count(),
            memoized: self.memo.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c_type::{CType, CTypeContext};
    use crate::native::{NativeBase, NativeMember};
    use crate::type_record::{PointerKind, Qualifiers};

    fn int() -> CType {
        CType::builtin("int")
    }

    #[test]
    fn test_idempotent_registration() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        let p1 = reg.register(&CType::pointer_to(int()));
        let p2 = reg.register(&CType::pointer_to(int()));
        assert_eq!(p1, p2);
        assert_eq!(p1.as_str(), "Pointer0");
        assert_eq!(reg.ids().count(), 1);
    }

    #[test]
    fn test_null_type() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        assert!(reg.register(&CType::null()).is_null());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_fundamental_types_use_their_spelling() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        assert_eq!(reg.register(&CType::builtin("unsigned int")).as_str(), "unsigned_int");
        assert_eq!(reg.register(&CType::builtin("long long")).as_str(), "long_long");
        assert!(reg.to_table().type_table.is_empty());
        assert_eq!(reg.stats().fundamental, 2);
    }

    #[test]
    fn test_qualifier_separation() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        let plain = reg.register(&int());
        let c = reg.register(&int().qualified(Qualifiers::constant()));
        let c2 = reg.register(&int().qualified(Qualifiers::constant()));
        assert_eq!(plain.as_str(), "int");
        assert_eq!(c.as_str(), "Basic0");
        assert_eq!(c, c2);

        match &reg.record(&c).unwrap().kind {
            TypeKind::Qualified { base } => assert_eq!(base, &plain),
            other => panic!("unexpected {:?}", other),
        }

        let doc = reg.to_table();
        let entry = doc.entry("Basic0").unwrap();
        assert_eq!(entry.kind, "basicType");
        assert_eq!(entry.attr("name"), Some("int"));
        assert_eq!(entry.attr("is_const"), Some("1"));
    }

    #[test]
    fn test_alias_shares_identifier() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        let alias = CType::typedef("intptr", CType::pointer_to(int()));
        let a = reg.register(&alias);
        let b = reg.register(&CType::pointer_to(int()));
        assert_eq!(a, b);
        assert_eq!(reg.ids().count(), 1);
        assert_eq!(reg.lookup(&alias), Some(&a));
    }

    #[test]
    fn test_self_referential_struct() {
        let mut ctx = CTypeContext::new();
        let node = ctx.declare_record(RecordKey::Struct, Some("node".to_string()));
        let node_ty = CType::record(node);
        ctx.complete_record(
            node,
            vec![
                NativeMember {
                    name: Some("v".to_string()),
                    ty: int(),
                    access: None,
                    bit_field: None,
                },
                NativeMember {
                    name: Some("next".to_string()),
                    ty: CType::pointer_to(node_ty.clone()),
                    access: None,
                    bit_field: None,
                },
            ],
            Vec::new(),
        );

        let mut reg = TypeRegistry::new(&ctx);
        let id = reg.register(&node_ty);
        assert_eq!(id.as_str(), "Struct0");
        let ptr = reg.lookup(&CType::pointer_to(node_ty)).cloned().unwrap();
        assert_eq!(ptr.as_str(), "Pointer0");
        match &reg.record(&ptr).unwrap().kind {
            TypeKind::Pointer { pointee, .. } => assert_eq!(pointee, &id),
            other => panic!("unexpected {:?}", other),
        }
        for record_id in reg.ids() {
            let record = reg.record(record_id).unwrap();
            assert!(record.direct_refs().iter().all(|r| *r != record_id));
        }
    }

    #[test]
    fn test_qualified_self_reference_gets_one_identifier() {
        let mut ctx = CTypeContext::new();
        let s = ctx.declare_record(RecordKey::Struct, Some("S".to_string()));
        let s_ty = CType::record(s);
        ctx.complete_record(
            s,
            vec![NativeMember {
                name: Some("p".to_string()),
                ty: CType::pointer_to(s_ty.qualified(Qualifiers::constant())),
                access: None,
                bit_field: None,
            }],
            Vec::new(),
        );

        let mut reg = TypeRegistry::new(&ctx);
        reg.register(&s_ty);
        let ids: Vec<_> = reg.ids().map(|i| i.as_str().to_string()).collect();
        assert_eq!(ids, vec!["Struct0", "Pointer0", "Basic0"]);
        match &reg.record(&TypeId::from("Basic0")).unwrap().kind {
            TypeKind::Qualified { base } => assert_eq!(base.as_str(), "Struct0"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_naming_is_stable() {
        let mut ctx = CTypeContext::new();
        let anon = ctx.declare_record(RecordKey::Struct, None);
        ctx.complete_record(anon, Vec::new(), Vec::new());
        let named = ctx.declare_record(RecordKey::Union, Some("u".to_string()));

        let mut reg = TypeRegistry::new(&ctx);
        let a = reg.register(&CType::record(anon));
        let u = reg.register(&CType::record(named));
        let p = reg.register(&CType::pointer_to(int()));

        assert_eq!(reg.get_name(&a), Some("__anon_1"));
        assert_eq!(reg.get_name(&a), Some("__anon_1"));
        assert_eq!(reg.get_name(&u), Some("u"));
        assert_eq!(reg.get_name(&p), None);
        assert_eq!(reg.namer().issued(), 1);

        // 割り当て後はタグとして出力される
        let doc = reg.to_table();
        assert_eq!(doc.entry("Struct0").unwrap().attr("tag"), Some("__anon_1"));
    }

    #[test]
    fn test_class_bases_recorded() {
        let mut ctx = CTypeContext::new();
        let a = ctx.declare_record(RecordKey::Class, Some("A".to_string()));
        let b = ctx.declare_record(RecordKey::Class, Some("B".to_string()));
        let d = ctx.declare_record(RecordKey::Class, Some("D".to_string()));
        ctx.complete_record(a, Vec::new(), Vec::new());
        ctx.complete_record(b, Vec::new(), Vec::new());
        ctx.complete_record(
            d,
            Vec::new(),
            vec![
                NativeBase {
                    ty: CType::record(a),
                    access: AccessSpec::Public,
                    is_virtual: false,
                },
                NativeBase {
                    ty: CType::record(b),
                    access: AccessSpec::Private,
                    is_virtual: true,
                },
            ],
        );

        let mut reg = TypeRegistry::new(&ctx);
        let d_id = reg.register(&CType::record(d));
        assert_eq!(d_id.as_str(), "Class0");
        let bases: Vec<_> = reg.bases(&d_id).iter().map(|e| e.base.as_str()).collect();
        assert_eq!(bases, vec!["Class1", "Class2"]);
        assert!(reg.has_base_class(&d_id));

        // 追加の基底クラスは末尾に並ぶ
        reg.add_inheritance(&CType::record(d), &CType::record(a), AccessSpec::Protected, false);
        assert_eq!(reg.bases(&d_id).len(), 3);
        match &reg.record(&d_id).unwrap().kind {
            TypeKind::Class { bases, .. } => assert_eq!(bases.len(), 3),
            other => panic!("unexpected {:?}", other),
        }

        let doc = reg.to_table();
        let entry = doc.entry("Class0").unwrap();
        assert_eq!(entry.bases.len(), 3);
        assert_eq!(entry.bases[1].is_virtual.as_deref(), Some("1"));
        assert_eq!(entry.bases[2].access, "protected");
    }

    #[test]
    fn test_unknown_category_gets_other_record() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        let id = reg.register(&CType::complex(CType::builtin("double")));
        assert_eq!(id.as_str(), "Other0");
        let doc = reg.to_table();
        assert_eq!(doc.entry("Other0").unwrap().kind, "complexType");

        let odd = reg.register(&CType::builtin("__fp16"));
        assert_eq!(odd.as_str(), "Other1");
    }

    #[test]
    fn test_table_group_order() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        let f = CType::function(int(), vec![CType::builtin("char")], true);
        reg.register(&CType::array_of(CType::pointer_to(f), ArraySize::Fixed(4)));
        reg.register(&CType::indirect(int(), PointerKind::LValueReference));
        reg.register(&CType::builtin("char").qualified(Qualifiers::constant()));
        reg.register_label_type();

        let doc = reg.to_table();
        let order: Vec<_> = doc.type_table.iter().map(|e| e.ty.as_str()).collect();
        assert_eq!(
            order,
            vec!["Basic0", "Pointer0", "Pointer1", "Label", "Array0", "Function0"]
        );
        let func = doc.entry("Function0").unwrap();
        assert_eq!(func.attr("is_variadic"), Some("1"));
        assert_eq!(func.params.len(), 1);
        assert_eq!(
            doc.entry("Pointer1").unwrap().attr("pointer_kind"),
            Some("lvalue_reference")
        );
        assert_eq!(doc.entry("Array0").unwrap().attr("array_size"), Some("4"));
    }

    #[test]
    fn test_typename_map_applies_to_emitted_ids() {
        let ctx = CTypeContext::new();
        let mut map = TypeNameMap::new();
        map.insert("unsigned_int", "unsigned");
        let mut reg = TypeRegistry::new(&ctx).with_typename_map(map);
        let id = reg.type_name(&CType::builtin("unsigned int"));
        assert_eq!(id.as_str(), "unsigned");

        reg.register(&CType::pointer_to(CType::builtin("unsigned int")));
        let doc = reg.to_table();
        assert_eq!(doc.entry("Pointer0").unwrap().attr("ref"), Some("unsigned"));
    }

    #[test]
    fn test_stats_and_dump() {
        let ctx = CTypeContext::new();
        let mut reg = TypeRegistry::new(&ctx);
        reg.register(&CType::pointer_to(CType::pointer_to(int())));
        let stats = reg.stats();
        assert_eq!(stats.emitted(), 2);
        assert_eq!(stats.fundamental, 1);
        assert_eq!(
            stats.to_string(),
            "2 entries (Pointer: 2), 1 fundamental, 3 memoized"
        );
        assert_eq!(
            reg.dump(),
            "Pointer0: pointer to pointer to int\nPointer1: pointer to int\n"
        );
    }
}
