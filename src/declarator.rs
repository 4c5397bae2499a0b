//! 宣言子の合成
//!
//! 型環境の識別子と変数名から宣言テキストを組み立てる。
//! 宣言子は内側から外側へ向かって組み立てる: ポインタは名前の前に `*` を付け、
//! 関数・配列は名前の後ろに `(...)` / `[...]` を付けてから参照先の型へ再帰する。
//!
//! 解決できない識別子はエラーにせず `INCOMPLETE_TYPE *name` に置き換える。

use std::collections::HashSet;

use crate::code_fragment::CodeFragment;
use crate::type_env::TypeEnv;
use crate::type_record::{ArraySize, Member, Qualifiers, TypeId, TypeKind, TypeRecord};
use crate::type_table::SymbolEntry;

/// 不完全型の代替綴り
pub const INCOMPLETE_TYPE: &str = "INCOMPLETE_TYPE";

/// 不完全型の代替宣言
pub fn incomplete(name: &str) -> CodeFragment {
    CodeFragment::token(format!("{} *{}", INCOMPLETE_TYPE, name))
}

impl TypeEnv {
    /// `name` を型 `id` として宣言するテキスト
    pub fn declare(&self, id: &TypeId, name: &str) -> CodeFragment {
        let mut path = Vec::new();
        self.declare_with(id, name.to_string(), Qualifiers::NONE, &mut path)
    }

    /// 抽象宣言子（名前なしの型名）
    pub fn type_string(&self, id: &TypeId) -> CodeFragment {
        self.declare(id, "")
    }

    /// `path` は展開中の識別子。壊れた文書の循環を検出する
    fn declare_with(
        &self,
        id: &TypeId,
        name: String,
        quals: Qualifiers,
        path: &mut Vec<TypeId>,
    ) -> CodeFragment {
        let Some(record) = self.lookup(id) else {
            return incomplete(&name);
        };
        if path.contains(id) {
            return incomplete(&name);
        }
        path.push(id.clone());

        let quals = quals.union(record.quals);
        let decl = match &record.kind {
            TypeKind::Reserved { spelling } => CodeFragment::new()
                .then(quals.spelling())
                .then(spelling)
                .then(&name),

            TypeKind::Qualified { base } => {
                if self.contains(base) {
                    self.declare_with(base, name, quals, path)
                } else {
                    incomplete(&name)
                }
            }

            TypeKind::Pointer { pointee, kind } => {
                if !self.contains(pointee) {
                    incomplete(&name)
                } else {
                    // 修飾子はポインタ自身に付く: `*const p`
                    let inner = if quals.is_empty() {
                        format!("{}{}", kind.sigil(), name)
                    } else {
                        CodeFragment::token(format!("{}{}", kind.sigil(), quals.spelling()))
                            .then(&name)
                            .into_string()
                    };
                    let inner = if self.binds_tighter(pointee) {
                        format!("({})", inner)
                    } else {
                        inner
                    };
                    self.declare_with(pointee, inner, Qualifiers::NONE, path)
                }
            }

            TypeKind::Function {
                return_type,
                params,
                is_variadic,
            } => {
                let resolved =
                    self.contains(return_type) && params.iter().all(|p| self.contains(&p.ty));
                if !resolved {
                    incomplete(&name)
                } else {
                    // 関数型への修飾子は無視する
                    let mut parts: Vec<CodeFragment> = params
                        .iter()
                        .map(|p| {
                            let pname = p.name.clone().unwrap_or_default();
                            self.declare_with(&p.ty, pname, Qualifiers::NONE, path)
                        })
                        .collect();
                    if *is_variadic {
                        parts.push(CodeFragment::token("..."));
                    }
                    let inner = format!("{}({})", name, CodeFragment::join(", ", parts));
                    self.declare_with(return_type, inner, Qualifiers::NONE, path)
                }
            }

            TypeKind::Array { element, size } => {
                if !self.contains(element) {
                    incomplete(&name)
                } else {
                    let inner = match size {
                        ArraySize::Fixed(n) => format!("{}[{}]", name, n),
                        ArraySize::Variable => format!("{}[]", name),
                    };
                    // 配列への修飾子は要素型に付く
                    self.declare_with(element, inner, quals, path)
                }
            }

            TypeKind::Struct { key, tag, .. } => CodeFragment::new()
                .then(quals.spelling())
                .then(key.keyword())
                .then(tag.get_or_assign(self.namer()))
                .then(&name),

            TypeKind::Class { name: slot, .. } => CodeFragment::new()
                .then(quals.spelling())
                .then("class")
                .then(slot.get_or_assign(self.namer()))
                .then(&name),

            TypeKind::Enum { tag } => CodeFragment::new()
                .then(quals.spelling())
                .then("enum")
                .then(tag.get_or_assign(self.namer()))
                .then(&name),

            TypeKind::Other { .. } => incomplete(&name),
        };

        path.pop();
        decl
    }

    /// 参照先が関数・配列で、ポインタ宣言子に括弧が必要か
    fn binds_tighter(&self, id: &TypeId) -> bool {
        let mut current = id;
        // 修飾付き型は構造を非修飾型に委ねる
        for _ in 0..8 {
            match self.lookup(current).map(|r| &r.kind) {
                Some(TypeKind::Qualified { base }) => current = base,
                Some(TypeKind::Function { .. }) | Some(TypeKind::Array { .. }) => return true,
                _ => return false,
            }
        }
        false
    }

    /// 集成型の名前（無名なら一意な名前をここで割り当てる）
    ///
    /// struct / union / class / enum 以外は None。
    pub fn aggregate_name(&self, id: &TypeId) -> Option<&str> {
        let slot = self.lookup(id)?.name_slot()?;
        Some(slot.get_or_assign(self.namer()))
    }

    /// 基底クラス指定 `public A, private virtual B`（先頭の `:` は含まない）
    pub fn bases(&self, id: &TypeId) -> CodeFragment {
        let parts = self.base_edges(id).iter().map(|edge| {
            let name = match self.lookup(&edge.base).map(|r| &r.kind) {
                Some(TypeKind::Struct { .. }) | Some(TypeKind::Class { .. }) => self
                    .aggregate_name(&edge.base)
                    .map(CodeFragment::token),
                _ => None,
            };
            CodeFragment::token(edge.access.as_str())
                .then(if edge.is_virtual { "virtual" } else { "" })
                .then(name.unwrap_or_else(|| incomplete("")))
        });
        CodeFragment::join(", ", parts)
    }

    /// 前方宣言 `struct S;`（struct / union / class 以外は None）
    ///
    /// C では列挙型を前方宣言できないため enum も None。
    pub fn forward_declaration(&self, id: &TypeId) -> Option<CodeFragment> {
        let keyword = match &self.lookup(id)?.kind {
            TypeKind::Struct { key, .. } => key.keyword(),
            TypeKind::Class { .. } => "class",
            _ => return None,
        };
        let name = self.aggregate_name(id)?;
        Some(CodeFragment::token(keyword).then(format!("{};", name)))
    }

    /// 集成型の完全な定義（struct / union / class 以外は None）
    pub fn define(&self, id: &TypeId) -> Option<CodeFragment> {
        let record = self.lookup(id)?;
        let name = self.aggregate_name(id)?;

        let mut def = match &record.kind {
            TypeKind::Struct { key, members, .. } => {
                let mut def = CodeFragment::token(key.keyword()).then(name).then("{");
                for member in members {
                    def = def.then(self.member_declaration(member));
                }
                def
            }
            TypeKind::Class { members, .. } => {
                let mut def = CodeFragment::token("class").then(name);
                let bases = self.bases(id);
                if !bases.is_empty() {
                    def = def.then(":").then(bases);
                }
                def = def.then("{");
                let mut current = None;
                for member in members {
                    match member.access {
                        Some(access) => {
                            if current != Some(access) {
                                def = def.then(format!("{}:", access));
                                current = Some(access);
                            }
                            def = def.then(self.member_declaration(member));
                        }
                        None => {
                            def = def.then("/* Ignored a member with no access specifier */");
                        }
                    }
                }
                def
            }
            _ => return None,
        };
        def = def.then("};");
        Some(def)
    }

    /// 定義を出力する集成型の並び
    ///
    /// 本体を持つ struct / union / class を文書順に並べ、値として含む
    /// メンバーの型と基底クラスを先に置く（後順の深さ優先）。
    /// ポインタの参照先はたどらない。
    pub fn definition_order(&self) -> Vec<&TypeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for id in self.ids() {
            self.visit_definition(id, &mut visited, &mut order);
        }
        order
    }

    fn visit_definition<'e>(
        &'e self,
        id: &'e TypeId,
        visited: &mut HashSet<&'e TypeId>,
        order: &mut Vec<&'e TypeId>,
    ) {
        let Some(record) = self.lookup(id) else {
            return;
        };
        if !record.is_complete_aggregate() || !visited.insert(&record.id) {
            return;
        }
        for dep in self.value_dependencies(record) {
            self.visit_definition(dep, visited, order);
        }
        order.push(&record.id);
    }

    /// 定義より先に完全型である必要がある集成型
    fn value_dependencies<'e>(&'e self, record: &'e TypeRecord) -> Vec<&'e TypeId> {
        let refs: Vec<&TypeId> = match &record.kind {
            TypeKind::Struct { members, .. } => members.iter().map(|m| &m.ty).collect(),
            TypeKind::Class { members, bases, .. } => members
                .iter()
                .map(|m| &m.ty)
                .chain(bases.iter().map(|b| &b.base))
                .collect(),
            _ => Vec::new(),
        };
        refs.into_iter()
            .filter_map(|id| self.aggregate_by_value(id))
            .collect()
    }

    /// 修飾子と配列を外した先の集成型（ポインタや関数なら None）
    fn aggregate_by_value<'e>(&'e self, id: &'e TypeId) -> Option<&'e TypeId> {
        let mut current = id;
        let mut seen = Vec::new();
        while !seen.contains(&current) {
            seen.push(current);
            let record = self.lookup(current)?;
            match &record.kind {
                TypeKind::Qualified { base } => current = base,
                TypeKind::Array { element, .. } => current = element,
                TypeKind::Struct { .. } | TypeKind::Class { .. } => return Some(&record.id),
                _ => return None,
            }
        }
        None
    }

    fn member_declaration(&self, member: &Member) -> CodeFragment {
        let name = member.name.as_deref().unwrap_or("");
        let decl = self.declare(&member.ty, name);
        let decl = match member.bit_field {
            Some(width) => decl.then(format!(": {}", width)),
            None => decl,
        };
        CodeFragment::token(format!("{};", decl))
    }

    /// グローバルシンボルの宣言文
    pub fn render_symbols(&self, symbols: &[SymbolEntry]) -> Vec<CodeFragment> {
        symbols
            .iter()
            .map(|s| {
                let decl = self.declare(&s.ty, s.name.as_deref().unwrap_or(""));
                CodeFragment::token(format!("{};", decl))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_table::{self, BaseEntry, TypeEntry, ATTR_REF, ATTR_TAG};

    fn entry(kind: &str, id: &str) -> TypeEntry {
        TypeEntry::new(kind, TypeId::from(id))
    }

    #[test]
    fn test_reserved() {
        let env = TypeEnv::new();
        assert_eq!(env.declare(&TypeId::from("unsigned_long"), "n"), "unsigned long n");
        assert_eq!(env.type_string(&TypeId::from("int")), "int");
    }

    #[test]
    fn test_pointer_to_function() {
        let env = TypeEnv::from_entries(&[
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "Function0"),
            entry(type_table::FUNCTION_TYPE, "Function0")
                .with_attr(type_table::ATTR_RETURN_TYPE, "int"),
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Pointer0"), "V"), "int (*V)()");
        assert_eq!(env.type_string(&TypeId::from("Pointer0")), "int (*)()");
    }

    #[test]
    fn test_const_pointer() {
        let mut const_ptr = entry(type_table::BASIC_TYPE, "Basic0").with_attr("name", "Pointer0");
        const_ptr.set_qualifiers(Qualifiers::constant());
        let env = TypeEnv::from_entries(&[
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "char"),
            const_ptr,
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Basic0"), "p"), "char *const p");
    }

    #[test]
    fn test_array_of_const_elements() {
        let mut const_array = entry(type_table::BASIC_TYPE, "Basic0").with_attr("name", "Array0");
        const_array.set_qualifiers(Qualifiers::constant());
        let env = TypeEnv::from_entries(&[
            entry(type_table::ARRAY_TYPE, "Array0")
                .with_attr(type_table::ATTR_ELEMENT_TYPE, "int")
                .with_attr(type_table::ATTR_ARRAY_SIZE, "3"),
            const_array,
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Basic0"), "a"), "const int a[3]");
    }

    #[test]
    fn test_pointer_to_array() {
        let env = TypeEnv::from_entries(&[
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "Array0"),
            entry(type_table::ARRAY_TYPE, "Array0")
                .with_attr(type_table::ATTR_ELEMENT_TYPE, "int")
                .with_attr(type_table::ATTR_ARRAY_SIZE, "4"),
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Pointer0"), "rows"), "int (*rows)[4]");
    }

    #[test]
    fn test_missing_identifier() {
        let env = TypeEnv::new();
        assert_eq!(env.declare(&TypeId::from("Pointer9"), "v"), "INCOMPLETE_TYPE *v");
        let env = TypeEnv::from_entries(&[
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "Struct7")
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Pointer0"), "v"), "INCOMPLETE_TYPE *v");
    }

    #[test]
    fn test_cyclic_table_terminates() {
        let env = TypeEnv::from_entries(&[
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "Pointer1"),
            entry(type_table::POINTER_TYPE, "Pointer1").with_attr(ATTR_REF, "Pointer0"),
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Pointer0"), "p"), "INCOMPLETE_TYPE ***p");
    }

    #[test]
    fn test_enum_and_union() {
        let env = TypeEnv::from_entries(&[
            entry(type_table::ENUM_TYPE, "Enum0").with_attr(ATTR_TAG, "color"),
            entry(type_table::UNION_TYPE, "Union0"),
        ])
        .unwrap();
        assert_eq!(env.declare(&TypeId::from("Enum0"), "c"), "enum color c");
        assert_eq!(env.declare(&TypeId::from("Union0"), "u"), "union __anon_1 u");
        assert_eq!(env.declare(&TypeId::from("Union0"), "w"), "union __anon_1 w");
        assert!(env.forward_declaration(&TypeId::from("Enum0")).is_none());
        assert_eq!(
            env.forward_declaration(&TypeId::from("Union0")).unwrap(),
            "union __anon_1;"
        );
    }

    #[test]
    fn test_bases_and_define() {
        let mut derived = entry(type_table::CLASS_TYPE, "Class2").with_attr(ATTR_TAG, "D");
        derived.bases = vec![
            BaseEntry {
                access: "public".to_string(),
                ty: TypeId::from("Class0"),
                is_virtual: None,
            },
            BaseEntry {
                access: "private".to_string(),
                ty: TypeId::from("Class1"),
                is_virtual: Some("1".to_string()),
            },
            BaseEntry {
                access: "protected".to_string(),
                ty: TypeId::from("Pointer0"),
                is_virtual: None,
            },
        ];
        derived.symbols.push(SymbolEntry {
            name: Some("x".to_string()),
            ty: TypeId::from("int"),
            access: Some("public".to_string()),
            bit_field: None,
        });
        let env = TypeEnv::from_entries(&[
            entry(type_table::CLASS_TYPE, "Class0").with_attr(ATTR_TAG, "A"),
            entry(type_table::CLASS_TYPE, "Class1").with_attr(ATTR_TAG, "B"),
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "int"),
            derived,
        ])
        .unwrap();

        let id = TypeId::from("Class2");
        assert_eq!(
            env.bases(&id),
            "public A, private virtual B, protected INCOMPLETE_TYPE *"
        );
        assert_eq!(
            env.define(&id).unwrap(),
            "class D : public A, private virtual B, protected INCOMPLETE_TYPE * { public: int x; };"
        );
        assert_eq!(env.forward_declaration(&id).unwrap(), "class D;");
        assert!(env.bases(&TypeId::from("Class0")).is_empty());
    }

    #[test]
    fn test_define_struct_with_bit_fields() {
        let mut flags = entry(type_table::STRUCT_TYPE, "Struct0").with_attr(ATTR_TAG, "flags");
        flags.symbols = vec![
            SymbolEntry {
                name: Some("ready".to_string()),
                ty: TypeId::from("unsigned_int"),
                access: None,
                bit_field: Some("1".to_string()),
            },
            SymbolEntry {
                name: None,
                ty: TypeId::from("unsigned_int"),
                access: None,
                bit_field: Some("3".to_string()),
            },
        ];
        let env = TypeEnv::from_entries(&[flags]).unwrap();
        assert_eq!(
            env.define(&TypeId::from("Struct0")).unwrap(),
            "struct flags { unsigned int ready : 1; unsigned int : 3; };"
        );
    }

    fn member(name: &str, ty: &str) -> SymbolEntry {
        SymbolEntry::new(name, TypeId::from(ty))
    }

    #[test]
    fn test_definition_order_puts_value_members_first() {
        let mut outer = entry(type_table::STRUCT_TYPE, "Struct0").with_attr(ATTR_TAG, "S");
        outer.symbols = vec![
            member("u", "Union0"),
            member("cells", "Array0"),
            member("next", "Pointer0"),
        ];
        let mut cell = entry(type_table::STRUCT_TYPE, "Struct1").with_attr(ATTR_TAG, "cell");
        cell.symbols = vec![member("v", "int")];
        let mut number = entry(type_table::UNION_TYPE, "Union0").with_attr(ATTR_TAG, "U");
        number.symbols = vec![member("i", "int")];
        let mut linked = entry(type_table::STRUCT_TYPE, "Struct2").with_attr(ATTR_TAG, "link");
        linked.symbols = vec![member("v", "int")];
        let env = TypeEnv::from_entries(&[
            outer,
            cell,
            linked,
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "Struct2"),
            entry(type_table::ARRAY_TYPE, "Array0")
                .with_attr(type_table::ATTR_ELEMENT_TYPE, "Struct1")
                .with_attr(type_table::ATTR_ARRAY_SIZE, "2"),
            number,
            entry(type_table::STRUCT_TYPE, "Struct3").with_attr(ATTR_TAG, "opaque"),
        ])
        .unwrap();

        let order: Vec<&str> = env.definition_order().iter().map(|id| id.as_str()).collect();
        // ポインタの先 (link) は後ろのまま、不完全な opaque は出ない
        assert_eq!(order, vec!["Union0", "Struct1", "Struct0", "Struct2"]);
    }

    #[test]
    fn test_empty_complete_class_is_defined() {
        let env = TypeEnv::from_entries(&[
            entry(type_table::CLASS_TYPE, "Class0")
                .with_attr(ATTR_TAG, "Mixin")
                .with_attr(type_table::ATTR_IS_COMPLETE, "1"),
            entry(type_table::CLASS_TYPE, "Class1").with_attr(ATTR_TAG, "Opaque"),
        ])
        .unwrap();
        let order: Vec<&str> = env.definition_order().iter().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["Class0"]);
        assert_eq!(env.define(&TypeId::from("Class0")).unwrap(), "class Mixin { };");
    }

    #[test]
    fn test_render_symbols() {
        let env = TypeEnv::from_entries(&[
            entry(type_table::POINTER_TYPE, "Pointer0").with_attr(ATTR_REF, "char"),
            entry(type_table::ARRAY_TYPE, "Array0")
                .with_attr(type_table::ATTR_ELEMENT_TYPE, "Pointer0"),
        ])
        .unwrap();
        let decls = env.render_symbols(&[SymbolEntry::new("argv", TypeId::from("Array0"))]);
        assert_eq!(decls, vec![CodeFragment::token("char *argv[];")]);
    }
}
