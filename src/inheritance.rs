//! 継承情報のサイドテーブル
//!
//! クラスの識別子から基底クラス辺のリストへの対応。
//! 辺は登録順に保持し、並べ替えや重複除去はしない。

use std::collections::HashMap;

use crate::type_record::{BaseEdge, TypeId};

/// 継承テーブル
#[derive(Debug, Clone, Default)]
pub struct InheritanceTable {
    edges: HashMap<TypeId, Vec<BaseEdge>>,
}

impl InheritanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 派生クラスに基底クラス辺を追加
    pub fn add(&mut self, derived: TypeId, edge: BaseEdge) {
        self.edges.entry(derived).or_default().push(edge);
    }

    /// 基底クラス辺（登録順、なければ空）
    pub fn bases(&self, derived: &TypeId) -> &[BaseEdge] {
        self.edges.get(derived).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_bases(&self, derived: &TypeId) -> bool {
        !self.bases(derived).is_empty()
    }

    /// 派生クラスの辺をまとめて置き換える
    pub fn replace(&mut self, derived: TypeId, edges: Vec<BaseEdge>) {
        if edges.is_empty() {
            self.edges.remove(&derived);
        } else {
            self.edges.insert(derived, edges);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_record::AccessSpec;

    #[test]
    fn test_order_and_duplicates_preserved() {
        let mut table = InheritanceTable::new();
        let d = TypeId::from("Class2");
        table.add(d.clone(), BaseEdge::new(AccessSpec::Public, "Class0", false));
        table.add(d.clone(), BaseEdge::new(AccessSpec::Private, "Class1", true));
        table.add(d.clone(), BaseEdge::new(AccessSpec::Public, "Class0", false));

        let bases: Vec<_> = table.bases(&d).iter().map(|e| e.base.as_str()).collect();
        assert_eq!(bases, vec!["Class0", "Class1", "Class0"]);
        assert!(table.has_bases(&d));
        assert!(!table.has_bases(&TypeId::from("Class0")));
    }
}
