//! 識別子の割り当て
//!
//! カテゴリごとの連番カウンタと、無名集成型に付ける一意名のカウンタ。
//! どちらも文書単位のコンテキストオブジェクトで、グローバル状態は持たない。

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::type_record::TypeId;

/// 型のカテゴリ
///
/// 宣言順は型テーブルへの出力順を兼ねる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Basic,
    Pointer,
    Array,
    Struct,
    Union,
    Enum,
    Class,
    Function,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Basic,
        Category::Pointer,
        Category::Array,
        Category::Struct,
        Category::Union,
        Category::Enum,
        Category::Class,
        Category::Function,
        Category::Other,
    ];

    /// 識別子の接頭辞
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::Basic => "Basic",
            Category::Pointer => "Pointer",
            Category::Array => "Array",
            Category::Struct => "Struct",
            Category::Union => "Union",
            Category::Enum => "Enum",
            Category::Class => "Class",
            Category::Function => "Function",
            Category::Other => "Other",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// カテゴリ別の連番による識別子アロケータ
///
/// カウンタは単調増加で、割り当て済みの番号は再利用しない。
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: [u32; 9],
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい識別子を割り当てる
    pub fn next(&mut self, category: Category) -> TypeId {
        let seq = &mut self.counters[category.index()];
        let id = TypeId::new(format!("{}{}", category.prefix(), seq));
        *seq += 1;
        id
    }
}

/// 無名集成型の名前生成器
///
/// clone したハンドルはカウンタと使用済み名を共有する。順方向と逆方向で
/// 同じ文書を扱う場合に同じ namer を渡すと名前の一貫性が保たれる。
///
/// 文書にすでに現れるタグは `reserve` で登録しておくと生成名から外れる。
#[derive(Debug, Clone, Default)]
pub struct UniqueNamer {
    counter: Rc<Cell<u32>>,
    taken: Rc<RefCell<HashSet<String>>>,
}

impl UniqueNamer {
    /// 無名型名の接頭辞
    pub const PREFIX: &'static str = "__anon_";

    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい一意名（`__anon_1` から始まり、使用済みの名前は飛ばす）
    pub fn fresh(&self) -> String {
        let mut taken = self.taken.borrow_mut();
        loop {
            let n = self.counter.get() + 1;
            self.counter.set(n);
            let name = format!("{}{}", Self::PREFIX, n);
            if taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// 既存の名前を使用済みにする
    pub fn reserve(&self, name: &str) {
        self.taken.borrow_mut().insert(name.to_string());
    }

    /// カウンタの現在値（飛ばした番号を含む）
    pub fn issued(&self) -> u32 {
        self.counter.get()
    }
}
