//! C/C++ Type Table
//!
//! 翻訳パス間で C/C++ の型情報を受け渡すための型テーブル。
//! 順方向ではネイティブ型を識別子に登録して型テーブル文書を出力し、
//! 逆方向では型テーブル文書から宣言テキストを合成する。

pub mod c_type;
pub mod code_fragment;
pub mod declarator;
pub mod error;
pub mod fundamental;
pub mod id_alloc;
pub mod inheritance;
pub mod lexer;
pub mod native;
pub mod parser;
pub mod source;
pub mod token;
pub mod type_env;
pub mod type_record;
pub mod type_registry;
pub mod type_table;
pub mod typegen;
pub mod typename_map;

// 主要な型を再エクスポート
pub use c_type::{CType, CTypeContext, CTypeNode, EnumId, RecordId};
pub use code_fragment::CodeFragment;
pub use declarator::{incomplete, INCOMPLETE_TYPE};
pub use error::{CompileError, LexError, ParseError, Result, TableError};
pub use id_alloc::{Category, IdAllocator, UniqueNamer};
pub use inheritance::InheritanceTable;
pub use lexer::Lexer;
pub use native::{NativeBase, NativeKind, NativeMember, NativeParam, NativeTypeSource, RecordKey};
pub use parser::{parse_source, Declaration, Parser, StorageClass, TranslationUnit};
pub use source::SourceLocation;
pub use token::{Token, TokenKind};
pub use type_env::TypeEnv;
pub use type_record::{
    AccessSpec, ArraySize, BaseEdge, Member, NameSlot, Param, PointerKind, Qualifiers, StructKey,
    TypeId, TypeKind, TypeRecord,
};
pub use type_registry::{RegistryStats, TypeRegistry};
pub use type_table::{BaseEntry, ParamEntry, SymbolEntry, TypeEntry, TypeTableDoc};
pub use typename_map::{TypeNameMap, TypeNameMapError, LABEL_TYPE};

// 型テーブル生成ライブラリ
pub use typegen::{
    generate_table, generate_table_from_source, load_env, load_table, render_table, TypegenBuilder,
    TypegenConfig, TypegenError, TypegenResult,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_then_reverse() {
        let mut ctx = CTypeContext::new();
        let tu = parse_source("const char *names[4];", &mut ctx).unwrap();

        let mut registry = TypeRegistry::new(&ctx);
        let id = registry.register(&tu.decls[0].ty);
        let doc = registry.to_table();

        let env = TypeEnv::from_doc(&doc).unwrap();
        assert_eq!(env.declare(&id, "names"), "const char *names[4]");
    }
}
