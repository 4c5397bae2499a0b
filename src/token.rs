use crate::source::SourceLocation;

/// トークン種別
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === リテラル ===
    /// 整数リテラル
    IntLit(u64),
    /// 文字リテラル
    CharLit(u8),
    /// 文字列リテラル（エスケープ解決済み）
    StringLit(Vec<u8>),

    // === 識別子 ===
    Ident(String),

    // === キーワード ===
    // ストレージクラス
    KwTypedef,
    KwExtern,
    KwStatic,
    KwAuto,
    KwRegister,
    KwInline,
    // 型修飾子
    KwConst,
    KwVolatile,
    KwRestrict,
    // 型指定子
    KwVoid,
    KwChar,
    KwShort,
    KwInt,
    KwLong,
    KwFloat,
    KwDouble,
    KwSigned,
    KwUnsigned,
    KwBool,
    KwComplex,
    KwWcharT,
    KwChar16T,
    KwChar32T,
    KwInt128,
    // 構造体・共用体・列挙・クラス
    KwStruct,
    KwUnion,
    KwEnum,
    KwClass,
    // アクセス指定子・継承
    KwPublic,
    KwPrivate,
    KwProtected,
    KwVirtual,

    // === 区切り子 ===
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Star,
    Amp,
    AmpAmp,
    Caret,
    Comma,
    Semi,
    Colon,
    Eq,
    Ellipsis,
    /// 宣言の構造に関わらない記号（列挙子の値などで読み飛ばす）
    Punct(char),

    /// ファイル終端
    Eof,
}

impl TokenKind {
    /// 識別子をキーワードに変換（キーワードでなければ None）
    pub fn from_keyword(s: &str) -> Option<Self> {
        let kind = match s {
            "typedef" => TokenKind::KwTypedef,
            "extern" => TokenKind::KwExtern,
            "static" => TokenKind::KwStatic,
            "auto" => TokenKind::KwAuto,
            "register" => TokenKind::KwRegister,
            "inline" | "__inline" | "__inline__" => TokenKind::KwInline,
            "const" | "__const" | "__const__" => TokenKind::KwConst,
            "volatile" | "__volatile" | "__volatile__" => TokenKind::KwVolatile,
            "restrict" | "__restrict" | "__restrict__" => TokenKind::KwRestrict,
            "void" => TokenKind::KwVoid,
            "char" => TokenKind::KwChar,
            "short" => TokenKind::KwShort,
            "int" => TokenKind::KwInt,
            "long" => TokenKind::KwLong,
            "float" => TokenKind::KwFloat,
            "double" => TokenKind::KwDouble,
            "signed" | "__signed__" => TokenKind::KwSigned,
            "unsigned" => TokenKind::KwUnsigned,
            "bool" | "_Bool" => TokenKind::KwBool,
            "_Complex" | "__complex__" => TokenKind::KwComplex,
            "wchar_t" => TokenKind::KwWcharT,
            "char16_t" => TokenKind::KwChar16T,
            "char32_t" => TokenKind::KwChar32T,
            "__int128" => TokenKind::KwInt128,
            "struct" => TokenKind::KwStruct,
            "union" => TokenKind::KwUnion,
            "enum" => TokenKind::KwEnum,
            "class" => TokenKind::KwClass,
            "public" => TokenKind::KwPublic,
            "private" => TokenKind::KwPrivate,
            "protected" => TokenKind::KwProtected,
            "virtual" => TokenKind::KwVirtual,
            _ => return None,
        };
        Some(kind)
    }
}

/// トークン
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
}

impl Token {
    /// 新しいトークンを作成
    pub fn new(kind: TokenKind, loc: SourceLocation) -> Self {
        Self { kind, loc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_aliases() {
        assert_eq!(TokenKind::from_keyword("__restrict"), Some(TokenKind::KwRestrict));
        assert_eq!(TokenKind::from_keyword("_Bool"), Some(TokenKind::KwBool));
        assert_eq!(TokenKind::from_keyword("node"), None);
    }
}
