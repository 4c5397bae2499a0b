use crate::source::SourceLocation;
use crate::token::TokenKind;
use std::fmt;
use std::path::Path;

/// レキサーエラー
#[derive(Debug)]
pub enum LexError {
    /// 閉じられていないブロックコメント
    UnterminatedComment,
    /// 不正な文字
    InvalidChar(char),
    /// 不正な数値リテラル
    InvalidNumber(String),
    /// 閉じられていない文字列リテラル
    UnterminatedString,
    /// 閉じられていない文字リテラル
    UnterminatedChar,
    /// 空の文字リテラル
    EmptyCharLit,
    /// 不正なエスケープシーケンス
    InvalidEscape(char),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnterminatedComment => write!(f, "unterminated block comment"),
            LexError::InvalidChar(c) => write!(f, "invalid character: {:?}", c),
            LexError::InvalidNumber(s) => write!(f, "invalid number: {}", s),
            LexError::UnterminatedString => write!(f, "unterminated string literal"),
            LexError::UnterminatedChar => write!(f, "unterminated character literal"),
            LexError::EmptyCharLit => write!(f, "empty character literal"),
            LexError::InvalidEscape(c) => write!(f, "invalid escape sequence: \\{}", c),
        }
    }
}

/// パースエラー
#[derive(Debug)]
pub enum ParseError {
    /// 予期しないトークン
    UnexpectedToken { expected: String, found: TokenKind },
    /// 予期しないファイル終端
    UnexpectedEof,
    /// 型指定子がない
    MissingTypeSpecifier,
    /// 型指定子の組み合わせが不正
    InvalidTypeSpecifier(String),
    /// 未定義の基底クラス
    UnknownBaseClass(String),
    /// 宣言エラー
    InvalidDeclaration(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found {:?}", expected, found)
            }
            ParseError::UnexpectedEof => write!(f, "unexpected end of file"),
            ParseError::MissingTypeSpecifier => write!(f, "missing type specifier"),
            ParseError::InvalidTypeSpecifier(s) => write!(f, "invalid type specifier: {}", s),
            ParseError::UnknownBaseClass(s) => write!(f, "unknown base class: {}", s),
            ParseError::InvalidDeclaration(s) => write!(f, "invalid declaration: {}", s),
        }
    }
}

/// 宣言フロントエンドの統合エラー型
#[derive(Debug)]
pub enum CompileError {
    /// レキサーエラー
    Lex { loc: SourceLocation, kind: LexError },
    /// パースエラー
    Parse { loc: SourceLocation, kind: ParseError },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex { loc, kind } => write!(f, "{}: lexer error: {}", loc, kind),
            CompileError::Parse { loc, kind } => write!(f, "{}: parse error: {}", loc, kind),
        }
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    /// エラーが発生した位置を取得
    pub fn loc(&self) -> &SourceLocation {
        match self {
            CompileError::Lex { loc, .. } => loc,
            CompileError::Parse { loc, .. } => loc,
        }
    }

    /// ファイル名付きでエラーメッセージをフォーマット
    pub fn format_with_path(&self, path: &Path) -> String {
        format!("{}:{}", path.display(), self)
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, CompileError>;

/// 型テーブルの不変条件違反
///
/// 生成側のバグを示すもので、推測で補うと出力が検出不能に壊れるため
/// 変換全体を中断する。欠けた識別子などの構造的な欠落はここに含めない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// 真偽値属性が "0" / "1" / "true" / "false" 以外
    InvalidBool { attr: String, value: String },
    /// アクセス指定子が public / private / protected 以外
    InvalidAccess(String),
    /// 配列サイズが数値でも "*" でもない
    InvalidArraySize(String),
    /// ビットフィールド幅が数値でない
    InvalidBitField(String),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::InvalidBool { attr, value } => {
                write!(f, "invalid boolean value for '{}': {:?}", attr, value)
            }
            TableError::InvalidAccess(s) => write!(f, "invalid access specifier: {:?}", s),
            TableError::InvalidArraySize(s) => write!(f, "invalid array size: {:?}", s),
            TableError::InvalidBitField(s) => write!(f, "invalid bit field width: {:?}", s),
        }
    }
}

impl std::error::Error for TableError {}
