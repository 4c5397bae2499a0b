use crate::error::{CompileError, LexError, Result};
use crate::source::SourceLocation;
use crate::token::{Token, TokenKind};

/// Lexer
///
/// 宣言の読み取りに必要なトークンだけを切り出す。
/// コメントとプリプロセッサ行は読み飛ばす。
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    /// 行頭（空白のみ先行）にいるかどうか
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// 新しいLexerを作成
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    /// 現在位置を取得
    pub fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    /// 次のトークンを取得
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();

            match (self.peek(), self.peek_n(1)) {
                (Some(b'/'), Some(b'/')) => self.skip_line(),
                (Some(b'/'), Some(b'*')) => self.skip_block_comment()?,
                (Some(b'#'), _) if self.at_line_start => self.skip_directive(),
                _ => break,
            }
        }

        let loc = self.current_location();
        self.at_line_start = false;
        let kind = self.scan_token_kind(loc)?;
        Ok(Token::new(kind, loc))
    }

    /// 全トークンを読み切る（末尾に Eof を含む）
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    /// 現在の文字をピーク
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// n文字先をピーク
    fn peek_n(&self, n: usize) -> Option<u8> {
        self.source.get(self.pos + n).copied()
    }

    /// 1文字進める
    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// 空白と改行をスキップ
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' || c == 0x0c {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// 行末まで読み飛ばす（改行は残す）
    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            self.advance();
        }
    }

    /// ブロックコメントを読み飛ばす
    fn skip_block_comment(&mut self) -> Result<()> {
        let loc = self.current_location();
        self.advance(); // /
        self.advance(); // *
        loop {
            match (self.peek(), self.peek_n(1)) {
                (Some(b'*'), Some(b'/')) => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                (Some(_), _) => {
                    self.advance();
                }
                (None, _) => {
                    return Err(CompileError::Lex {
                        loc,
                        kind: LexError::UnterminatedComment,
                    });
                }
            }
        }
    }

    /// プリプロセッサ行を読み飛ばす（バックスラッシュ継続行を含む）
    fn skip_directive(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\\' && self.peek_n(1) == Some(b'\n') {
                self.advance();
                self.advance();
                continue;
            }
            if c == b'\n' {
                break;
            }
            self.advance();
        }
    }

    fn scan_token_kind(&mut self, loc: SourceLocation) -> Result<TokenKind> {
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(TokenKind::Eof),
        };

        // ワイド文字の接頭辞 L は読み捨てる
        if c == b'L' && matches!(self.peek_n(1), Some(b'"') | Some(b'\'')) {
            self.advance();
            return self.scan_token_kind(loc);
        }
        if c == b'"' {
            return self.scan_string(loc);
        }
        if c == b'\'' {
            return self.scan_char(loc);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return Ok(self.scan_identifier());
        }
        if c.is_ascii_digit() {
            return self.scan_number(loc);
        }

        self.advance();
        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'*' => TokenKind::Star,
            b'^' => TokenKind::Caret,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b':' => TokenKind::Colon,
            b'=' => TokenKind::Eq,
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.advance();
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Amp
                }
            }
            b'.' => {
                if self.peek() == Some(b'.') && self.peek_n(1) == Some(b'.') {
                    self.advance();
                    self.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Punct('.')
                }
            }
            b'+' | b'-' | b'/' | b'%' | b'<' | b'>' | b'!' | b'~' | b'|' | b'?' => {
                TokenKind::Punct(c as char)
            }
            other => {
                return Err(CompileError::Lex {
                    loc,
                    kind: LexError::InvalidChar(other as char),
                });
            }
        };
        Ok(kind)
    }

    /// 文字列リテラルをスキャン
    fn scan_string(&mut self, loc: SourceLocation) -> Result<TokenKind> {
        self.advance(); // "

        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.advance();
                    return Ok(TokenKind::StringLit(bytes));
                }
                Some(b'\\') if self.peek_n(1) == Some(b'\n') => {
                    // 行継続
                    self.advance();
                    self.advance();
                }
                Some(b'\\') => {
                    self.advance();
                    bytes.push(self.scan_escape_sequence(loc)?);
                }
                Some(b'\n') | None => {
                    return Err(CompileError::Lex {
                        loc,
                        kind: LexError::UnterminatedString,
                    });
                }
                Some(c) => {
                    self.advance();
                    bytes.push(c);
                }
            }
        }
    }

    /// 文字リテラルをスキャン
    fn scan_char(&mut self, loc: SourceLocation) -> Result<TokenKind> {
        self.advance(); // '

        let value = match self.peek() {
            Some(b'\'') => {
                return Err(CompileError::Lex {
                    loc,
                    kind: LexError::EmptyCharLit,
                });
            }
            Some(b'\\') => {
                self.advance();
                self.scan_escape_sequence(loc)?
            }
            Some(b'\n') | None => {
                return Err(CompileError::Lex {
                    loc,
                    kind: LexError::UnterminatedChar,
                });
            }
            Some(c) => {
                self.advance();
                c
            }
        };

        if self.peek() != Some(b'\'') {
            return Err(CompileError::Lex {
                loc,
                kind: LexError::UnterminatedChar,
            });
        }
        self.advance(); // '

        Ok(TokenKind::CharLit(value))
    }

    /// エスケープシーケンスをスキャン（`\` の直後から）
    fn scan_escape_sequence(&mut self, loc: SourceLocation) -> Result<u8> {
        let Some(c) = self.advance() else {
            return Err(CompileError::Lex {
                loc,
                kind: LexError::UnterminatedString,
            });
        };
        let value = match c {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'\\' | b'\'' | b'"' | b'?' => c,
            b'x' => {
                let mut value = 0u8;
                let mut digits = 0;
                while let Some(d) = self.peek().and_then(|d| (d as char).to_digit(16)) {
                    value = value.wrapping_mul(16).wrapping_add(d as u8);
                    self.advance();
                    digits += 1;
                }
                if digits == 0 {
                    return Err(CompileError::Lex {
                        loc,
                        kind: LexError::InvalidEscape('x'),
                    });
                }
                value
            }
            b'0'..=b'7' => {
                // 8進は最大 3 桁
                let mut value = c - b'0';
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value.wrapping_mul(8).wrapping_add(d - b'0');
                            self.advance();
                        }
                        _ => break,
                    }
                }
                value
            }
            other => {
                return Err(CompileError::Lex {
                    loc,
                    kind: LexError::InvalidEscape(other as char),
                });
            }
        };
        Ok(value)
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        TokenKind::from_keyword(&text).unwrap_or(TokenKind::Ident(text))
    }

    fn scan_number(&mut self, loc: SourceLocation) -> Result<TokenKind> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);

        let value = if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            u64::from_str_radix(hex, 16)
        } else if digits.len() > 1 && digits.starts_with('0') {
            u64::from_str_radix(&digits[1..], 8)
        } else {
            digits.parse::<u64>()
        };

        value.map(TokenKind::IntLit).map_err(|_| CompileError::Lex {
            loc,
            kind: LexError::InvalidNumber(text),
        })
    }
}
