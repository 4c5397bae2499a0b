//! 宣言パーサー
//!
//! C/C++ の宣言部分集合を再帰下降でパースし、`CTypeContext` 上の型を組み立てる。
//! 文や式は扱わない。関数本体と初期化子は括弧の対応だけを見て読み飛ばす。

use std::collections::HashMap;

use crate::c_type::{CType, CTypeContext, CTypeNode};
use crate::error::{CompileError, ParseError, Result};
use crate::lexer::Lexer;
use crate::native::{NativeBase, NativeMember, RecordKey};
use crate::source::SourceLocation;
use crate::token::{Token, TokenKind};
use crate::type_record::{AccessSpec, ArraySize, PointerKind, Qualifiers};

/// ストレージクラス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

/// 宣言
///
/// `struct S { ... };` のような宣言子のない宣言は `name` が None になる。
/// typedef の場合 `ty` は別名ではなく別名の指す型。
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: Option<String>,
    pub ty: CType,
    pub storage: Option<StorageClass>,
    pub loc: SourceLocation,
}

impl Declaration {
    pub fn is_typedef(&self) -> bool {
        self.storage == Some(StorageClass::Typedef)
    }
}

/// 翻訳単位
#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    pub decls: Vec<Declaration>,
}

/// 派生型（宣言子の構成要素）
#[derive(Debug, Clone)]
enum Derived {
    Pointer { kind: PointerKind, quals: Qualifiers },
    Array(ArraySize),
    Function { params: Vec<CType>, is_variadic: bool },
}

/// 宣言子
#[derive(Debug, Clone)]
struct Declarator {
    name: Option<String>,
    /// 外側から内側への順。適用は末尾から行う
    derived: Vec<Derived>,
}

/// 組み込み型指定子の出現数
#[derive(Debug, Clone, Default)]
struct BuiltinSpecs {
    void: u8,
    char: u8,
    short: u8,
    int: u8,
    long: u8,
    float: u8,
    double: u8,
    signed: u8,
    unsigned: u8,
    bool: u8,
    wchar: u8,
    char16: u8,
    char32: u8,
    int128: u8,
}

impl BuiltinSpecs {
    fn is_empty(&self) -> bool {
        self.void
            + self.char
            + self.short
            + self.int
            + self.long
            + self.float
            + self.double
            + self.signed
            + self.unsigned
            + self.bool
            + self.wchar
            + self.char16
            + self.char32
            + self.int128
            == 0
    }

    /// 指定子の組み合わせから正規化した綴りを得る
    fn spelling(&self) -> std::result::Result<&'static str, String> {
        let sign_ok = self.signed + self.unsigned <= 1;
        let only = |n: u8| -> bool { n == 1 && self.signed + self.unsigned == 0 };
        let spelling = if self.void > 0 {
            only(self.void).then_some("void")
        } else if self.bool > 0 {
            only(self.bool).then_some("bool")
        } else if self.wchar > 0 {
            only(self.wchar).then_some("wchar_t")
        } else if self.char16 > 0 {
            only(self.char16).then_some("char16_t")
        } else if self.char32 > 0 {
            only(self.char32).then_some("char32_t")
        } else if self.float > 0 {
            only(self.float).then_some("float")
        } else if self.double > 0 {
            match self.long {
                0 => only(self.double).then_some("double"),
                1 => only(self.double).then_some("long double"),
                _ => None,
            }
        } else if self.char > 0 {
            match (self.signed, self.unsigned) {
                _ if self.char > 1 || !sign_ok => None,
                (1, _) => Some("signed char"),
                (_, 1) => Some("unsigned char"),
                _ => Some("char"),
            }
        } else if self.int128 > 0 {
            match self.unsigned {
                _ if self.int128 > 1 || !sign_ok => None,
                1 => Some("unsigned __int128"),
                _ => Some("__int128"),
            }
        } else if self.short > 0 {
            match self.unsigned {
                _ if self.short > 1 || !sign_ok => None,
                1 => Some("unsigned short"),
                _ => Some("short"),
            }
        } else if self.long > 0 {
            match (self.long, self.unsigned) {
                _ if !sign_ok => None,
                (1, 1) => Some("unsigned long"),
                (1, _) => Some("long"),
                (2, 1) => Some("unsigned long long"),
                (2, _) => Some("long long"),
                _ => None,
            }
        } else if self.int + self.signed + self.unsigned > 0 {
            match self.unsigned {
                _ if self.int > 1 || !sign_ok => None,
                1 => Some("unsigned int"),
                _ => Some("int"),
            }
        } else {
            None
        };
        spelling.ok_or_else(|| format!("{:?}", self))
    }
}

/// 宣言指定子
#[derive(Debug, Clone, Default)]
struct DeclSpecs {
    storage: Option<StorageClass>,
    quals: Qualifiers,
    builtins: BuiltinSpecs,
    is_complex: bool,
    /// 集成型・列挙・typedef 名による型
    named: Option<CType>,
}

/// パーサー
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a mut CTypeContext,
    /// typedef 名とクラス名
    type_names: HashMap<String, CType>,
}

impl<'a> Parser<'a> {
    /// ソースからパーサーを作成
    pub fn new(source: &str, ctx: &'a mut CTypeContext) -> Result<Self> {
        let tokens = Lexer::new(source.as_bytes()).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            ctx,
            type_names: HashMap::new(),
        })
    }

    /// 型名として登録済みの名前
    pub fn type_name(&self, name: &str) -> Option<&CType> {
        self.type_names.get(name)
    }

    /// 翻訳単位をパース
    pub fn parse(&mut self) -> Result<TranslationUnit> {
        let mut decls = Vec::new();

        while !self.is_eof() {
            decls.extend(self.parse_external_decl()?);
        }

        Ok(TranslationUnit { decls })
    }

    /// 外部宣言をパース（1 文で複数の宣言子を持ちうる）
    fn parse_external_decl(&mut self) -> Result<Vec<Declaration>> {
        let loc = self.current().loc;

        if self.check(&TokenKind::Semi) {
            self.advance();
            return Ok(Vec::new());
        }

        let specs = self.parse_decl_specs()?;
        let base = self.resolve_specs(&specs, loc)?;

        // 宣言子なし（タグ宣言など）
        if self.check(&TokenKind::Semi) {
            self.advance();
            return Ok(vec![Declaration {
                name: None,
                ty: base,
                storage: specs.storage,
                loc,
            }]);
        }

        let mut decls = Vec::new();
        loop {
            let decl_loc = self.current().loc;
            let declarator = self.parse_declarator()?;
            let ty = apply_derived(base.clone(), declarator.derived);
            let name = declarator.name.ok_or_else(|| {
                self.error_at(
                    decl_loc,
                    ParseError::InvalidDeclaration("declarator without a name".to_string()),
                )
            })?;

            if specs.storage == Some(StorageClass::Typedef) {
                self.type_names
                    .insert(name.clone(), CType::typedef(name.clone(), ty.clone()));
            }

            let is_function = ty.is_function();
            decls.push(Declaration {
                name: Some(name),
                ty,
                storage: specs.storage,
                loc: decl_loc,
            });

            // 関数定義の本体
            if is_function && self.check(&TokenKind::LBrace) {
                self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)?;
                return Ok(decls);
            }

            if self.check(&TokenKind::Eq) {
                self.skip_initializer()?;
            }

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&TokenKind::Semi)?;
        Ok(decls)
    }

    /// 宣言指定子をパース
    fn parse_decl_specs(&mut self) -> Result<DeclSpecs> {
        let mut specs = DeclSpecs::default();

        loop {
            match &self.current().kind {
                // ストレージクラス
                TokenKind::KwTypedef => specs.storage = Some(StorageClass::Typedef),
                TokenKind::KwExtern => specs.storage = Some(StorageClass::Extern),
                TokenKind::KwStatic => specs.storage = Some(StorageClass::Static),
                TokenKind::KwAuto => specs.storage = Some(StorageClass::Auto),
                TokenKind::KwRegister => specs.storage = Some(StorageClass::Register),
                TokenKind::KwInline => {}
                // 型修飾子
                TokenKind::KwConst => specs.quals.is_const = true,
                TokenKind::KwVolatile => specs.quals.is_volatile = true,
                TokenKind::KwRestrict => specs.quals.is_restrict = true,
                // 型指定子
                TokenKind::KwVoid => specs.builtins.void += 1,
                TokenKind::KwChar => specs.builtins.char += 1,
                TokenKind::KwShort => specs.builtins.short += 1,
                TokenKind::KwInt => specs.builtins.int += 1,
                TokenKind::KwLong => specs.builtins.long += 1,
                TokenKind::KwFloat => specs.builtins.float += 1,
                TokenKind::KwDouble => specs.builtins.double += 1,
                TokenKind::KwSigned => specs.builtins.signed += 1,
                TokenKind::KwUnsigned => specs.builtins.unsigned += 1,
                TokenKind::KwBool => specs.builtins.bool += 1,
                TokenKind::KwWcharT => specs.builtins.wchar += 1,
                TokenKind::KwChar16T => specs.builtins.char16 += 1,
                TokenKind::KwChar32T => specs.builtins.char32 += 1,
                TokenKind::KwInt128 => specs.builtins.int128 += 1,
                TokenKind::KwComplex => specs.is_complex = true,
                // 構造体・共用体・クラス・列挙（それぞれ自前でトークンを消費する）
                TokenKind::KwStruct => {
                    let ty = self.parse_record(RecordKey::Struct)?;
                    self.set_named(&mut specs, ty)?;
                    continue;
                }
                TokenKind::KwUnion => {
                    let ty = self.parse_record(RecordKey::Union)?;
                    self.set_named(&mut specs, ty)?;
                    continue;
                }
                TokenKind::KwClass => {
                    let ty = self.parse_record(RecordKey::Class)?;
                    self.set_named(&mut specs, ty)?;
                    continue;
                }
                TokenKind::KwEnum => {
                    let ty = self.parse_enum()?;
                    self.set_named(&mut specs, ty)?;
                    continue;
                }
                // typedef 名（型がまだ決まっていない場合のみ）
                TokenKind::Ident(name)
                    if specs.named.is_none()
                        && specs.builtins.is_empty()
                        && self.type_names.contains_key(name) =>
                {
                    specs.named = self.type_names.get(name).cloned();
                }
                _ => break,
            }
            self.advance();
        }

        Ok(specs)
    }

    fn set_named(&self, specs: &mut DeclSpecs, ty: CType) -> Result<()> {
        if specs.named.is_some() {
            return Err(self.error(ParseError::InvalidTypeSpecifier(
                "more than one type name".to_string(),
            )));
        }
        specs.named = Some(ty);
        Ok(())
    }

    /// 宣言指定子から型を組み立てる
    fn resolve_specs(&self, specs: &DeclSpecs, loc: SourceLocation) -> Result<CType> {
        let ty = match &specs.named {
            Some(named) => {
                if !specs.builtins.is_empty() {
                    return Err(self.error_at(
                        loc,
                        ParseError::InvalidTypeSpecifier(
                            "type name combined with builtin specifiers".to_string(),
                        ),
                    ));
                }
                named.clone()
            }
            None if specs.builtins.is_empty() && specs.is_complex => CType::builtin("double"),
            None if specs.builtins.is_empty() => {
                return Err(self.error_at(loc, ParseError::MissingTypeSpecifier));
            }
            None => {
                let spelling = specs
                    .builtins
                    .spelling()
                    .map_err(|s| self.error_at(loc, ParseError::InvalidTypeSpecifier(s)))?;
                CType::builtin(spelling)
            }
        };
        let ty = if specs.is_complex {
            CType::complex(ty)
        } else {
            ty
        };
        Ok(ty.qualified(specs.quals))
    }

    /// struct / union / class をパース
    fn parse_record(&mut self, key: RecordKey) -> Result<CType> {
        let loc = self.current().loc;
        self.advance(); // struct/union/class

        let name = self.current_ident();
        if name.is_some() {
            self.advance();
        }

        let is_definition = self.check(&TokenKind::LBrace) || self.check(&TokenKind::Colon);

        let id = match &name {
            Some(n) => match self.ctx.find_record(n) {
                Some(id) => {
                    let complete = self.ctx.record(id).is_some_and(|r| r.is_complete());
                    if is_definition && complete {
                        return Err(self.error_at(
                            loc,
                            ParseError::InvalidDeclaration(format!("redefinition of '{}'", n)),
                        ));
                    }
                    id
                }
                None => self.ctx.declare_record(key, Some(n.clone())),
            },
            None => self.ctx.declare_record(key, None),
        };

        // クラス名はキーワードなしで型名として使える
        if key == RecordKey::Class {
            if let Some(n) = &name {
                self.type_names.insert(n.clone(), CType::record(id));
            }
        }

        if !is_definition {
            return Ok(CType::record(id));
        }

        let bases = if self.check(&TokenKind::Colon) {
            if key != RecordKey::Class {
                return Err(self.error(ParseError::InvalidDeclaration(
                    "base clause is only supported on class".to_string(),
                )));
            }
            self.advance();
            self.parse_base_clause()?
        } else {
            Vec::new()
        };

        self.expect(&TokenKind::LBrace)?;
        let members = self.parse_member_list(key)?;
        self.expect(&TokenKind::RBrace)?;

        self.ctx.complete_record(id, members, bases);
        Ok(CType::record(id))
    }

    /// 基底クラス指定をパース（`:` は消費済み）
    fn parse_base_clause(&mut self) -> Result<Vec<NativeBase<CType>>> {
        let mut bases = Vec::new();

        loop {
            let mut access = None;
            let mut is_virtual = false;
            loop {
                match self.current().kind {
                    TokenKind::KwVirtual => is_virtual = true,
                    TokenKind::KwPublic => access = Some(AccessSpec::Public),
                    TokenKind::KwPrivate => access = Some(AccessSpec::Private),
                    TokenKind::KwProtected => access = Some(AccessSpec::Protected),
                    _ => break,
                }
                self.advance();
            }

            let loc = self.current().loc;
            let name = self.expect_ident()?;
            let ty = self
                .lookup_record_type(&name)
                .ok_or_else(|| self.error_at(loc, ParseError::UnknownBaseClass(name)))?;

            bases.push(NativeBase {
                ty,
                access: access.unwrap_or(AccessSpec::Private),
                is_virtual,
            });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(bases)
    }

    fn lookup_record_type(&self, name: &str) -> Option<CType> {
        if let Some(ty) = self.type_names.get(name) {
            let canon = ty.desugar();
            if matches!(canon.node(), CTypeNode::Record(_)) {
                return Some(canon.unqualified());
            }
        }
        self.ctx.find_record(name).map(CType::record)
    }

    /// メンバーリストをパース（`{` は消費済み、`}` は残す）
    fn parse_member_list(&mut self, key: RecordKey) -> Result<Vec<NativeMember<CType>>> {
        let mut members = Vec::new();
        let mut access = match key {
            RecordKey::Class => Some(AccessSpec::Private),
            RecordKey::Struct | RecordKey::Union => None,
        };

        while !self.check(&TokenKind::RBrace) {
            if self.is_eof() {
                return Err(self.error(ParseError::UnexpectedEof));
            }

            // アクセス指定ラベル
            let label = match self.current().kind {
                TokenKind::KwPublic => Some(AccessSpec::Public),
                TokenKind::KwPrivate => Some(AccessSpec::Private),
                TokenKind::KwProtected => Some(AccessSpec::Protected),
                _ => None,
            };
            if let Some(label) = label {
                if key != RecordKey::Class {
                    return Err(self.error(ParseError::InvalidDeclaration(
                        "access label outside of class".to_string(),
                    )));
                }
                self.advance();
                self.expect(&TokenKind::Colon)?;
                access = Some(label);
                continue;
            }

            if self.check(&TokenKind::Semi) {
                self.advance();
                continue;
            }

            let loc = self.current().loc;
            let specs = self.parse_decl_specs()?;
            let base = self.resolve_specs(&specs, loc)?;

            // 無名の構造体・共用体メンバー
            if self.check(&TokenKind::Semi) {
                self.advance();
                if self.is_anonymous_record(&base) {
                    members.push(NativeMember {
                        name: None,
                        ty: base,
                        access,
                        bit_field: None,
                    });
                }
                continue;
            }

            loop {
                let (name, ty) = if self.check(&TokenKind::Colon) {
                    (None, base.clone())
                } else {
                    let declarator = self.parse_declarator()?;
                    (declarator.name, apply_derived(base.clone(), declarator.derived))
                };

                let bit_field = if self.check(&TokenKind::Colon) {
                    self.advance();
                    Some(self.parse_bit_width()?)
                } else {
                    None
                };

                members.push(NativeMember {
                    name,
                    ty,
                    access,
                    bit_field,
                });

                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }

            self.expect(&TokenKind::Semi)?;
        }

        Ok(members)
    }

    fn is_anonymous_record(&self, ty: &CType) -> bool {
        match ty.node() {
            CTypeNode::Record(id) => self.ctx.record(*id).is_some_and(|r| r.name.is_none()),
            _ => false,
        }
    }

    fn parse_bit_width(&mut self) -> Result<u32> {
        let loc = self.current().loc;
        match self.current().kind {
            TokenKind::IntLit(n) => {
                self.advance();
                u32::try_from(n).map_err(|_| {
                    self.error_at(
                        loc,
                        ParseError::InvalidDeclaration(format!("bit field width {} too large", n)),
                    )
                })
            }
            _ => Err(self.unexpected("bit field width")),
        }
    }

    /// 列挙型をパース（列挙子は読み飛ばす）
    fn parse_enum(&mut self) -> Result<CType> {
        self.advance(); // enum

        let name = self.current_ident();
        if name.is_some() {
            self.advance();
        }

        let id = match name.as_deref().and_then(|n| self.ctx.find_enum(n)) {
            Some(id) => id,
            None => self.ctx.declare_enum(name),
        };

        if self.check(&TokenKind::LBrace) {
            self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)?;
        }

        Ok(CType::enumeration(id))
    }

    /// 宣言子をパース（抽象宣言子も受け付ける）
    fn parse_declarator(&mut self) -> Result<Declarator> {
        let mut pointers = Vec::new();

        // ポインタ・参照
        loop {
            let kind = match self.current().kind {
                TokenKind::Star => PointerKind::Pointer,
                TokenKind::Amp => PointerKind::LValueReference,
                TokenKind::AmpAmp => PointerKind::RValueReference,
                TokenKind::Caret => PointerKind::Block,
                _ => break,
            };
            self.advance();
            let quals = self.parse_type_qualifiers();
            pointers.push(Derived::Pointer { kind, quals });
        }

        // 直接宣言子
        let (name, mut derived) = self.parse_direct_declarator()?;

        // 名前に近いポインタほど後で適用する
        derived.extend(pointers.into_iter().rev());

        Ok(Declarator { name, derived })
    }

    /// 直接宣言子をパース
    fn parse_direct_declarator(&mut self) -> Result<(Option<String>, Vec<Derived>)> {
        let mut derived = Vec::new();

        // 識別子または ( declarator )
        let name = if self.check(&TokenKind::LParen) && self.paren_starts_declarator() {
            self.advance();
            let inner = self.parse_declarator()?;
            self.expect(&TokenKind::RParen)?;
            derived = inner.derived;
            inner.name
        } else if let Some(id) = self.current_ident() {
            self.advance();
            Some(id)
        } else {
            None
        };

        // 配列・関数の後置修飾
        loop {
            if self.check(&TokenKind::LBracket) {
                derived.push(self.parse_array_declarator()?);
            } else if self.check(&TokenKind::LParen) {
                derived.push(self.parse_function_declarator()?);
            } else {
                break;
            }
        }

        Ok((name, derived))
    }

    /// `(` が入れ子の宣言子の開始か、関数のパラメータリストか
    fn paren_starts_declarator(&self) -> bool {
        match &self.peek_kind(1) {
            TokenKind::Star
            | TokenKind::Amp
            | TokenKind::AmpAmp
            | TokenKind::Caret
            | TokenKind::LParen
            | TokenKind::LBracket => true,
            TokenKind::Ident(name) => !self.type_names.contains_key(name),
            _ => false,
        }
    }

    /// 配列宣言子をパース
    fn parse_array_declarator(&mut self) -> Result<Derived> {
        self.advance(); // [

        // static と型修飾子は型に影響しない
        while matches!(
            self.current().kind,
            TokenKind::KwStatic | TokenKind::KwConst | TokenKind::KwVolatile | TokenKind::KwRestrict
        ) {
            self.advance();
        }

        let next = self.peek_kind(1);
        let size = match (self.current().kind.clone(), next) {
            (TokenKind::RBracket, _) => ArraySize::Variable,
            (TokenKind::IntLit(n), TokenKind::RBracket) => {
                self.advance();
                ArraySize::Fixed(n)
            }
            (TokenKind::Star, TokenKind::RBracket) => {
                self.advance();
                ArraySize::Variable
            }
            // 定数式は評価しない
            _ => {
                self.skip_until_close(&TokenKind::RBracket)?;
                ArraySize::Variable
            }
        };

        self.expect(&TokenKind::RBracket)?;
        Ok(Derived::Array(size))
    }

    /// 関数宣言子をパース
    fn parse_function_declarator(&mut self) -> Result<Derived> {
        self.advance(); // (

        let empty = Derived::Function {
            params: Vec::new(),
            is_variadic: false,
        };
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(empty);
        }
        if self.check(&TokenKind::KwVoid) && matches!(self.peek_kind(1), TokenKind::RParen) {
            self.advance();
            self.advance();
            return Ok(empty);
        }

        let mut params = Vec::new();
        let mut is_variadic = false;

        loop {
            if self.check(&TokenKind::Ellipsis) {
                is_variadic = true;
                self.advance();
                break;
            }

            let loc = self.current().loc;
            let specs = self.parse_decl_specs()?;
            let base = self.resolve_specs(&specs, loc)?;
            let declarator = if self.check(&TokenKind::Comma) || self.check(&TokenKind::RParen) {
                None
            } else {
                Some(self.parse_declarator()?)
            };

            params.push(match declarator {
                Some(d) => apply_derived(base, d.derived),
                None => base,
            });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&TokenKind::RParen)?;

        Ok(Derived::Function {
            params,
            is_variadic,
        })
    }

    /// 型修飾子をパース
    fn parse_type_qualifiers(&mut self) -> Qualifiers {
        let mut quals = Qualifiers::NONE;
        loop {
            match self.current().kind {
                TokenKind::KwConst => quals.is_const = true,
                TokenKind::KwVolatile => quals.is_volatile = true,
                TokenKind::KwRestrict => quals.is_restrict = true,
                _ => return quals,
            }
            self.advance();
        }
    }

    // ==================== 読み飛ばし ====================

    /// 初期化子を読み飛ばす（`=` から、深さ 0 の `,` / `;` の手前まで）
    fn skip_initializer(&mut self) -> Result<()> {
        self.advance(); // =
        let mut depth = 0usize;
        loop {
            match self.current().kind {
                TokenKind::Eof => return Err(self.error(ParseError::UnexpectedEof)),
                TokenKind::Comma | TokenKind::Semi if depth == 0 => return Ok(()),
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// 対応する閉じ括弧まで読み飛ばす（開き括弧から、閉じ括弧も消費する）
    fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) -> Result<()> {
        self.expect(open)?;
        self.skip_until_close(close)?;
        self.expect(close)?;
        Ok(())
    }

    /// 深さ 0 の閉じ括弧の手前まで読み飛ばす
    fn skip_until_close(&mut self, close: &TokenKind) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let kind = &self.current().kind;
            if matches!(kind, TokenKind::Eof) {
                return Err(self.error(ParseError::UnexpectedEof));
            }
            if depth == 0 && self.check(close) {
                return Ok(());
            }
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ==================== ユーティリティ ====================

    fn current(&self) -> &Token {
        // tokenize() は必ず Eof で終わる
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, n: usize) -> TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        self.tokens[idx].kind.clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{:?}", kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.current_ident() {
            Some(id) => {
                self.advance();
                Ok(id)
            }
            None => Err(self.unexpected("identifier")),
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn is_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn current_ident(&self) -> Option<String> {
        if let TokenKind::Ident(id) = &self.current().kind {
            Some(id.clone())
        } else {
            None
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let found = self.current().kind.clone();
        if matches!(found, TokenKind::Eof) {
            return self.error(ParseError::UnexpectedEof);
        }
        self.error(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found,
        })
    }

    fn error(&self, kind: ParseError) -> CompileError {
        self.error_at(self.current().loc, kind)
    }

    fn error_at(&self, loc: SourceLocation, kind: ParseError) -> CompileError {
        CompileError::Parse { loc, kind }
    }
}

/// 派生型を内側から順に基本型へ適用する
fn apply_derived(base: CType, derived: Vec<Derived>) -> CType {
    derived.into_iter().rev().fold(base, |ty, d| match d {
        Derived::Pointer { kind, quals } => CType::indirect(ty, kind).qualified(quals),
        Derived::Array(size) => CType::array_of(ty, size),
        Derived::Function {
            params,
            is_variadic,
        } => CType::function(ty, params, is_variadic),
    })
}

/// 文字列をパースして翻訳単位を得る
pub fn parse_source(source: &str, ctx: &mut CTypeContext) -> Result<TranslationUnit> {
    Parser::new(source, ctx)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(code: &str) -> (TranslationUnit, CTypeContext) {
        let mut ctx = CTypeContext::new();
        let tu = parse_source(code, &mut ctx).unwrap();
        (tu, ctx)
    }

    fn describe(code: &str) -> Vec<String> {
        let (tu, ctx) = parse_str(code);
        tu.decls
            .iter()
            .map(|d| {
                format!(
                    "{}: {}",
                    d.name.as_deref().unwrap_or("-"),
                    ctx.display(&d.ty)
                )
            })
            .collect()
    }

    #[test]
    fn test_pointer_to_function() {
        assert_eq!(
            describe("int (*fp)(void);"),
            vec!["fp: pointer to function() returning int"]
        );
    }

    #[test]
    fn test_array_of_pointers() {
        assert_eq!(
            describe("char *argv[];"),
            vec!["argv: array[] of pointer to char"]
        );
    }

    #[test]
    fn test_pointer_qualifiers_bind_to_pointer() {
        assert_eq!(
            describe("const int * const p;"),
            vec!["p: const pointer to const int"]
        );
    }

    #[test]
    fn test_multi_dimensional_array() {
        assert_eq!(
            describe("int m[2][3];"),
            vec!["m: array[2] of array[3] of int"]
        );
    }

    #[test]
    fn test_multiple_declarators() {
        assert_eq!(
            describe("unsigned long a, *b;"),
            vec!["a: unsigned long", "b: pointer to unsigned long"]
        );
    }

    #[test]
    fn test_typedef_and_use() {
        let (tu, ctx) = parse_str("typedef unsigned int uint; uint x;");
        assert!(tu.decls[0].is_typedef());
        assert_eq!(ctx.display(&tu.decls[1].ty).to_string(), "uint");
        assert_eq!(
            ctx.display(&tu.decls[1].ty.desugar()).to_string(),
            "unsigned int"
        );
    }

    #[test]
    fn test_self_referential_struct() {
        let (tu, ctx) = parse_str("struct node { int v; struct node *next; };");
        let CTypeNode::Record(id) = tu.decls[0].ty.node() else {
            panic!("expected record");
        };
        let decl = ctx.record(*id).unwrap();
        let members = decl.members.as_ref().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].ty, CType::pointer_to(CType::record(*id)));
    }

    #[test]
    fn test_class_with_bases() {
        let (tu, ctx) = parse_str(
            "class A {}; class B {};\n\
             class D : public A, private virtual B { int hidden; public: int x; };",
        );
        let CTypeNode::Record(id) = tu.decls[2].ty.node() else {
            panic!("expected record");
        };
        let decl = ctx.record(*id).unwrap();
        assert_eq!(decl.bases.len(), 2);
        assert_eq!(decl.bases[0].access, AccessSpec::Public);
        assert!(!decl.bases[0].is_virtual);
        assert_eq!(decl.bases[1].access, AccessSpec::Private);
        assert!(decl.bases[1].is_virtual);
        let members = decl.members.as_ref().unwrap();
        assert_eq!(members[0].access, Some(AccessSpec::Private));
        assert_eq!(members[1].access, Some(AccessSpec::Public));
    }

    #[test]
    fn test_bit_fields() {
        let (tu, ctx) = parse_str("struct flags { unsigned a : 1, : 2; int b : 5; };");
        let CTypeNode::Record(id) = tu.decls[0].ty.node() else {
            panic!("expected record");
        };
        let members = ctx.record(*id).unwrap().members.clone().unwrap();
        let widths: Vec<_> = members.iter().map(|m| m.bit_field).collect();
        assert_eq!(widths, vec![Some(1), Some(2), Some(5)]);
        assert_eq!(members[1].name, None);
    }

    #[test]
    fn test_function_definition_body_skipped() {
        assert_eq!(
            describe("static int add(int a, int b) { return a + b; } int after;"),
            vec!["add: function(int, int) returning int", "after: int"]
        );
    }

    #[test]
    fn test_variadic_and_initializer() {
        assert_eq!(
            describe("int printf(const char *fmt, ...); int n = (1 + 2), m;"),
            vec![
                "printf: function(pointer to const char, ...) returning int",
                "n: int",
                "m: int",
            ]
        );
    }

    #[test]
    fn test_enum_body_skipped() {
        assert_eq!(
            describe("enum color { RED = 1 << 0, GREEN } c;"),
            vec!["c: enum color"]
        );
    }

    #[test]
    fn test_references() {
        assert_eq!(
            describe("int &r; int &&rr;"),
            vec!["r: reference to int", "rr: rvalue reference to int"]
        );
    }

    #[test]
    fn test_unknown_base_class() {
        let mut ctx = CTypeContext::new();
        let err = parse_source("class D : public Missing {};", &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Parse {
                kind: ParseError::UnknownBaseClass(ref n),
                ..
            } if n == "Missing"
        ));
    }

    #[test]
    fn test_missing_type_specifier() {
        let mut ctx = CTypeContext::new();
        let err = parse_source("x;", &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Parse {
                kind: ParseError::MissingTypeSpecifier,
                ..
            }
        ));
    }
}
