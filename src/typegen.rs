//! 型テーブル生成ライブラリ
//!
//! 宣言ファイルを解析して型テーブル文書を生成する（順方向）。
//! 逆方向では型テーブル文書から宣言テキストを再構成する。

use std::fs;
use std::path::{Path, PathBuf};

use crate::{
    parse_source, CTypeContext, CodeFragment, SymbolEntry, TableError, TypeEnv, TypeNameMap,
    TypeNameMapError, TypeRegistry, TypeTableDoc,
};
use crate::type_registry::RegistryStats;

/// 型テーブル生成の設定
#[derive(Debug, Clone, Default)]
pub struct TypegenConfig {
    /// 入力宣言ファイル
    pub input: PathBuf,

    /// 型名置換マップファイル
    pub typename_map: Option<PathBuf>,

    /// typeTable を出力しない（globalSymbols のみ）
    pub disable_type_table: bool,

    /// ラベル型エントリを出力する
    pub label_type: bool,

    /// 件数の表示 (stderr)
    pub verbose: bool,

    /// 登録ごとのトレース (stderr)
    pub trace: bool,

    /// メモのヒットも含めたトレース (stderr)
    pub full_trace: bool,
}

/// TypegenConfigのビルダー
pub struct TypegenBuilder {
    config: TypegenConfig,
}

impl TypegenBuilder {
    /// 必須パラメータでビルダーを作成
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            config: TypegenConfig {
                input: input.into(),
                ..Default::default()
            },
        }
    }

    /// 型名置換マップファイルを設定
    pub fn typename_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.typename_map = Some(path.into());
        self
    }

    pub fn disable_type_table(mut self, disable: bool) -> Self {
        self.config.disable_type_table = disable;
        self
    }

    pub fn label_type(mut self, label: bool) -> Self {
        self.config.label_type = label;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// トレースを設定（full_trace は trace を含む）
    pub fn trace(mut self, trace: bool, full_trace: bool) -> Self {
        self.config.trace = trace || full_trace;
        self.config.full_trace = full_trace;
        self
    }

    /// 設定を構築
    pub fn build(self) -> TypegenConfig {
        self.config
    }
}

/// 生成結果
#[derive(Debug)]
pub struct TypegenResult {
    /// 生成された型テーブル文書
    pub doc: TypeTableDoc,

    /// 登録統計
    pub stats: RegistryStats,
}

/// エラー型
#[derive(Debug)]
pub enum TypegenError {
    /// I/Oエラー
    Io(std::io::Error),
    /// パースエラー（ファイル名付きで整形済み）
    Parse(String),
    /// 型テーブルの不変条件違反
    Table(TableError),
    /// JSONの読み書きエラー
    Json(serde_json::Error),
    /// 型名置換マップのエラー
    TypeNameMap(TypeNameMapError),
}

impl std::fmt::Display for TypegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypegenError::Io(e) => write!(f, "I/O error: {}", e),
            TypegenError::Parse(e) => write!(f, "Parse error: {}", e),
            TypegenError::Table(e) => write!(f, "Type table error: {}", e),
            TypegenError::Json(e) => write!(f, "JSON error: {}", e),
            TypegenError::TypeNameMap(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TypegenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TypegenError::Io(e) => Some(e),
            TypegenError::Table(e) => Some(e),
            TypegenError::Json(e) => Some(e),
            TypegenError::TypeNameMap(e) => Some(e),
            TypegenError::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for TypegenError {
    fn from(e: std::io::Error) -> Self {
        TypegenError::Io(e)
    }
}

impl From<TableError> for TypegenError {
    fn from(e: TableError) -> Self {
        TypegenError::Table(e)
    }
}

impl From<serde_json::Error> for TypegenError {
    fn from(e: serde_json::Error) -> Self {
        TypegenError::Json(e)
    }
}

impl From<TypeNameMapError> for TypegenError {
    fn from(e: TypeNameMapError) -> Self {
        TypegenError::TypeNameMap(e)
    }
}

/// 宣言ファイルから型テーブル文書を生成
pub fn generate_table(config: &TypegenConfig) -> Result<TypegenResult, TypegenError> {
    let source = fs::read_to_string(&config.input)?;
    generate_table_from_source(&source, config)
}

/// 宣言テキストから型テーブル文書を生成
///
/// `config.input` はエラーメッセージのファイル名にだけ使う。
pub fn generate_table_from_source(
    source: &str,
    config: &TypegenConfig,
) -> Result<TypegenResult, TypegenError> {
    let mut ctx = CTypeContext::new();
    let tu = parse_source(source, &mut ctx)
        .map_err(|e| TypegenError::Parse(e.format_with_path(&config.input)))?;

    if config.verbose {
        eprintln!("Parsed {} declarations", tu.decls.len());
    }

    let mut registry = TypeRegistry::new(&ctx);
    if let Some(path) = &config.typename_map {
        if config.verbose {
            eprintln!("use {} as a typenamemap file", path.display());
        }
        registry = registry.with_typename_map(TypeNameMap::load(path)?);
    }
    registry.set_trace(config.trace, config.full_trace);
    if config.label_type {
        registry.register_label_type();
    }

    // 宣言順に登録する。typedef とタグだけの宣言は型の登録のみ
    let mut global_symbols = Vec::new();
    for decl in &tu.decls {
        let id = registry.type_name(&decl.ty);
        if decl.is_typedef() {
            continue;
        }
        if let Some(name) = &decl.name {
            global_symbols.push(SymbolEntry::new(name.clone(), id));
        }
    }

    if config.full_trace {
        eprint!("{}", registry.dump());
    }

    let mut doc = if config.disable_type_table {
        TypeTableDoc::new()
    } else {
        registry.to_table()
    };
    doc.global_symbols = global_symbols;

    let stats = registry.stats();
    if config.verbose {
        eprintln!("Registered {}", stats);
        eprintln!("Global symbols: {}", doc.global_symbols.len());
    }

    Ok(TypegenResult { doc, stats })
}

/// 型テーブルファイルを読み込む
pub fn load_table(path: &Path) -> Result<TypeTableDoc, TypegenError> {
    let json = fs::read_to_string(path)?;
    Ok(TypeTableDoc::from_json(&json)?)
}

/// 型テーブルファイルを読み込んで型環境を作る
pub fn load_env(path: &Path) -> Result<TypeEnv, TypegenError> {
    let doc = load_table(path)?;
    Ok(TypeEnv::from_doc(&doc)?)
}

/// 型テーブル文書から宣言テキストを再構成
///
/// struct / union / class の前方宣言、本体を持つ集成型の定義、
/// グローバルシンボルの宣言の順に 1 行ずつ出力する。
/// 定義は値として含む型が先に来るように並べる。
pub fn render_table(doc: &TypeTableDoc, config: &TypegenConfig) -> Result<String, TypegenError> {
    let env = TypeEnv::from_doc(doc)?;

    let mut lines: Vec<CodeFragment> = Vec::new();
    for id in env.ids() {
        if let Some(fwd) = env.forward_declaration(id) {
            if config.trace {
                eprintln!("[trace] forward {}", id);
            }
            lines.push(fwd);
        }
    }
    for id in env.definition_order() {
        if let Some(def) = env.define(id) {
            if config.trace {
                eprintln!("[trace] define {}", id);
            }
            lines.push(def);
        }
    }
    lines.extend(env.render_symbols(&doc.global_symbols));

    if config.verbose {
        eprintln!("Rendered {} declarations from {} entries", lines.len(), env.len());
    }

    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_str());
        out.push('\n');
    }
    Ok(out)
}
