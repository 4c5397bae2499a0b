//! C/C++ Type Table CLI
//!
//! 宣言ファイルから型テーブル(JSON)を生成し、型テーブルから宣言を再構成する

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser as ClapParser;
use cxx_typetable::{
    generate_table, load_table, render_table, TypeEnv, TypeId, TypegenBuilder, TypegenConfig,
};

/// コマンドライン引数
#[derive(ClapParser)]
#[command(name = "cxx-typetable")]
#[command(version, about = "C/C++ type table generator and declarator synthesizer")]
struct Cli {
    /// 入力宣言ファイル（--table使用時は不要）
    input: Option<PathBuf>,

    /// 出力ファイル（省略時は標準出力）
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// 型テーブル(JSON)から宣言を再構成
    #[arg(long = "table")]
    table: Option<PathBuf>,

    /// 指定した型識別子の宣言を出力（--table と併用）
    #[arg(long = "declare", requires = "table")]
    declare: Option<String>,

    /// --declare で宣言する変数名
    #[arg(long = "name", default_value = "")]
    name: String,

    /// 指定したクラスの基底クラス指定を出力（--table と併用）
    #[arg(long = "bases", requires = "table")]
    bases: Option<String>,

    /// 型テーブルを生成してすぐ宣言に戻す
    #[arg(long = "roundtrip")]
    roundtrip: bool,

    /// 型名置換マップファイル
    #[arg(long = "typenamemap")]
    typenamemap: Option<PathBuf>,

    /// 型の登録をトレース (stderr)
    #[arg(long = "trace-type-table")]
    trace_type_table: bool,

    /// メモのヒットも含めてトレース (stderr)
    #[arg(long = "fulltrace-type-table")]
    fulltrace_type_table: bool,

    /// typeTable を出力しない
    #[arg(long = "disable-type-table")]
    disable_type_table: bool,

    /// ラベル型エントリを出力する
    #[arg(long = "label-type")]
    label_type: bool,

    /// 件数を表示 (stderr)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --table: 型テーブルから逆方向に処理（入力ファイル不要）
    if let Some(ref table) = cli.table {
        return run_reverse(&cli, table);
    }

    // 入力ファイルが必要
    let input = cli.input.clone().ok_or("Input file is required")?;
    let config = build_config(&cli, input);

    let result = generate_table(&config)?;

    let text = if cli.roundtrip {
        // --roundtrip: 生成した型テーブルから宣言を再構成
        render_table(&result.doc, &config)?
    } else {
        let mut json = result.doc.to_json()?;
        json.push('\n');
        json
    };

    write_output(cli.output.as_ref(), &text)
}

/// 型テーブルから宣言を再構成して出力
fn run_reverse(cli: &Cli, table: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let doc = load_table(table)?;

    let text = if let Some(ref id) = cli.declare {
        let env = TypeEnv::from_doc(&doc)?;
        format!("{}\n", env.declare(&TypeId::from(id.as_str()), &cli.name))
    } else if let Some(ref id) = cli.bases {
        let env = TypeEnv::from_doc(&doc)?;
        format!("{}\n", env.bases(&TypeId::from(id.as_str())))
    } else {
        let config = build_config(cli, table.clone());
        render_table(&doc, &config)?
    };

    write_output(cli.output.as_ref(), &text)
}

fn build_config(cli: &Cli, input: PathBuf) -> TypegenConfig {
    let mut builder = TypegenBuilder::new(input)
        .disable_type_table(cli.disable_type_table)
        .label_type(cli.label_type)
        .verbose(cli.verbose)
        .trace(cli.trace_type_table, cli.fulltrace_type_table);
    if let Some(ref map) = cli.typenamemap {
        builder = builder.typename_map(map.clone());
    }
    builder.build()
}

fn write_output(output: Option<&PathBuf>, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut out: Box<dyn Write> = if let Some(path) = output {
        Box::new(BufWriter::new(File::create(path)?))
    } else {
        Box::new(io::stdout().lock())
    };
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}
