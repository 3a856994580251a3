//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `script-check`: 检查命令脚本（语法、命令名、表达式类型）

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use command_script::{AstLoader, DiagnosticResult, ParsedScript, ScriptConfig, Variables};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 检查脚本文件
    ///
    /// 不含变量的命令还会做表达式类型检查；含变量的命令只检查语法。
    ScriptCheck {
        /// 脚本文件或目录（默认：scripts）
        path: Option<PathBuf>,

        /// 配置文件（JSON）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::CheckAll => check_all(),
        Commands::ScriptCheck { path, config } => script_check(path.as_deref(), config.as_deref()),
    }
}

fn check_all() -> anyhow::Result<()> {
    let sh = Shell::new()?;

    eprintln!("\n==> cargo fmt --all -- --check");
    cmd!(sh, "cargo fmt --all -- --check").run()?;

    eprintln!("\n==> cargo clippy --workspace --all-targets");
    cmd!(sh, "cargo clippy --workspace --all-targets").run()?;

    eprintln!("\n==> cargo test --workspace");
    cmd!(sh, "cargo test --workspace").run()?;

    Ok(())
}

//=============================================================================
// script-check 命令实现
//=============================================================================

/// 默认脚本目录（相对于 workspace root）
const DEFAULT_SCRIPTS_DIR: &str = "scripts";

/// 单个文件的诊断
struct FileReport {
    script_id: String,
    diagnostics: DiagnosticResult,
}

/// 脚本检查结果
#[derive(Default)]
struct ScriptCheckResult {
    /// 检查的脚本数量
    scripts_checked: usize,
    /// 无法读取的文件数量
    read_errors: usize,
    reports: Vec<FileReport>,
}

impl ScriptCheckResult {
    fn error_count(&self) -> usize {
        self.read_errors
            + self
                .reports
                .iter()
                .map(|r| r.diagnostics.error_count())
                .sum::<usize>()
    }
}

/// 执行脚本检查
fn script_check(path: Option<&Path>, config_path: Option<&Path>) -> anyhow::Result<()> {
    let loader = match config_path {
        Some(p) => AstLoader::from_config_file(p)?,
        None => AstLoader::new(ScriptConfig::default()),
    };
    let config = loader.config();

    let root = path.unwrap_or(Path::new(DEFAULT_SCRIPTS_DIR));
    if !root.exists() {
        anyhow::bail!(
            "路径不存在: {}\n请在 workspace 根目录运行，或指定脚本路径",
            root.display()
        );
    }

    let files = collect_script_files(root, &config.extension)?;
    if files.is_empty() {
        eprintln!("未找到脚本文件（.{}）", config.extension);
        return Ok(());
    }

    eprintln!("==> 检查 {} 个脚本文件...\n", files.len());

    let mut result = ScriptCheckResult::default();
    for file in &files {
        result.scripts_checked += 1;
        match loader.load(file) {
            Ok(script) => result.reports.push(FileReport {
                script_id: file.display().to_string(),
                diagnostics: check_commands(&script, config),
            }),
            Err(e) => {
                eprintln!("[ERROR] {e}");
                result.read_errors += 1;
            }
        }
    }

    print_check_result(&result);

    if result.error_count() > 0 {
        anyhow::bail!("脚本检查发现错误");
    }
    Ok(())
}

/// 收集脚本文件（单个文件直接返回）
fn collect_script_files(root: &Path, extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// 逐条命令做静态检查（块内子命令一并检查）
fn check_commands(script: &ParsedScript, config: &ScriptConfig) -> DiagnosticResult {
    let vars = Variables::for_config(config);
    let mut diagnostics = DiagnosticResult::new();
    for command in &script.commands {
        diagnostics.merge(command.check(&vars, config));
    }
    debug!(commands = script.commands.len(), errors = diagnostics.len(), "checked script");
    diagnostics
}

/// 输出检查结果
fn print_check_result(result: &ScriptCheckResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个脚本", result.scripts_checked);
    eprintln!();

    for report in &result.reports {
        for diag in &report.diagnostics {
            eprintln!("{}: {}", report.script_id, diag);
        }
    }

    let error_count = result.error_count();
    let fatal_count: usize = result
        .reports
        .iter()
        .map(|r| r.diagnostics.fatal_count())
        .sum();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误（其中 {} 个致命）", error_count, fatal_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
