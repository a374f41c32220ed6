use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use yarahunter_core::{export, ExportFormat, RuleSource, ScanOptions, YaraSession};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "yarahunter", version, about = "YARA-X 目录扫描与取证导出")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 用规则扫描目录并导出结果
    Scan {
        /// 输入目录（递归扫描）
        #[arg(long)]
        input: PathBuf,

        /// YARA 规则文件
        #[arg(long)]
        rules: PathBuf,

        /// 输出文件
        #[arg(long, default_value = "./result.json")]
        output: PathBuf,

        /// 导出格式：csv、json 或 report
        #[arg(long, default_value = "json", value_parser = ["csv", "json", "report"])]
        format: String,

        /// 配置文件（TOML，[scan] 表）；命令行参数优先
        #[arg(long)]
        config: Option<PathBuf>,

        /// 单文件扫描超时（秒）
        #[arg(long)]
        timeout: Option<u64>,

        /// 最大扫描文件大小（单位字节）
        #[arg(long)]
        max_file_size: Option<u64>,

        /// 排除的目录或文件（可重复；相对路径以输入目录为基准）
        #[arg(long)]
        exclude: Vec<PathBuf>,

        /// 只导出该文件的命中结果
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// 仅编译规则，检查语法
    Check {
        /// YARA 规则文件
        #[arg(long)]
        rules: PathBuf,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, rules, output, format, config, timeout, max_file_size, exclude, file } => {
            info!(?input, ?rules, ?output, "starting scan");

            let mut options = match &config {
                Some(path) => ScanOptions::load(path)?,
                None => ScanOptions::default(),
            };
            if let Some(secs) = timeout {
                options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            if max_file_size.is_some() {
                options.max_file_size = max_file_size;
            }
            options.exclusions.extend(exclude);
            let format: ExportFormat = format.parse()?;

            let session = YaraSession::yara(options);
            session.compile(RuleSource::File(rules)).context("compile rules")?;
            let summary = session
                .start_scan(&input)
                .context("start scan")?
                .wait()
                .with_context(|| format!("scan {}", input.display()))?;

            let results = match &file {
                Some(path) => {
                    let path = std::fs::canonicalize(path)
                        .with_context(|| format!("resolve {}", path.display()))?;
                    session.results().results_for_file(&path.display().to_string())
                }
                None => session.snapshot(),
            };

            // 以缓冲方式打开输出文件
            let mut out = BufWriter::new(File::create(&output).context("create output file")?);
            export(format, &results, &session.export_meta(), &mut out).context("export results")?;
            out.flush().context("flush output file")?;

            for diag in session.diagnostics().errors() {
                warn!("{}", diag.message);
            }
            info!(
                files_scanned = summary.files_scanned,
                files_matched = summary.files_matched,
                files_failed = summary.files_failed,
                total_matches = summary.total_matches,
                exported = results.len(),
                "scan finished"
            );
        }
        Commands::Check { rules } => {
            let session = YaraSession::yara(ScanOptions::default());
            if let Err(err) = session.compile(RuleSource::File(rules.clone())) {
                error!(rules = %rules.display(), "{err}");
                bail!("rules failed to compile: {}", rules.display());
            }
            info!(rules = %rules.display(), "rules compiled");
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
