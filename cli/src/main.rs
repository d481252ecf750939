//! revmark 命令行入口
//!
//! `revmark run` 对目录下的全部 PDF 并行执行"脱敏 + 插入 + 修订表
//! 更新"，`revmark convert` 在配置格式之间互转。
//!
//! 进度在调用线程上打印为 "已处理 N/M"；每次运行在输出目录留一份
//! 带时间戳的运行日志，逐文件记录成败。

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use revmark_core::{discover_jobs, interchange, run_batch, run_job, BatchOptions, JobConfig};
use revmark_pdf::PdfDocument;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

#[derive(Parser)]
#[command(name = "revmark", about = "批量更新图纸 PDF 的修订信息", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 批量处理一个目录下的 PDF
    Run(RunArgs),
    /// 在配置格式之间互转（json / xlsx / CSV 目录）
    Convert(ConvertArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// 输入根目录
    #[arg(short, long)]
    input: PathBuf,

    /// 输出根目录，内部镜像输入的相对路径
    #[arg(short, long)]
    output: PathBuf,

    /// 配置文件：.json、.xlsx 或 CSV 目录
    #[arg(short, long)]
    config: PathBuf,

    /// 递归处理子目录
    #[arg(short, long)]
    recursive: bool,

    /// 工作线程数，缺省跟随 CPU 并行度
    #[arg(short, long)]
    jobs: Option<usize>,

    /// 新修订行的日期，覆盖配置中的值
    #[arg(long)]
    date: Option<String>,

    /// 新修订行的说明，覆盖配置中的值
    #[arg(long)]
    description: Option<String>,

    /// 运行日志路径，缺省写到输出目录下带时间戳的文件
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Parser)]
struct ConvertArgs {
    /// 源配置：.json、.xlsx 或 CSV 目录
    #[arg(short, long)]
    from: PathBuf,

    /// 目标：.json 文件或 CSV 目录
    #[arg(short, long)]
    to: PathBuf,

    /// 目标为 .json 时只写出删除区域列表（编辑器的快捷导入形式）
    #[arg(long)]
    regions_only: bool,
}

/// 逐文件的运行日志，工作线程共用一份
struct RunLog {
    file: Mutex<fs::File>,
}

impl RunLog {
    fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("创建日志目录失败 {}", dir.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("打开运行日志失败 {}", path.display()))?;
        Ok(RunLog { file: Mutex::new(file) })
    }

    fn write_line(&self, level: &str, message: &str) {
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }

    fn info(&self, message: &str) {
        self.write_line("INFO", message);
    }

    fn error(&self, message: &str) {
        self.write_line("ERROR", message);
    }
}

/// 命令行覆盖项合入配置
fn apply_overrides(config: &mut JobConfig, date: Option<String>, description: Option<String>) {
    if let Some(date) = date {
        config.revision.revision_date = date;
    }
    if let Some(description) = description {
        config.revision.revision_description = description;
    }
}

fn default_log_path(output_root: &Path) -> PathBuf {
    output_root.join(format!(
        "revmark-{}.log",
        Local::now().format("%Y%m%d-%H%M%S")
    ))
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let mut config = JobConfig::load(&args.config)
        .with_context(|| format!("装载配置失败 {}", args.config.display()))?;
    apply_overrides(&mut config, args.date, args.description);
    config.normalize_fonts();
    config.validate().map_err(|e| anyhow!("{e}"))?;

    let jobs = discover_jobs(&args.input, &args.output, args.recursive)
        .with_context(|| format!("枚举输入目录失败 {}", args.input.display()))?;
    if jobs.is_empty() {
        log::warn!("[批处理] {} 下没有找到 PDF 文件", args.input.display());
        return Ok(ExitCode::SUCCESS);
    }
    log::info!("[批处理] 共 {} 个文件待处理", jobs.len());

    let log_path = args
        .log_file
        .unwrap_or_else(|| default_log_path(&args.output));
    let run_log = RunLog::create(&log_path)?;
    run_log.info(&format!(
        "开始批处理：{} 个文件，输入 {}，输出 {}",
        jobs.len(),
        args.input.display(),
        args.output.display()
    ));

    let mut options = BatchOptions::default();
    if let Some(jobs_count) = args.jobs {
        options.workers = jobs_count.max(1);
    }

    let config = &config;
    let run_log_ref = &run_log;
    let mut last_reported = 0usize;
    let summary = run_batch(
        jobs,
        &options,
        |job| match run_job::<PdfDocument>(&job.input_path, &job.output_path, config) {
            Ok(report) => {
                if report.warnings.is_empty() {
                    run_log_ref.info(&format!("已处理 {}", job.input_path.display()));
                } else {
                    run_log_ref.info(&format!(
                        "已处理 {}（{} 条警告）",
                        job.input_path.display(),
                        report.warnings.len()
                    ));
                }
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                run_log_ref.error(&format!("{} 失败: {}", job.input_path.display(), reason));
                Err(reason)
            }
        },
        |done, total| {
            if done != last_reported {
                last_reported = done;
                log::info!("[批处理] 已处理 {done}/{total} 个文件");
            }
        },
    );

    run_log.info(&format!(
        "批处理结束：成功 {}，失败 {}",
        summary.succeeded,
        summary.failed.len()
    ));
    log::info!(
        "[批处理] 完成：共 {}，成功 {}，失败 {}",
        summary.total,
        summary.succeeded,
        summary.failed.len()
    );
    for path in &summary.failed {
        log::error!("[批处理] 处理失败: {}", path.display());
    }

    if summary.failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_convert(args: ConvertArgs) -> Result<ExitCode> {
    let config = JobConfig::load(&args.from)
        .with_context(|| format!("装载配置失败 {}", args.from.display()))?;

    let ext = args
        .to
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("")
        .to_lowercase();
    if ext == "json" {
        if args.regions_only {
            interchange::export_regions_json(&config.regions, &args.to)
                .map_err(|e| anyhow!("{e}"))?;
        } else {
            config.save_json(&args.to).map_err(|e| anyhow!("{e}"))?;
        }
    } else if ext.is_empty() {
        interchange::export_csv_dir(&config, &args.to).map_err(|e| anyhow!("{e}"))?;
    } else {
        return Err(anyhow!("不支持的目标格式: {ext}"));
    }
    log::info!("[互通] 已写出 {}", args.to.display());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Convert(args) => cmd_convert(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
