//! 扫描主流程：递归遍历目录，逐文件调用引擎并收集命中
//!
//! 运行在会话的唯一后台 worker 上，扫描器在此串行复用。
//! - 遍历顺序取决于文件系统，不做排序
//! - 单文件失败（读取失败/超时/引擎错误）只记诊断，继续下一个文件
//! - 仅扫描根目录本身无法打开时视为致命错误
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::collector::MatchCollector;
use crate::diagnostics::{DiagnosticLog, Level};
use crate::engine::{RuleHit, RuleScanner};
use crate::error::{ScanFailure, SessionError};
use crate::options::{ScanOptions, ScanSummary};
use crate::session::CancelToken;
use crate::store::ResultStore;

/// worker 所需的共享状态（均为只读借用或内部加锁）
pub(crate) struct ScanContext<'a> {
    pub(crate) store: &'a ResultStore,
    pub(crate) log: &'a DiagnosticLog,
    pub(crate) options: &'a ScanOptions,
    pub(crate) cancel: &'a CancelToken,
}

/// 遍历 `root` 下所有普通文件并扫描；`root` 需为已规范化的绝对路径
pub(crate) fn scan_tree(scanner: &mut (dyn RuleScanner + '_), root: &Path, ctx: &ScanContext<'_>) -> Result<ScanSummary, SessionError> {
    let exclusions = ctx.options.resolved_exclusions(root);
    let walker = WalkDir::new(root)
        .follow_links(ctx.options.follow_links)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(&exclusions, e.path()));

    let mut cancelled = false;
    for entry in walker {
        if ctx.cancel.is_cancelled() {
            cancelled = true;
            ctx.log.info("Scan cancelled");
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                return Err(SessionError::Enumeration { path: root.to_path_buf(), source: err.into() });
            }
            Err(err) => {
                let at = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                ctx.log.error(format!("Cannot enumerate {at}: {err}"));
                continue;
            }
        };
        if entry.depth() == 0 {
            if !entry.file_type().is_dir() {
                return Err(SessionError::NotADirectory(root.to_path_buf()));
            }
            continue;
        }
        if !entry.file_type().is_file() { continue; }

        scan_file(scanner, entry.path(), ctx);

        // 无论单文件结果如何都计数
        let scanned = ctx.store.record_scanned();
        let every = ctx.options.progress_every;
        if every > 0 && scanned % every == 0 {
            ctx.log.record(Level::Progress, format!("Scanned {scanned} files..."));
        }
    }

    let counts = ctx.store.counts();
    Ok(ScanSummary {
        files_scanned: counts.files_scanned,
        files_matched: counts.files_matched,
        files_failed: counts.files_failed,
        files_clean: counts.files_clean,
        total_matches: ctx.store.total_match_count(),
        cancelled,
    })
}

fn is_excluded(exclusions: &[PathBuf], path: &Path) -> bool {
    exclusions.iter().any(|ex| path.starts_with(ex))
}

/// 扫描单个文件；命中规则在回调内即时写入结果存储
fn scan_file(scanner: &mut (dyn RuleScanner + '_), path: &Path, ctx: &ScanContext<'_>) {
    if let Some(max) = ctx.options.max_file_size {
        if let Ok(md) = std::fs::metadata(path) {
            if md.len() > max {
                ctx.log.info(format!("Skipping {} ({} bytes exceeds limit of {max})", path.display(), md.len()));
                return;
            }
        }
    }

    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(err) => {
            ctx.store.record_failed();
            ctx.log.error(format!("Failed to read file: {}: {err}", path.display()));
            return;
        }
    };

    let collector = MatchCollector::new(path);
    let mut rules_hit = 0usize;
    let outcome = scanner.scan(&data, &mut |hit: RuleHit| {
        let result = collector.collect(hit);
        ctx.log.record(
            Level::Match,
            format!(
                "{} in {} ({} patterns, {} matches)",
                result.rule_name,
                result.file_name(),
                result.unique_patterns(),
                result.total_matches()
            ),
        );
        ctx.store.append(result);
        // 每条命中规则计一次
        ctx.store.record_matched();
        rules_hit += 1;
    });

    if let Err(failure) = outcome {
        ctx.store.record_failed();
        let msg = match failure {
            ScanFailure::Timeout => format!("Scan timeout for: {}", path.display()),
            ScanFailure::Syntax(detail) => format!("Syntax error for: {}: {detail}", path.display()),
            ScanFailure::Other(detail) => format!("Failed to scan: {}: {detail}", path.display()),
        };
        ctx.log.error(msg);
    } else if rules_hit == 0 {
        ctx.store.record_clean(collector.filename().to_string());
    }
}
