//! 扫描会话：single-flight 守卫、规则集持有、后台 worker 与完成信号
//!
//! 状态机：Idle → Running → Idle。Running 期间再次启动直接拒绝（不排队），
//! 也拒绝重新编译规则。worker 结束时先释放守卫再发布结果，
//! 因此 `ScanHandle::wait` 返回后 `is_running()` 必为 false。
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, info};

use crate::diagnostics::{DiagnosticLog, Level};
use crate::engine::{MatchEngine, YaraX};
use crate::error::SessionError;
use crate::export::ExportMeta;
use crate::options::{ScanCounts, ScanOptions, ScanSummary};
use crate::rules::{CompiledRuleSet, RuleSource};
use crate::scan::{scan_tree, ScanContext};
use crate::store::ResultStore;
use crate::types::ScanResult;

/// 协作式取消标记：worker 在文件之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 持有期间守卫置位，drop（含 panic 展开）时清除
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type Outcome = Result<ScanSummary, SessionError>;

/// 一次运行中扫描的句柄
#[derive(Debug)]
pub struct ScanHandle {
    done: Receiver<Outcome>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// 请求在处理完当前文件后停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// worker 是否已结束（结束时结果已在通道中）
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// 阻塞直到扫描结束，返回最终统计或会话级错误
    pub fn wait(mut self) -> Outcome {
        let outcome = self.done.recv().unwrap_or(Err(SessionError::WorkerLost));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome
    }
}

/// 扫描会话（进程内单例由调用方持有）
pub struct ScanSession<E: MatchEngine> {
    engine: Arc<E>,
    options: ScanOptions,
    rules: Mutex<Option<Arc<CompiledRuleSet<E>>>>,
    scan_root: Mutex<Option<PathBuf>>,
    running: Arc<AtomicBool>,
    store: Arc<ResultStore>,
    log: Arc<DiagnosticLog>,
}

/// 基于 YARA-X 的会话
pub type YaraSession = ScanSession<YaraX>;

impl YaraSession {
    pub fn yara(options: ScanOptions) -> Self {
        Self::new(YaraX, options)
    }
}

impl<E: MatchEngine> ScanSession<E> {
    pub fn new(engine: E, options: ScanOptions) -> Self {
        Self {
            engine: Arc::new(engine),
            options,
            rules: Mutex::new(None),
            scan_root: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            store: Arc::new(ResultStore::default()),
            log: Arc::new(DiagnosticLog::default()),
        }
    }

    fn lock_rules(&self) -> MutexGuard<'_, Option<Arc<CompiledRuleSet<E>>>> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_root(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.scan_root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// 编译规则并替换当前规则集
    ///
    /// 失败（语法错误或扫描器创建失败）时保留原规则集；扫描进行中直接拒绝。
    pub fn compile(&self, source: RuleSource) -> Result<(), SessionError> {
        let mut installed = self.lock_rules();
        if self.is_running() {
            self.log.error("Cannot recompile rules while a scan is in progress");
            return Err(SessionError::ScanInProgress);
        }
        self.log.info("Starting YARA-X compilation...");
        let compiled = CompiledRuleSet::compile(&*self.engine, &source, &self.options).map_err(|err| {
            self.log.error(format!("Compilation failed: {err}"));
            err
        })?;
        // 旧规则集在此释放（运行中的扫描若仍持有引用则在其结束后释放）
        *installed = Some(Arc::new(compiled));
        self.log.record(Level::Success, "Rules compiled successfully!");
        Ok(())
    }

    pub fn has_rules(&self) -> bool {
        self.lock_rules().is_some()
    }

    /// 当前规则集的来源标识
    pub fn rule_source(&self) -> Option<String> {
        self.lock_rules().as_ref().map(|set| set.source_id().to_string())
    }

    /// 启动后台扫描；已有扫描在运行时立即返回 `AlreadyRunning`，不影响现有扫描
    pub fn start_scan(&self, root: impl AsRef<Path>) -> Result<ScanHandle, SessionError> {
        if self.running.swap(true, Ordering::AcqRel) {
            self.log.info("Scan already in progress");
            return Err(SessionError::AlreadyRunning);
        }
        let guard = RunGuard(Arc::clone(&self.running));

        let Some(rules) = self.lock_rules().clone() else {
            self.log.error("No compiled rules available");
            return Err(SessionError::NoRules);
        };

        let root = root.as_ref().to_path_buf();
        self.store.reset();
        // 诊断日志按会话保留
        self.log.clear();
        *self.lock_root() = Some(root.clone());
        self.log.info("Starting directory scan...");
        info!(root = %root.display(), rules = rules.source_id(), "starting scan");

        let (tx, rx) = bounded::<Outcome>(1);
        let cancel = CancelToken::default();
        let engine = Arc::clone(&self.engine);
        let store = Arc::clone(&self.store);
        let log = Arc::clone(&self.log);
        let options = self.options.clone();
        let worker_cancel = cancel.clone();

        let worker = thread::Builder::new()
            .name("yarahunter-scan".to_string())
            .spawn(move || {
                let ctx = ScanContext { store: &store, log: &log, options: &options, cancel: &worker_cancel };
                let outcome = run_session(&*engine, &rules, &root, &ctx);
                drop(guard);
                let _ = tx.send(outcome);
            })
            .map_err(|err| {
                self.log.error(format!("Failed to start scan worker: {err}"));
                SessionError::Spawn(err)
            })?;

        Ok(ScanHandle { done: rx, cancel, worker: Some(worker) })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 只读访问结果（快照与聚合查询）
    pub fn results(&self) -> &ResultStore {
        &self.store
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.store.snapshot()
    }

    pub fn counts(&self) -> ScanCounts {
        self.store.counts()
    }

    /// 导出所需的会话元数据（时间戳取调用时刻）
    pub fn export_meta(&self) -> ExportMeta {
        let counts = self.counts();
        ExportMeta {
            timestamp: chrono::Utc::now(),
            files_scanned: counts.files_scanned,
            files_matched: counts.files_matched,
            total_matches: self.store.total_match_count(),
            rules_source: self.rule_source().unwrap_or_else(|| "Inline Rules".to_string()),
            scan_root: self.lock_root().as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// worker 主体：规范化根路径 → 创建扫描器 → 遍历；无论成败都输出最终计数
fn run_session<E: MatchEngine>(engine: &E, rules: &CompiledRuleSet<E>, root: &Path, ctx: &ScanContext<'_>) -> Outcome {
    let outcome = scan_root(engine, rules, root, ctx);
    match &outcome {
        Ok(summary) if summary.cancelled => ctx.log.record(Level::Complete, "Scan stopped before completion"),
        Ok(_) => ctx.log.record(Level::Complete, "Scan finished!"),
        Err(err) => ctx.log.error(format!("Directory scan failed: {err}")),
    }
    let counts = ctx.store.counts();
    ctx.log.info(format!("Files scanned: {}", counts.files_scanned));
    ctx.log.info(format!("Files matched: {}", counts.files_matched));
    ctx.log.info(format!("Total matches: {}", ctx.store.total_match_count()));
    debug!(files_scanned = counts.files_scanned, files_failed = counts.files_failed, "scan worker exiting");
    outcome
}

fn scan_root<E: MatchEngine>(engine: &E, rules: &CompiledRuleSet<E>, root: &Path, ctx: &ScanContext<'_>) -> Outcome {
    let root = std::fs::canonicalize(root)
        .map_err(|source| SessionError::Enumeration { path: root.to_path_buf(), source })?;
    let mut scanner = rules.create_scanner(engine, ctx.options)?;
    scan_tree(scanner.as_mut(), &root, ctx)
}
