//! 规则扫描编排核心
//!
//! 设计要点：
//! - 规则编译与匹配交给 YARA-X（经 `MatchEngine` 接口），本库只做编排与结果收集。
//! - 同一时间最多一个扫描会话（single-flight）；唯一的后台 worker 串行遍历目录并复用扫描器。
//! - 命中证据在引擎回调内按 (offset, length) 重新打开文件回读，与扫描缓冲区解耦。
//! - 结果存储由一把短持有的互斥锁保护，读者只拿到快照副本。
//! - 导出（CSV/JSON/文本报告）只消费快照，不接触存储。

mod collector;
mod diagnostics;
mod engine;
mod error;
mod export;
mod options;
mod rules;
mod scan;
mod session;
mod source;
mod store;
mod types;

pub use collector::{render_evidence, ELLIPSIS, PREVIEW_LIMIT, READ_ERROR_MARKER};
pub use diagnostics::{Diagnostic, DiagnosticLog, Level};
pub use engine::{MatchEngine, Occurrence, PatternHit, RuleHit, RuleScanner, YaraX};
pub use error::{CompileError, EngineError, ScanFailure, SessionError};
pub use export::{export, write_csv, write_json, write_report, ExportFormat, ExportMeta, RECOMMENDATIONS};
pub use options::{ScanCounts, ScanOptions, ScanSummary, DEFAULT_PROGRESS_EVERY};
pub use rules::{CompiledRuleSet, RuleSource};
pub use session::{CancelToken, ScanHandle, ScanSession, YaraSession};
pub use store::ResultStore;
pub use types::{PatternKind, PatternMatch, ScanResult};
