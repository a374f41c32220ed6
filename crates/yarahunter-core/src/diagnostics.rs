//! 诊断日志：按时间顺序累积所有 info/错误/成功行，并同步输出到 tracing
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Progress,
    Match,
    Success,
    Complete,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "[INFO]",
            Level::Progress => "[PROGRESS]",
            Level::Match => "[MATCH]",
            Level::Success => "[SUCCESS]",
            Level::Complete => "[COMPLETE]",
            Level::Error => "[ERR]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level.tag(), self.message)
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticLog {
    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Error => error!(target: "yarahunter::diag", "{message}"),
            _ => info!(target: "yarahunter::diag", kind = level.tag(), "{message}"),
        }
        self.lock().push(Diagnostic { level, message });
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.record(Level::Info, message);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.record(Level::Error, message);
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// 带级别前缀的文本行
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.lock().iter().filter(|d| d.level == Level::Error).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
