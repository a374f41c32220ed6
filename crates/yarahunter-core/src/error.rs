//! 错误类型（按传播范围划分）
//!
//! - 单次编译：`CompileError` / `EngineError`
//! - 单个文件：`ScanFailure`，只记录诊断，不会中断会话
//! - 会话级：`SessionError`，仅包含遍历失败、重复启动等需要上报给调用方的结果
use std::path::PathBuf;
use thiserror::Error;

/// 规则文本被引擎拒绝；`message` 为引擎给出的原始诊断
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation failed: {message}")]
pub struct CompileError {
    pub message: String,
}

/// 基于已编译规则创建扫描器失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scanner creation failed: {message}")]
pub struct EngineError {
    pub message: String,
}

/// 单文件扫描失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanFailure {
    #[error("scan timeout")]
    Timeout,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("scan failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("scan already in progress")]
    AlreadyRunning,

    #[error("cannot recompile rules while a scan is in progress")]
    ScanInProgress,

    #[error("no compiled rules available")]
    NoRules,

    #[error("no rule content available")]
    EmptyRules,

    #[error("cannot read rule file: {path}")]
    RuleFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("directory scan failed: {path}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to spawn scan worker")]
    Spawn(#[source] std::io::Error),

    #[error("scan worker terminated without reporting an outcome")]
    WorkerLost,
}
