//! 扫描选项、配置文件与统计信息（模块）
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 每扫描多少个文件输出一次进度
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// 扫描选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// 单文件扫描超时（由引擎执行）；None 表示不限制
    pub timeout: Option<Duration>,
    /// 最大文件大小（字节）；超过则跳过，但仍计入已扫描
    pub max_file_size: Option<u64>,
    /// 进度输出间隔（文件数）；0 表示关闭
    pub progress_every: usize,
    /// 是否跟随符号链接
    pub follow_links: bool,
    /// 排除列表：目录整棵子树跳过，文件单独跳过；相对路径以扫描根为基准
    pub exclusions: Vec<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_file_size: None,
            progress_every: DEFAULT_PROGRESS_EVERY,
            follow_links: false,
            exclusions: Vec::new(),
        }
    }
}

/// 配置文件顶层结构
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    scan: ScanSection,
}

/// `[scan]` 表
#[derive(Debug, Default, Deserialize)]
struct ScanSection {
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    max_file_size: Option<u64>,
    #[serde(default)]
    progress_every: Option<usize>,
    #[serde(default)]
    follow_links: Option<bool>,
    #[serde(default)]
    exclude: Vec<PathBuf>,
}

impl ScanOptions {
    /// 从 TOML 配置文件加载；缺省字段取默认值
    pub fn load(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_toml_str(&txt).with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let parsed: ConfigFile = toml::from_str(txt)?;
        let s = parsed.scan;
        let defaults = Self::default();
        Ok(Self {
            timeout: s.timeout_secs.filter(|&t| t > 0).map(Duration::from_secs),
            max_file_size: s.max_file_size,
            progress_every: s.progress_every.unwrap_or(defaults.progress_every),
            follow_links: s.follow_links.unwrap_or(defaults.follow_links),
            exclusions: s.exclude,
        })
    }

    /// 将排除项解析为以 `root` 为基准的路径（能规范化则规范化）
    pub(crate) fn resolved_exclusions(&self, root: &Path) -> Vec<PathBuf> {
        self.exclusions
            .iter()
            .map(|ex| {
                let joined = if ex.is_absolute() { ex.clone() } else { root.join(ex) };
                std::fs::canonicalize(&joined).unwrap_or(joined)
            })
            .collect()
    }
}

/// 运行中的计数器快照（便于界面轮询）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanCounts {
    pub files_scanned: usize,
    /// 每条命中规则计一次（同一文件命中两条规则计 2）
    pub files_matched: usize,
    pub files_failed: usize,
    pub files_clean: usize,
}

/// 一次扫描会话的最终统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub files_matched: usize,
    pub files_failed: usize,
    /// 扫描成功且无任何规则命中的文件数
    pub files_clean: usize,
    pub total_matches: usize,
    pub cancelled: bool,
}
