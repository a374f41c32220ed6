//! 匹配引擎接口与 YARA-X 实现
//!
//! 引擎以“访问者”方式上报命中：每条命中规则调用一次 `on_rule`，
//! 其中已按 规则 → 模式 → 命中位置 三层展开，收集器无需接触引擎句柄。
use std::ops::Range;

use crate::error::{CompileError, EngineError, ScanFailure};
use crate::options::ScanOptions;

/// 一次命中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub offset: u64,
    pub length: u64,
}

impl Occurrence {
    pub fn from_range(range: Range<usize>) -> Self {
        Self { offset: range.start as u64, length: range.len() as u64 }
    }
}

/// 规则内的一个模式及其全部命中位置（引擎给出的顺序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub identifier: String,
    pub occurrences: Vec<Occurrence>,
}

/// 引擎上报的一条命中规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub identifier: String,
    pub namespace: String,
    pub tags: Vec<String>,
    pub patterns: Vec<PatternHit>,
}

/// 可复用扫描器：一次编译、多次扫描；不可跨线程并发使用
pub trait RuleScanner {
    /// 扫描一段字节；返回前对每条命中规则同步调用 `on_rule`
    fn scan(&mut self, data: &[u8], on_rule: &mut dyn FnMut(RuleHit)) -> Result<(), ScanFailure>;
}

/// 匹配引擎：编译规则文本，并基于已编译规则创建扫描器
pub trait MatchEngine: Send + Sync + 'static {
    type Rules: Send + Sync + 'static;

    fn compile(&self, source: &str) -> Result<Self::Rules, CompileError>;

    fn create_scanner<'r>(
        &self,
        rules: &'r Self::Rules,
        options: &ScanOptions,
    ) -> Result<Box<dyn RuleScanner + 'r>, EngineError>;
}

/// YARA-X 引擎
#[derive(Debug, Default, Clone, Copy)]
pub struct YaraX;

impl MatchEngine for YaraX {
    type Rules = yara_x::Rules;

    fn compile(&self, source: &str) -> Result<yara_x::Rules, CompileError> {
        yara_x::compile(source).map_err(|e| CompileError { message: e.to_string() })
    }

    fn create_scanner<'r>(
        &self,
        rules: &'r yara_x::Rules,
        options: &ScanOptions,
    ) -> Result<Box<dyn RuleScanner + 'r>, EngineError> {
        let mut inner = yara_x::Scanner::new(rules);
        if let Some(timeout) = options.timeout {
            inner.set_timeout(timeout);
        }
        Ok(Box::new(YaraXScanner { inner }))
    }
}

struct YaraXScanner<'r> {
    inner: yara_x::Scanner<'r>,
}

impl RuleScanner for YaraXScanner<'_> {
    fn scan(&mut self, data: &[u8], on_rule: &mut dyn FnMut(RuleHit)) -> Result<(), ScanFailure> {
        let results = self.inner.scan(data).map_err(|err| match err {
            yara_x::ScanError::Timeout => ScanFailure::Timeout,
            other => ScanFailure::Other(other.to_string()),
        })?;

        for rule in results.matching_rules() {
            let patterns = rule
                .patterns()
                .map(|pattern| PatternHit {
                    identifier: pattern.identifier().to_string(),
                    occurrences: pattern.matches().map(|m| Occurrence::from_range(m.range())).collect(),
                })
                .collect();
            on_rule(RuleHit {
                identifier: rule.identifier().to_string(),
                namespace: rule.namespace().to_string(),
                tags: rule.tags().map(|t| t.identifier().to_string()).collect(),
                patterns,
            });
        }
        Ok(())
    }
}
