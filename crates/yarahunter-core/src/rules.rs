//! 规则来源与已编译规则集
use std::path::PathBuf;

use crate::engine::{MatchEngine, RuleScanner};
use crate::error::{EngineError, SessionError};
use crate::options::ScanOptions;

/// 规则文本来源：内联文本或规则文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Inline(String),
    File(PathBuf),
}

impl RuleSource {
    /// 用于导出元数据的来源标识
    pub fn identifier(&self) -> String {
        match self {
            RuleSource::Inline(_) => "Inline Rules".to_string(),
            RuleSource::File(path) => path.display().to_string(),
        }
    }

    pub(crate) fn load(&self) -> Result<String, SessionError> {
        let text = match self {
            RuleSource::Inline(text) => text.clone(),
            RuleSource::File(path) => std::fs::read_to_string(path)
                .map_err(|source| SessionError::RuleFile { path: path.clone(), source })?,
        };
        if text.trim().is_empty() {
            return Err(SessionError::EmptyRules);
        }
        Ok(text)
    }
}

/// 已编译规则集（与扫描器成对）
///
/// 构造时完成“编译 + 创建扫描器”，任一步失败都不会留下半成品；
/// 值被丢弃即释放规则。扫描器借用规则，因此由扫描 worker 按会话创建并复用。
pub struct CompiledRuleSet<E: MatchEngine> {
    rules: E::Rules,
    source_id: String,
}

impl<E: MatchEngine> CompiledRuleSet<E> {
    pub fn compile(engine: &E, source: &RuleSource, options: &ScanOptions) -> Result<Self, SessionError> {
        let text = source.load()?;
        let rules = engine.compile(&text)?;
        // 扫描器创建失败时 rules 随之释放
        let scanner = engine.create_scanner(&rules, options)?;
        drop(scanner);
        Ok(Self { rules, source_id: source.identifier() })
    }

    pub fn create_scanner<'r>(
        &'r self,
        engine: &E,
        options: &ScanOptions,
    ) -> Result<Box<dyn RuleScanner + 'r>, EngineError> {
        engine.create_scanner(&self.rules, options)
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}
