//! 结果模型（对外暴露）
use std::collections::HashSet;

/// 某个模式在文件中的一次具体命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// 模式标识（如 `$string1`），仅在所属规则内唯一
    pub pattern_id: String,
    pub offset: u64,
    pub length: u64,
    /// 回读到的原始字节；回读失败时为空
    pub data: Vec<u8>,
    /// 可打印 ASCII 预览，不可打印字节显示为 `.`
    pub data_preview: String,
    /// 大写十六进制，空格分隔
    pub hex_dump: String,
}

/// 一条规则在一个文件上的命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// 文件绝对路径
    pub filename: String,
    pub rule_name: String,
    /// 引擎未给出命名空间时为空串
    pub rule_namespace: String,
    pub tags: Vec<String>,
    /// 按发现顺序排列，同一 pattern_id 可出现多次
    pub pattern_matches: Vec<PatternMatch>,
}

impl ScanResult {
    pub fn new(filename: impl Into<String>, rule_name: impl Into<String>, rule_namespace: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            rule_name: rule_name.into(),
            rule_namespace: rule_namespace.into(),
            tags: Vec::new(),
            pattern_matches: Vec::new(),
        }
    }

    pub fn total_matches(&self) -> usize {
        self.pattern_matches.len()
    }

    /// 去重后的模式个数
    pub fn unique_patterns(&self) -> usize {
        self.pattern_matches
            .iter()
            .map(|m| m.pattern_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// 路径中的文件名部分
    pub fn file_name(&self) -> &str {
        std::path::Path::new(&self.filename)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }
}

/// 根据模式标识前缀推断的模式类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    String,
    Hex,
    Regex,
    Unknown,
}

impl PatternKind {
    pub fn from_pattern_id(id: &str) -> Self {
        if id.contains("$string") {
            PatternKind::String
        } else if id.contains("$hex") {
            PatternKind::Hex
        } else if id.contains("$regex") {
            PatternKind::Regex
        } else {
            PatternKind::Unknown
        }
    }

    /// 表格导出使用的名称（首字母大写）
    pub fn label(self) -> &'static str {
        match self {
            PatternKind::String => "String",
            PatternKind::Hex => "Hex",
            PatternKind::Regex => "Regex",
            PatternKind::Unknown => "Unknown",
        }
    }

    /// 文档导出使用的名称（小写）
    pub fn key(self) -> &'static str {
        match self {
            PatternKind::String => "string",
            PatternKind::Hex => "hex",
            PatternKind::Regex => "regex",
            PatternKind::Unknown => "unknown",
        }
    }
}
