//! 命中收集：把引擎上报的规则命中展开为 `ScanResult`
//!
//! 证据字节不取自扫描缓冲区，而是按 (offset, length) 重新打开文件回读；
//! 回读失败只影响该次命中（预览字段置为错误标记），不影响规则和会话。
use std::path::Path;
use tracing::debug;

use crate::engine::{Occurrence, RuleHit};
use crate::source::read_range;
use crate::types::{PatternMatch, ScanResult};

/// 预览/十六进制最多展示的字节数
pub const PREVIEW_LIMIT: usize = 255;
/// 超出预览长度时追加的截断标记
pub const ELLIPSIS: &str = "...";
/// 证据回读失败时两个预览字段的固定内容
pub const READ_ERROR_MARKER: &str = "[Read Error]";

/// 绑定“当前正在扫描的文件”，引擎本身不知道文件路径
pub(crate) struct MatchCollector<'a> {
    path: &'a Path,
    filename: String,
}

impl<'a> MatchCollector<'a> {
    pub(crate) fn new(path: &'a Path) -> Self {
        Self { path, filename: path.display().to_string() }
    }

    pub(crate) fn filename(&self) -> &str {
        &self.filename
    }

    /// 规则 → 模式 → 命中位置，按引擎顺序逐个回读证据
    pub(crate) fn collect(&self, hit: RuleHit) -> ScanResult {
        let mut result = ScanResult::new(self.filename.clone(), hit.identifier, hit.namespace);
        result.tags = hit.tags;
        for pattern in &hit.patterns {
            for occ in &pattern.occurrences {
                result.pattern_matches.push(self.evidence(&pattern.identifier, *occ));
            }
        }
        result
    }

    fn evidence(&self, pattern_id: &str, occ: Occurrence) -> PatternMatch {
        let read = usize::try_from(occ.length)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "match length overflows usize"))
            .and_then(|len| read_range(self.path, occ.offset, len));
        match read {
            Ok(data) => {
                let (data_preview, hex_dump) = render_evidence(&data);
                PatternMatch { pattern_id: pattern_id.to_string(), offset: occ.offset, length: occ.length, data, data_preview, hex_dump }
            }
            Err(err) => {
                debug!(path = %self.path.display(), pattern_id, offset = occ.offset, error = %err, "evidence read failed");
                PatternMatch {
                    pattern_id: pattern_id.to_string(),
                    offset: occ.offset,
                    length: occ.length,
                    data: Vec::new(),
                    data_preview: READ_ERROR_MARKER.to_string(),
                    hex_dump: READ_ERROR_MARKER.to_string(),
                }
            }
        }
    }
}

/// 生成 (可打印预览, 十六进制) 两种展示；只取前 `PREVIEW_LIMIT` 字节，超出则追加截断标记
pub fn render_evidence(data: &[u8]) -> (String, String) {
    let window = &data[..data.len().min(PREVIEW_LIMIT)];
    let mut preview: String = window
        .iter()
        .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
        .collect();
    let mut hex = window.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
    if data.len() > PREVIEW_LIMIT {
        preview.push_str(ELLIPSIS);
        hex.push(' ');
        hex.push_str(ELLIPSIS);
    }
    (preview, hex)
}
