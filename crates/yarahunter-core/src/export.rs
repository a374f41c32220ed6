//! 导出：表格（CSV）、结构化文档（JSON）、事件响应报告（文本）
//!
//! 只消费 `&[ScanResult]` 与会话元数据，不接触结果存储。
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::str::FromStr;

use crate::types::{PatternKind, ScanResult};

const TOOL_NAME: &str = "yarahunter";

/// 报告末尾的固定处置建议
pub const RECOMMENDATIONS: [&str; 6] = [
    "Quarantine or isolate all flagged files immediately",
    "Perform deeper malware analysis on suspicious files",
    "Check network logs for communications from affected systems",
    "Scan other systems for similar indicators",
    "Review file origins and distribution vectors",
    "Update detection rules based on findings",
];

/// 导出附带的会话元数据
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMeta {
    pub timestamp: DateTime<Utc>,
    pub files_scanned: usize,
    pub files_matched: usize,
    pub total_matches: usize,
    /// 规则文件路径或 "Inline Rules"
    pub rules_source: String,
    /// 扫描根目录或 "Unknown"
    pub scan_root: String,
}

impl ExportMeta {
    fn timestamp_utc(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Report,
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "report" | "txt" | "text" => Ok(ExportFormat::Report),
            other => bail!("unknown export format: {other}"),
        }
    }
}

pub fn export(format: ExportFormat, results: &[ScanResult], meta: &ExportMeta, out: &mut dyn Write) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(results, meta, out),
        ExportFormat::Json => write_json(results, meta, out),
        ExportFormat::Report => write_report(results, meta, out),
    }
}

fn file_size(path: &str) -> Option<u64> {
    std::fs::metadata(path).ok().map(|md| md.len())
}

/// 含逗号、引号、换行或回车的字段用双引号包裹，内部引号加倍
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 每个（文件, 规则, 命中）一行
pub fn write_csv(results: &[ScanResult], meta: &ExportMeta, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "Timestamp,File_Path,File_Name,File_Size_Bytes,Rule_Name,Rule_Namespace,\
         Pattern_ID,Pattern_Type,Offset_Hex,Offset_Decimal,Match_Length,Data_Preview,Hex_Dump"
    )?;
    let timestamp = meta.timestamp_utc();
    for r in results {
        let size = file_size(&r.filename).map(|s| s.to_string()).unwrap_or_else(|| "Unknown".to_string());
        for m in &r.pattern_matches {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},0x{:x},{},{},{},{}",
                timestamp,
                escape_csv(&r.filename),
                escape_csv(r.file_name()),
                size,
                escape_csv(&r.rule_name),
                escape_csv(&r.rule_namespace),
                escape_csv(&m.pattern_id),
                PatternKind::from_pattern_id(&m.pattern_id).label(),
                m.offset,
                m.offset,
                m.length,
                escape_csv(&m.data_preview),
                escape_csv(&m.hex_dump),
            )?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    scan_metadata: JsonMeta<'a>,
    results: Vec<JsonResult<'a>>,
}

#[derive(Serialize)]
struct JsonMeta<'a> {
    timestamp: String,
    tool: &'a str,
    total_files_scanned: usize,
    total_files_matched: usize,
    total_pattern_matches: usize,
    yara_rules_file: &'a str,
    scan_directory: &'a str,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    file_path: &'a str,
    file_name: &'a str,
    file_size_bytes: Option<u64>,
    rule_name: &'a str,
    rule_namespace: &'a str,
    tags: &'a [String],
    pattern_matches: Vec<JsonPattern<'a>>,
}

#[derive(Serialize)]
struct JsonPattern<'a> {
    pattern_id: &'a str,
    pattern_type: &'static str,
    offset_decimal: u64,
    offset_hex: String,
    length: u64,
    data_preview: &'a str,
    hex_dump: &'a str,
}

/// 文件 → 规则 → 命中 的嵌套文档，附会话元数据
pub fn write_json(results: &[ScanResult], meta: &ExportMeta, out: &mut dyn Write) -> Result<()> {
    let doc = JsonDocument {
        scan_metadata: JsonMeta {
            timestamp: meta.timestamp_utc(),
            tool: TOOL_NAME,
            total_files_scanned: meta.files_scanned,
            total_files_matched: meta.files_matched,
            total_pattern_matches: meta.total_matches,
            yara_rules_file: &meta.rules_source,
            scan_directory: &meta.scan_root,
        },
        results: results
            .iter()
            .map(|r| JsonResult {
                file_path: &r.filename,
                file_name: r.file_name(),
                file_size_bytes: file_size(&r.filename),
                rule_name: &r.rule_name,
                rule_namespace: &r.rule_namespace,
                tags: &r.tags,
                pattern_matches: r
                    .pattern_matches
                    .iter()
                    .map(|m| JsonPattern {
                        pattern_id: &m.pattern_id,
                        pattern_type: PatternKind::from_pattern_id(&m.pattern_id).key(),
                        offset_decimal: m.offset,
                        offset_hex: format!("0x{:x}", m.offset),
                        length: m.length,
                        data_preview: &m.data_preview,
                        hex_dump: &m.hex_dump,
                    })
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}

fn human_size(size: u64) -> String {
    if size > 1024 * 1024 {
        format!("{size} bytes ({} MB)", size / (1024 * 1024))
    } else if size > 1024 {
        format!("{size} bytes ({} KB)", size / 1024)
    } else {
        format!("{size} bytes")
    }
}

/// 按文件分组的文本报告，末尾附固定处置建议
pub fn write_report(results: &[ScanResult], meta: &ExportMeta, out: &mut dyn Write) -> Result<()> {
    let heavy = "=".repeat(80);
    let light = "-".repeat(40);

    writeln!(out, "{heavy}")?;
    writeln!(out, "YARA SCAN INCIDENT RESPONSE REPORT")?;
    writeln!(out, "{heavy}\n")?;

    writeln!(out, "SCAN METADATA:")?;
    writeln!(out, "{light}")?;
    writeln!(out, "Scan Date/Time:      {}", meta.timestamp_utc())?;
    writeln!(out, "Tool:                {TOOL_NAME}")?;
    writeln!(out, "YARA Rules File:     {}", meta.rules_source)?;
    writeln!(out, "Scan Directory:      {}", meta.scan_root)?;
    writeln!(out, "Total Files Scanned: {}", meta.files_scanned)?;
    writeln!(out, "Files with Matches:  {}", meta.files_matched)?;
    writeln!(out, "Total Pattern Hits:  {}\n", meta.total_matches)?;

    let mut by_file: BTreeMap<&str, Vec<&ScanResult>> = BTreeMap::new();
    let mut rules: BTreeSet<&str> = BTreeSet::new();
    for r in results {
        by_file.entry(r.filename.as_str()).or_default().push(r);
        rules.insert(r.rule_name.as_str());
    }
    let hits: usize = results.iter().map(ScanResult::total_matches).sum();

    writeln!(out, "EXECUTIVE SUMMARY:")?;
    writeln!(out, "{light}")?;
    writeln!(out, "• {} unique files triggered YARA rules", by_file.len())?;
    writeln!(out, "• {} different YARA rules were triggered", rules.len())?;
    writeln!(out, "• {hits} total pattern matches detected\n")?;

    writeln!(out, "DETAILED FINDINGS:")?;
    writeln!(out, "{heavy}\n")?;

    for (n, (path, file_results)) in by_file.iter().enumerate() {
        writeln!(out, "FINDING #{}", n + 1)?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "File: {}", file_results[0].file_name())?;
        writeln!(out, "Full Path: {path}")?;
        if let Some(size) = file_size(path) {
            writeln!(out, "File Size: {}", human_size(size))?;
        }
        let rules_hit: BTreeSet<&str> = file_results.iter().map(|r| r.rule_name.as_str()).collect();
        let patterns: usize = file_results.iter().map(|r| r.total_matches()).sum();
        writeln!(out, "Rules Triggered: {} ({patterns} pattern matches)\n", rules_hit.len())?;

        for r in file_results {
            writeln!(out, "  RULE: {}", r.rule_name)?;
            if !r.rule_namespace.is_empty() {
                writeln!(out, "  Namespace: {}", r.rule_namespace)?;
            }
            if !r.tags.is_empty() {
                writeln!(out, "  Tags: {}", r.tags.join(", "))?;
            }
            if r.pattern_matches.is_empty() {
                writeln!(out, "  Condition-only match (no pattern occurrences)")?;
            } else {
                writeln!(out, "  Pattern Matches:")?;
            }
            for m in &r.pattern_matches {
                writeln!(out, "    • {} at offset 0x{:x} (length: {} bytes)", m.pattern_id, m.offset, m.length)?;
                writeln!(out, "      Data: {}", m.data_preview)?;
                if !m.hex_dump.is_empty() {
                    let shown = m.hex_dump.get(..60).unwrap_or(&m.hex_dump);
                    let more = if m.hex_dump.len() > 60 { "..." } else { "" };
                    writeln!(out, "      Hex:  {shown}{more}")?;
                }
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "RECOMMENDATIONS:")?;
    writeln!(out, "{heavy}")?;
    for (i, rec) in RECOMMENDATIONS.iter().enumerate() {
        writeln!(out, "{}. {rec}", i + 1)?;
    }
    writeln!(out)?;
    writeln!(out, "END OF REPORT")?;
    writeln!(out, "{heavy}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternMatch;
    use chrono::TimeZone;

    fn meta() -> ExportMeta {
        ExportMeta {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            files_scanned: 4,
            files_matched: 1,
            total_matches: 2,
            rules_source: "Inline Rules".into(),
            scan_root: "/evidence".into(),
        }
    }

    fn results() -> Vec<ScanResult> {
        let mut r = ScanResult::new("/evidence/a,b.exe", "mz_header", "default");
        r.tags = vec!["pe".into()];
        r.pattern_matches.push(PatternMatch {
            pattern_id: "$string_mz".into(),
            offset: 0,
            length: 2,
            data: b"MZ".to_vec(),
            data_preview: "MZ".into(),
            hex_dump: "4D 5A".into(),
        });
        r.pattern_matches.push(PatternMatch {
            pattern_id: "$hex_stub".into(),
            offset: 0x40,
            length: 3,
            data: b"a\"b".to_vec(),
            data_preview: "a\"b".into(),
            hex_dump: "61 22 62".into(),
        });
        vec![r]
    }

    fn render(format: ExportFormat) -> String {
        let mut buf = Vec::new();
        export(format, &results(), &meta(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn format_names() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("report".parse::<ExportFormat>().unwrap(), ExportFormat::Report);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn csv_escapes_and_emits_one_row_per_occurrence() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("evil\r.exe"), "\"evil\r.exe\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");

        let csv = render(ExportFormat::Csv);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Timestamp,File_Path,File_Name"));
        assert!(lines[1].starts_with("2026-03-01 12:30:00 UTC,\"/evidence/a,b.exe\",\"a,b.exe\",Unknown,mz_header,default,$string_mz,String,0x0,0,2,MZ,4D 5A"));
        assert!(lines[2].contains(",$hex_stub,Hex,0x40,64,3,\"a\"\"b\",61 22 62"));
    }

    #[test]
    fn json_nests_file_rule_pattern() {
        let doc: serde_json::Value = serde_json::from_str(&render(ExportFormat::Json)).unwrap();
        assert_eq!(doc["scan_metadata"]["tool"], "yarahunter");
        assert_eq!(doc["scan_metadata"]["total_files_scanned"], 4);
        assert_eq!(doc["scan_metadata"]["yara_rules_file"], "Inline Rules");
        assert_eq!(doc["scan_metadata"]["scan_directory"], "/evidence");

        let first = &doc["results"][0];
        assert_eq!(first["file_name"], "a,b.exe");
        assert!(first["file_size_bytes"].is_null());
        assert_eq!(first["tags"][0], "pe");
        assert_eq!(first["pattern_matches"][1]["pattern_type"], "hex");
        assert_eq!(first["pattern_matches"][1]["offset_hex"], "0x40");
        assert_eq!(first["pattern_matches"][1]["offset_decimal"], 64);
    }

    #[test]
    fn report_groups_by_file_and_ends_with_checklist() {
        let report = render(ExportFormat::Report);
        assert!(report.contains("YARA SCAN INCIDENT RESPONSE REPORT"));
        assert!(report.contains("• 1 unique files triggered YARA rules"));
        assert!(report.contains("FINDING #1"));
        assert!(report.contains("Rules Triggered: 1 (2 pattern matches)"));
        assert!(report.contains("    • $hex_stub at offset 0x40 (length: 3 bytes)"));
        assert!(report.contains("6. Update detection rules based on findings"));
        assert!(report.trim_end().ends_with(&"=".repeat(80)));
    }

    #[test]
    fn report_truncates_long_hex() {
        let mut rs = results();
        rs[0].pattern_matches[0].hex_dump = "41 ".repeat(40);
        let mut buf = Vec::new();
        write_report(&rs, &meta(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let line = text.lines().find(|l| l.trim_start().starts_with("Hex:  41")).unwrap();
        assert!(line.ends_with("..."));
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(10), "10 bytes");
        assert_eq!(human_size(4096), "4096 bytes (4 KB)");
        assert_eq!(human_size(3 * 1024 * 1024), "3145728 bytes (3 MB)");
    }
}
