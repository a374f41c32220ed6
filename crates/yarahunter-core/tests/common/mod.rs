//! 测试用脚本化引擎：按文件内容决定行为，便于构造阻塞、超时、删除等场景
#![allow(dead_code)]

use std::path::PathBuf;

use crossbeam_channel::{unbounded, Receiver, Sender};
use yarahunter_core::{
    CompileError, EngineError, MatchEngine, Occurrence, PatternHit, RuleHit, RuleScanner, ScanFailure, ScanOptions,
};

/// 文件内容 → 行为
/// - `HIT...`：上报一条命中（offset 0, length 3）
/// - `HIT_THEN_BLOCK`：上报命中后通知 `entered` 并等待 `gate`
/// - `BLOCK`：通知 `entered` 并等待 `gate`
/// - `TIMEOUT` / `SYNTAX`：返回对应失败
/// - `DOOMED`：先删除 `doomed` 指向的文件，再上报命中（offset 0, length 6）
///
/// 规则文本含 `INVALID` 时编译失败，含 `NO_SCANNER` 时创建扫描器失败。
pub struct ScriptedEngine {
    gate: Receiver<()>,
    entered: Sender<()>,
    doomed: Option<PathBuf>,
}

/// 测试侧的控制端
pub struct Script {
    pub gate: Sender<()>,
    pub entered: Receiver<()>,
}

impl ScriptedEngine {
    pub fn new(doomed: Option<PathBuf>) -> (Self, Script) {
        let (gate_tx, gate_rx) = unbounded();
        let (entered_tx, entered_rx) = unbounded();
        (Self { gate: gate_rx, entered: entered_tx, doomed }, Script { gate: gate_tx, entered: entered_rx })
    }
}

impl MatchEngine for ScriptedEngine {
    type Rules = String;

    fn compile(&self, source: &str) -> Result<String, CompileError> {
        if source.contains("INVALID") {
            return Err(CompileError { message: "error[E001]: syntax error".to_string() });
        }
        Ok(source.to_string())
    }

    fn create_scanner<'r>(&self, rules: &'r String, _options: &ScanOptions) -> Result<Box<dyn RuleScanner + 'r>, EngineError> {
        if rules.contains("NO_SCANNER") {
            return Err(EngineError { message: "scanner limit reached".to_string() });
        }
        Ok(Box::new(ScriptedScanner { gate: self.gate.clone(), entered: self.entered.clone(), doomed: self.doomed.clone() }))
    }
}

struct ScriptedScanner {
    gate: Receiver<()>,
    entered: Sender<()>,
    doomed: Option<PathBuf>,
}

fn hit(length: u64) -> RuleHit {
    RuleHit {
        identifier: "scripted_rule".to_string(),
        namespace: "default".to_string(),
        tags: vec![],
        patterns: vec![PatternHit {
            identifier: "$string_hit".to_string(),
            occurrences: vec![Occurrence { offset: 0, length }],
        }],
    }
}

impl RuleScanner for ScriptedScanner {
    fn scan(&mut self, data: &[u8], on_rule: &mut dyn FnMut(RuleHit)) -> Result<(), ScanFailure> {
        match data {
            b"HIT_THEN_BLOCK" => {
                on_rule(hit(3));
                let _ = self.entered.send(());
                let _ = self.gate.recv();
            }
            b"BLOCK" => {
                let _ = self.entered.send(());
                let _ = self.gate.recv();
            }
            b"TIMEOUT" => return Err(ScanFailure::Timeout),
            b"SYNTAX" => return Err(ScanFailure::Syntax("unknown module".to_string())),
            b"DOOMED" => {
                if let Some(path) = &self.doomed {
                    std::fs::remove_file(path).expect("Failed to delete doomed file");
                }
                on_rule(hit(6));
            }
            d if d.starts_with(b"HIT") => on_rule(hit(3)),
            _ => {}
        }
        Ok(())
    }
}
