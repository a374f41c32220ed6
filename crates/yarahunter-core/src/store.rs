//! 结果存储：一把短持有的互斥锁保护结果列表与计数器
//!
//! 写操作仅对本 crate 可见（由扫描会话独占）；读操作在锁内复制、锁外计算，
//! 调用方拿到的永远是副本。
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::options::ScanCounts;
use crate::types::ScanResult;

#[derive(Debug, Default)]
struct StoreState {
    results: Vec<ScanResult>,
    /// 扫描成功但没有任何规则命中的文件
    clean: Vec<String>,
    counts: ScanCounts,
}

#[derive(Debug, Default)]
pub struct ResultStore {
    state: Mutex<StoreState>,
}

impl ResultStore {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 清空结果并重置计数器（会话开始时）
    pub(crate) fn reset(&self) {
        let mut state = self.lock();
        state.results.clear();
        state.clean.clear();
        state.counts = ScanCounts::default();
    }

    pub(crate) fn append(&self, result: ScanResult) {
        self.lock().results.push(result);
    }

    /// 返回递增后的已扫描文件数
    pub(crate) fn record_scanned(&self) -> usize {
        let mut state = self.lock();
        state.counts.files_scanned += 1;
        state.counts.files_scanned
    }

    pub(crate) fn record_matched(&self) {
        self.lock().counts.files_matched += 1;
    }

    pub(crate) fn record_failed(&self) {
        self.lock().counts.files_failed += 1;
    }

    pub(crate) fn record_clean(&self, filename: String) {
        let mut state = self.lock();
        state.clean.push(filename);
        state.counts.files_clean += 1;
    }

    /// 当前结果的浅拷贝
    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.lock().results.clone()
    }

    pub fn counts(&self) -> ScanCounts {
        self.lock().counts
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有结果的模式命中总数
    pub fn total_match_count(&self) -> usize {
        self.snapshot().iter().map(ScanResult::total_matches).sum()
    }

    /// 出现过命中的不同文件数
    pub fn unique_file_count(&self) -> usize {
        let snapshot = self.snapshot();
        snapshot.iter().map(|r| r.filename.as_str()).collect::<HashSet<_>>().len()
    }

    /// 按文件名精确过滤
    pub fn results_for_file(&self, filename: &str) -> Vec<ScanResult> {
        let mut snapshot = self.snapshot();
        snapshot.retain(|r| r.filename == filename);
        snapshot
    }

    /// 命中同一规则的全部结果（“相似文件”视图）
    pub fn results_for_rule(&self, rule_name: &str) -> Vec<ScanResult> {
        let mut snapshot = self.snapshot();
        snapshot.retain(|r| r.rule_name == rule_name);
        snapshot
    }

    /// 所属规则带有 `tag` 的全部结果（“相似标签”视图）
    pub fn results_for_tag(&self, tag: &str) -> Vec<ScanResult> {
        let tag = tag.trim();
        let mut snapshot = self.snapshot();
        snapshot.retain(|r| r.tags.iter().any(|t| t.trim() == tag));
        snapshot
    }

    /// 结果中出现过的标签，去重并排序
    pub fn tags(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let tags: BTreeSet<&str> = snapshot
            .iter()
            .flat_map(|r| r.tags.iter().map(|t| t.trim()))
            .filter(|t| !t.is_empty())
            .collect();
        tags.into_iter().map(str::to_string).collect()
    }

    /// 未命中文件列表（按扫描顺序）
    pub fn clean_files(&self) -> Vec<String> {
        self.lock().clean.clone()
    }
}
