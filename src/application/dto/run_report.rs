//! # Run Report DTO
//!
//! 1回の実行結果

use super::load_summary::LoadSummary;

/// 実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// 実行ごとの UUID
    pub run_id: String,
    /// 抽出した行数
    pub extracted_rows: usize,
    /// ロード結果（dry-run では `None`）
    pub load: Option<LoadSummary>,
}

impl RunReport {
    pub fn new(run_id: String, extracted_rows: usize, load: Option<LoadSummary>) -> Self {
        Self {
            run_id,
            extracted_rows,
            load,
        }
    }

    /// 出力先に書き込んだ行数
    pub fn inserted_rows(&self) -> u64 {
        self.load.as_ref().map(|l| l.inserted_rows).unwrap_or(0)
    }

    pub fn is_dry_run(&self) -> bool {
        self.load.is_none()
    }
}
