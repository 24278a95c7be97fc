//! # Load Summary DTO
//!
//! テーブル入れ替え結果のData Transfer Object

use crate::domain::entities::table_ref::TableRef;

/// ロード結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// 出力先テーブル
    pub table: TableRef,
    /// 挿入してコミットした行数
    pub inserted_rows: u64,
    /// 実行した INSERT 文（1行分の形）
    pub statement: String,
}

impl LoadSummary {
    pub fn new(table: TableRef, inserted_rows: u64, statement: String) -> Self {
        Self {
            table,
            inserted_rows,
            statement,
        }
    }
}
