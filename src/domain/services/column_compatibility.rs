//! # Column Compatibility Service
//!
//! 抽出列と出力先テーブル列の突き合わせ

use crate::domain::entities::dialect::Dialect;
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;

/// 列の互換性チェック
///
/// 出力先を空にする前に呼び、破壊的な操作の前に不整合を検出する。
pub struct ColumnCompatibilityService;

impl ColumnCompatibilityService {
    /// 抽出した全ての列が出力先テーブルに存在するか確認する
    ///
    /// 出力先にだけ存在する列は許容する（NULL かデフォルト値になる）。
    /// 型の互換性は出力先データベースが挿入時に判定する。
    ///
    /// # Errors
    ///
    /// 出力先に無い列がある場合に `EtlError::SchemaMismatch`
    pub fn check(
        dialect: Dialect,
        table: &TableRef,
        extracted: &[String],
        destination: &[String],
    ) -> Result<(), EtlError> {
        let missing: Vec<&str> = extracted
            .iter()
            .filter(|column| !Self::contains(dialect, destination, column))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(EtlError::SchemaMismatch(format!(
            "table {} has {} columns and lacks {}: {}",
            table,
            destination.len(),
            if missing.len() == 1 { "column" } else { "columns" },
            missing.join(", ")
        )))
    }

    fn contains(dialect: Dialect, destination: &[String], column: &str) -> bool {
        if dialect.case_insensitive_idents() {
            destination.iter().any(|d| d.eq_ignore_ascii_case(column))
        } else {
            destination.iter().any(|d| d == column)
        }
    }
}
