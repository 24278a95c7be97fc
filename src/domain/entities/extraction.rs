//! # ExtractionResult Value Object
//!
//! 抽出クエリの結果（列名と全行）

use crate::domain::errors::EtlError;

use super::sql_value::SqlValue;

/// 1行分の値（列順）
pub type Row = Vec<SqlValue>;

/// 抽出結果
///
/// 列名はクエリ実行時のメタデータから得たもので、ハードコードしない。
/// 各行の値の数は常に列数と一致する。
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ExtractionResult {
    /// 新しい抽出結果を作成
    ///
    /// # Errors
    ///
    /// 列数と一致しない行がある場合に `EtlError::Query` を返す
    ///
    /// # 例
    ///
    /// ```
    /// use ceadex_etl::domain::entities::extraction::ExtractionResult;
    /// use ceadex_etl::domain::entities::sql_value::{SqlValue, ValueKind};
    ///
    /// let result = ExtractionResult::new(
    ///     vec!["name".to_string(), "score".to_string()],
    ///     vec![
    ///         vec![SqlValue::from("Ana"), SqlValue::from(7.5)],
    ///         vec![SqlValue::from("Lia"), SqlValue::Null(ValueKind::Float)],
    ///     ],
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(result.len(), 2);
    /// assert_eq!(result.columns()[1], "score");
    /// ```
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, EtlError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EtlError::Query(format!(
                "row {} has {} values but the query returned {} columns",
                index + 1,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// 行を持たない結果
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
