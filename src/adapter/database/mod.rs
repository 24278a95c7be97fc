//! # Database Adapters
//!
//! sqlx による抽出元・出力先リポジトリの実装
//!
//! - **postgres** / **mysql** / **sqlite**: 接続1本を保持する実装
//! - **factory**: 設定の種類に応じて接続を開く
//! - **errors**: ドライバエラーの分類

pub mod errors;
pub mod factory;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::domain::entities::extraction::Row;
use crate::domain::entities::sql_value::{SqlValue, ValueKind};
use crate::domain::errors::EtlError;
use crate::domain::services::insert_statement::InsertStatement;

/// 抽出クエリの列（プリペア時のメタデータ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractedColumn {
    pub name: String,
    pub type_name: String,
    pub kind: ValueKind,
}

impl ExtractedColumn {
    /// 型名を値の種類に対応付けて作成（未対応の型は `EtlError::Query`）
    pub fn new(
        name: &str,
        type_name: &str,
        kind_of: impl Fn(&str) -> Option<ValueKind>,
    ) -> Result<Self, EtlError> {
        let kind = kind_of(type_name).ok_or_else(|| {
            EtlError::Query(format!(
                "column '{}' has unsupported type {}",
                name, type_name
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind,
        })
    }

    pub fn names(columns: &[ExtractedColumn]) -> Vec<String> {
        columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// 全行の値の数が INSERT 文の列数と一致するか確認する
pub(crate) fn check_row_widths(statement: &InsertStatement, rows: &[Row]) -> Result<(), EtlError> {
    let expected = statement.placeholder_count();
    match rows.iter().position(|row| row.len() != expected) {
        Some(index) => Err(EtlError::SchemaMismatch(format!(
            "row {} has {} values but {} expects {}",
            index + 1,
            rows[index].len(),
            statement.table(),
            expected
        ))),
        None => Ok(()),
    }
}

/// 型の分からない列の NULL に、同じ列で最初に現れた非 NULL 値の種類を与える
///
/// 全行 NULL の列はそのまま残す。
pub(crate) fn settle_null_kinds(rows: &mut [Row], index: usize) {
    let Some(kind) = rows
        .iter()
        .filter_map(|row| row.get(index))
        .find(|value| !value.is_null())
        .map(SqlValue::kind)
    else {
        return;
    };

    for value in rows.iter_mut().filter_map(|row| row.get_mut(index)) {
        if let SqlValue::Null(null_kind) = value {
            *null_kind = kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::dialect::Dialect;
    use crate::domain::entities::table_ref::TableRef;

    fn statement() -> InsertStatement {
        let columns = vec!["name".to_string(), "score".to_string()];
        InsertStatement::new(Dialect::Sqlite, &TableRef::new(None, "alunos"), &columns).unwrap()
    }

    #[test]
    fn test_extracted_column_supported() {
        let column = ExtractedColumn::new("score", "FLOAT8", |_| Some(ValueKind::Float)).unwrap();
        assert_eq!(column.name, "score");
        assert_eq!(column.kind, ValueKind::Float);
    }

    #[test]
    fn test_extracted_column_unsupported() {
        let err = ExtractedColumn::new("payload", "JSONB", |_| None).unwrap_err();
        assert!(matches!(err, EtlError::Query(_)));
        assert!(err.to_string().contains("payload"));
    }

    #[test]
    fn test_check_row_widths() {
        let rows = vec![
            vec![SqlValue::from("Ana"), SqlValue::Float(7.5)],
            vec![SqlValue::from("Lia"), SqlValue::Null(ValueKind::Float)],
        ];
        assert!(check_row_widths(&statement(), &rows).is_ok());

        let rows = vec![vec![SqlValue::from("Ana")]];
        let err = check_row_widths(&statement(), &rows).unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_check_row_widths_reports_row_number() {
        let rows = vec![
            vec![SqlValue::from("Ana"), SqlValue::Float(7.5)],
            vec![SqlValue::from("Lia")],
        ];
        let err = check_row_widths(&statement(), &rows).unwrap_err();
        assert!(err.to_string().contains("row 2 has 1 values"));
    }

    #[test]
    fn test_settle_null_kinds_from_first_value() {
        let mut rows = vec![
            vec![SqlValue::from("José"), SqlValue::Null(ValueKind::Text)],
            vec![SqlValue::from("Ana"), SqlValue::Float(7.5)],
            vec![SqlValue::from("Lia"), SqlValue::Null(ValueKind::Text)],
        ];

        settle_null_kinds(&mut rows, 1);

        assert_eq!(rows[0][1], SqlValue::Null(ValueKind::Float));
        assert_eq!(rows[1][1], SqlValue::Float(7.5));
        assert_eq!(rows[2][1], SqlValue::Null(ValueKind::Float));
        assert_eq!(rows[0][0], SqlValue::from("José"));
    }

    #[test]
    fn test_settle_null_kinds_all_null_column() {
        let mut rows = vec![vec![SqlValue::Null(ValueKind::Text)]];

        settle_null_kinds(&mut rows, 0);

        assert_eq!(rows[0][0], SqlValue::Null(ValueKind::Text));
    }
}
