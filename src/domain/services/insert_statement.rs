//! # Insert Statement
//!
//! 抽出した列から出力先への INSERT 文を組み立てる

use std::collections::HashSet;
use std::fmt;

use crate::domain::entities::dialect::Dialect;
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;

/// 一括挿入用の INSERT 文
///
/// 列リストは抽出結果の列名そのもの（同じ順序）で、
/// 1行あたりのプレースホルダ数は常に列数と等しい。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    dialect: Dialect,
    table: String,
    columns: Vec<String>,
}

impl InsertStatement {
    /// INSERT 文の形を作成
    ///
    /// # Errors
    ///
    /// 列が無い場合、または列名が重複している場合に `EtlError::SchemaMismatch`
    ///
    /// # 例
    ///
    /// ```
    /// use ceadex_etl::domain::entities::dialect::Dialect;
    /// use ceadex_etl::domain::entities::table_ref::TableRef;
    /// use ceadex_etl::domain::services::insert_statement::InsertStatement;
    ///
    /// let table = TableRef::new(None, "alunos");
    /// let columns = vec!["name".to_string(), "score".to_string()];
    /// let stmt = InsertStatement::new(Dialect::Postgres, &table, &columns).unwrap();
    ///
    /// assert_eq!(
    ///     stmt.sql(2),
    ///     "INSERT INTO \"alunos\" (\"name\", \"score\") VALUES ($1, $2), ($3, $4)"
    /// );
    /// ```
    pub fn new(dialect: Dialect, table: &TableRef, columns: &[String]) -> Result<Self, EtlError> {
        if columns.is_empty() {
            return Err(EtlError::SchemaMismatch(format!(
                "extraction produced no columns to insert into {}",
                table
            )));
        }

        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.as_str()) {
                return Err(EtlError::SchemaMismatch(format!(
                    "column '{}' appears more than once in the extraction result",
                    column
                )));
            }
        }

        Ok(Self {
            dialect,
            table: table.qualified(dialect),
            columns: columns.to_vec(),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// クオート済みの完全修飾テーブル名
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 1行あたりのプレースホルダ数
    #[inline]
    pub fn placeholder_count(&self) -> usize {
        self.columns.len()
    }

    /// クオート済みの列リスト
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| self.dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// バインドパラメータ上限に収まる1文あたりの最大行数
    pub fn rows_per_statement(&self) -> usize {
        (self.dialect.max_bind_params() / self.placeholder_count()).max(1)
    }

    /// `row_count` 行分の VALUES を持つ INSERT 文
    ///
    /// プレースホルダは行をまたいで通し番号になる（PostgreSQL の `$n`）。
    pub fn sql(&self, row_count: usize) -> String {
        let width = self.placeholder_count();
        let values = (0..row_count.max(1))
            .map(|row| {
                let placeholders = (1..=width)
                    .map(|col| self.dialect.placeholder(row * width + col))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", placeholders)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.column_list(),
            values
        )
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql(1))
    }
}
