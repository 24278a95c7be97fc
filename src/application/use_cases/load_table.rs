//! # Load Table Use Case
//!
//! 出力先テーブルの全件入れ替えユースケース

use log::{debug, info};

use crate::application::dto::load_summary::LoadSummary;
use crate::domain::entities::extraction::ExtractionResult;
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::services::column_compatibility::ColumnCompatibilityService;
use crate::domain::services::insert_statement::InsertStatement;

/// テーブル入れ替えユースケース
///
/// 1. 抽出列から INSERT 文の形を作る
/// 2. 出力先の列を確認する（ここまでは出力先を変更しない）
/// 3. テーブルを空にする（確定する）
/// 4. 全行を1トランザクションで挿入してコミット
///
/// 3 の後に失敗した場合、テーブルは空のまま残る。
pub struct LoadTableUseCase {
    table: TableRef,
}

impl LoadTableUseCase {
    /// 新しいユースケースを作成
    ///
    /// # Arguments
    ///
    /// * `table` - 出力先テーブル（事前に作成済みであること）
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// 出力先リポジトリの方言で INSERT 文の形を作る
    pub fn build_statement<T>(
        &self,
        target: &T,
        extraction: &ExtractionResult,
    ) -> Result<InsertStatement, EtlError>
    where
        T: TargetRepository + ?Sized,
    {
        InsertStatement::new(target.dialect(), &self.table, extraction.columns())
    }

    /// テーブルを入れ替える
    ///
    /// # Returns
    ///
    /// 挿入行数と実行した文のサマリー
    ///
    /// # Errors
    ///
    /// 列の不整合は `EtlError::SchemaMismatch`（この場合テーブルは変更されない）。
    /// 挿入時のエラーはリポジトリのエラーをそのまま返す
    pub async fn execute<T>(
        &self,
        target: &mut T,
        extraction: &ExtractionResult,
    ) -> Result<LoadSummary, EtlError>
    where
        T: TargetRepository + ?Sized,
    {
        let statement = self.build_statement(target, extraction)?;
        debug!("Insert statement: {}", statement);

        let destination_columns = target.table_columns(&self.table).await?;
        ColumnCompatibilityService::check(
            statement.dialect(),
            &self.table,
            extraction.columns(),
            &destination_columns,
        )?;

        target.clear_table(&self.table).await?;
        info!("Cleared table {}", self.table);

        let inserted_rows = if extraction.is_empty() {
            0
        } else {
            target.insert_all(&statement, extraction.rows()).await?
        };
        info!("Inserted {} rows into {}", inserted_rows, self.table);

        Ok(LoadSummary::new(
            self.table.clone(),
            inserted_rows,
            statement.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::dialect::Dialect;
    use crate::domain::entities::sql_value::{SqlValue, ValueKind};
    use crate::domain::repositories::target_repository::MockTargetRepository;
    use mockall::Sequence;

    fn table() -> TableRef {
        TableRef::new(Some("stg_selfservice".to_string()), "ceadex_alunos")
    }

    fn sample_result() -> ExtractionResult {
        ExtractionResult::new(
            vec!["name".to_string(), "score".to_string()],
            vec![
                vec![SqlValue::from("Ana"), SqlValue::from(7.5)],
                vec![SqlValue::from("José"), SqlValue::from(4.0)],
                vec![SqlValue::from("Lia"), SqlValue::Null(ValueKind::Float)],
            ],
        )
        .unwrap()
    }

    fn destination_columns() -> Vec<String> {
        vec!["name".to_string(), "score".to_string()]
    }

    #[tokio::test]
    async fn test_load_runs_clear_before_insert() {
        let mut target = MockTargetRepository::new();
        let mut seq = Sequence::new();

        target.expect_dialect().return_const(Dialect::Postgres);
        target
            .expect_table_columns()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(destination_columns()));
        target
            .expect_clear_table()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        target
            .expect_insert_all()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|statement, rows| {
                statement.columns() == ["name".to_string(), "score".to_string()]
                    && statement.placeholder_count() == 2
                    && rows.len() == 3
            })
            .returning(|_, rows| Ok(rows.len() as u64));

        let use_case = LoadTableUseCase::new(table());
        let summary = use_case.execute(&mut target, &sample_result()).await.unwrap();

        assert_eq!(summary.inserted_rows, 3);
        assert_eq!(
            summary.statement,
            "INSERT INTO \"stg_selfservice\".\"ceadex_alunos\" (\"name\", \"score\") VALUES ($1, $2)"
        );
    }

    #[tokio::test]
    async fn test_load_zero_rows_clears_without_insert() {
        let mut target = MockTargetRepository::new();
        target.expect_dialect().return_const(Dialect::MySql);
        target
            .expect_table_columns()
            .returning(|_| Ok(destination_columns()));
        target.expect_clear_table().times(1).returning(|_| Ok(()));
        target.expect_insert_all().times(0);

        let use_case = LoadTableUseCase::new(table());
        let extraction = ExtractionResult::empty(destination_columns());
        let summary = use_case.execute(&mut target, &extraction).await.unwrap();

        assert_eq!(summary.inserted_rows, 0);
    }

    #[tokio::test]
    async fn test_load_schema_mismatch_leaves_table_untouched() {
        let mut target = MockTargetRepository::new();
        target.expect_dialect().return_const(Dialect::Postgres);
        target
            .expect_table_columns()
            .returning(|_| Ok(vec!["name".to_string()]));
        target.expect_clear_table().times(0);
        target.expect_insert_all().times(0);

        let use_case = LoadTableUseCase::new(table());
        let err = use_case
            .execute(&mut target, &sample_result())
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::SchemaMismatch(_)));
        assert!(err.to_string().contains("score"));
    }

    #[tokio::test]
    async fn test_load_missing_table_leaves_table_untouched() {
        let mut target = MockTargetRepository::new();
        target.expect_dialect().return_const(Dialect::Postgres);
        target.expect_table_columns().returning(|table| {
            Err(EtlError::SchemaMismatch(format!("table {} does not exist", table)))
        });
        target.expect_clear_table().times(0);

        let use_case = LoadTableUseCase::new(table());
        let err = use_case
            .execute(&mut target, &sample_result())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("stg_selfservice.ceadex_alunos"));
    }

    #[tokio::test]
    async fn test_load_insert_failure_after_clear_is_returned() {
        let mut target = MockTargetRepository::new();
        target.expect_dialect().return_const(Dialect::Sqlite);
        target
            .expect_table_columns()
            .returning(|_| Ok(destination_columns()));
        target.expect_clear_table().times(1).returning(|_| Ok(()));
        target.expect_insert_all().times(1).returning(|_, _| {
            Err(EtlError::Integrity("NOT NULL constraint failed: alunos.score".to_string()))
        });

        let use_case = LoadTableUseCase::new(table());
        let err = use_case
            .execute(&mut target, &sample_result())
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::Integrity(_)));
    }

    #[test]
    fn test_build_statement_uses_target_dialect() {
        let mut target = MockTargetRepository::new();
        target.expect_dialect().return_const(Dialect::MySql);

        let use_case = LoadTableUseCase::new(table());
        let statement = use_case.build_statement(&target, &sample_result()).unwrap();

        assert_eq!(
            statement.to_string(),
            "INSERT INTO `stg_selfservice`.`ceadex_alunos` (`name`, `score`) VALUES (?, ?)"
        );
    }
}
