//! # Connection Factory
//!
//! 設定の種類に応じて抽出元・出力先の接続を開く

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::mysql::MySqlDatabase;
use super::postgres::PostgresDatabase;
use super::sqlite::SqliteDatabase;
use crate::adapter::config::DatabaseSettings;
use crate::domain::entities::dialect::Dialect;
use crate::domain::errors::EtlError;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::target_repository::TargetRepository;

/// 接続を開くファクトリ
///
/// テストではモックに差し替えて、接続の開閉順序を検証する
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// 抽出元への接続を開く
    async fn open_source(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Box<dyn SourceRepository>, EtlError>;

    /// 出力先への接続を開く
    async fn open_target(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Box<dyn TargetRepository>, EtlError>;
}

/// sqlx による実装
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlxConnectionFactory;

#[async_trait]
impl ConnectionFactory for SqlxConnectionFactory {
    async fn open_source(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Box<dyn SourceRepository>, EtlError> {
        let source: Box<dyn SourceRepository> = match settings.kind {
            Dialect::Postgres => Box::new(PostgresDatabase::connect(settings).await?),
            Dialect::MySql => Box::new(MySqlDatabase::connect(settings).await?),
            Dialect::Sqlite => Box::new(SqliteDatabase::connect(settings).await?),
        };
        Ok(source)
    }

    async fn open_target(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Box<dyn TargetRepository>, EtlError> {
        let target: Box<dyn TargetRepository> = match settings.kind {
            Dialect::Postgres => Box::new(PostgresDatabase::connect(settings).await?),
            Dialect::MySql => Box::new(MySqlDatabase::connect(settings).await?),
            Dialect::Sqlite => Box::new(SqliteDatabase::connect(settings).await?),
        };
        Ok(target)
    }
}
