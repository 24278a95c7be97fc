//! # Target Repository Trait
//!
//! 出力先データベースへの書き込みを抽象化

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::entities::dialect::Dialect;
use crate::domain::entities::extraction::Row;
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;
use crate::domain::services::insert_statement::InsertStatement;

/// 出力先リポジトリ
///
/// 開いた接続1本を保持し、テーブルの全件入れ替えに必要な操作を提供する
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetRepository: Send {
    /// 接続先の SQL 方言
    fn dialect(&self) -> Dialect;

    /// テーブルの列名を返す（テーブルが無ければ `EtlError::SchemaMismatch`）
    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<String>, EtlError>;

    /// テーブルの全行を削除して領域を解放する
    ///
    /// 行ごとの DELETE ではなく TRUNCATE 相当で、完了時点で確定する。
    async fn clear_table(&mut self, table: &TableRef) -> Result<(), EtlError>;

    /// 全行を1つのトランザクションで挿入してコミットする
    ///
    /// # Arguments
    ///
    /// * `statement` - 列リストとプレースホルダの形
    /// * `rows` - 挿入する行（列順は `statement` と同じ）
    ///
    /// # Returns
    ///
    /// 挿入した行数
    ///
    /// # Errors
    ///
    /// 失敗した場合は何もコミットされない
    async fn insert_all(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64, EtlError>;

    /// 接続を閉じる（2回目以降は何もしない）
    async fn close(&mut self) -> Result<(), EtlError>;
}
