//! # Source Repository Trait
//!
//! 抽出元データベースへのアクセスを抽象化

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::entities::extraction::ExtractionResult;
use crate::domain::errors::EtlError;

/// 抽出元リポジトリ
///
/// 開いた接続1本を保持し、抽出クエリを1回実行する
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceRepository: Send {
    /// クエリを実行して結果を全件メモリに読み込む
    ///
    /// # Arguments
    ///
    /// * `query` - パラメータを持たない抽出クエリ
    ///
    /// # Returns
    ///
    /// 列名（クエリのメタデータ順）と全行
    ///
    /// # Errors
    ///
    /// 通信断は `EtlError::Connection`、クエリ不正は `EtlError::Query`
    async fn fetch_all(&mut self, query: &str) -> Result<ExtractionResult, EtlError>;

    /// 接続を閉じる（2回目以降は何もしない）
    async fn close(&mut self) -> Result<(), EtlError>;
}
