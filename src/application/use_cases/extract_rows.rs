//! # Extract Rows Use Case
//!
//! 抽出元から全行を取得するユースケース

use log::{debug, info};

use crate::domain::entities::extraction::ExtractionResult;
use crate::domain::errors::EtlError;
use crate::domain::repositories::source_repository::SourceRepository;

/// 行抽出ユースケース
///
/// 固定の抽出クエリを1回実行し、結果を全件メモリに載せる
pub struct ExtractRowsUseCase {
    query: String,
}

impl ExtractRowsUseCase {
    /// 新しいユースケースを作成
    ///
    /// # Arguments
    ///
    /// * `query` - 抽出クエリ（パラメータなし）
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// 抽出を実行
    ///
    /// # Errors
    ///
    /// クエリが空の場合は `EtlError::Query`。
    /// それ以外は抽出元リポジトリのエラーをそのまま返す（リトライしない）
    pub async fn execute<S>(&self, source: &mut S) -> Result<ExtractionResult, EtlError>
    where
        S: SourceRepository + ?Sized,
    {
        if self.query.trim().is_empty() {
            return Err(EtlError::Query("extraction query is empty".to_string()));
        }

        let result = source.fetch_all(&self.query).await?;

        info!(
            "Extracted {} rows ({} columns)",
            result.len(),
            result.columns().len()
        );
        debug!("Extracted columns: {}", result.columns().join(", "));

        Ok(result)
    }
}
