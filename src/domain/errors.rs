//! # Domain Errors
//!
//! 抽出・ロード処理のエラー分類

use thiserror::Error;

/// ジョブ全体で共有されるエラー
///
/// どのエラーもジョブ内で回復されることはなく、そのままプロセス終了まで伝播する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EtlError {
    /// 接続設定の欠落・不正
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 接続不可、認証失敗、エンコーディング交渉の失敗
    #[error("connection error: {0}")]
    Connection(String),

    /// 抽出クエリが不正、または現在のスキーマと整合しない
    #[error("query error: {0}")]
    Query(String),

    /// 抽出した列と出力先テーブルの列が整合しない
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// 挿入時の制約違反
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl EtlError {
    /// ログ出力用の短い分類名
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Configuration(_) => "ConfigurationError",
            EtlError::Connection(_) => "ConnectionError",
            EtlError::Query(_) => "QueryError",
            EtlError::SchemaMismatch(_) => "SchemaMismatchError",
            EtlError::Integrity(_) => "IntegrityError",
        }
    }
}
