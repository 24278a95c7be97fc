//! # Extraction Query Resource
//!
//! 抽出クエリの読み込み
//!
//! 既定のクエリ（受講者ごとの進捗状況と終了月）はバイナリに埋め込む。
//! 内容は解釈せず、そのまま抽出元で実行する。

use log::info;
use std::fs;

use crate::domain::errors::EtlError;

/// CEADEx 受講者の状況を集計するクエリ（PostgreSQL / Moodle スキーマ用）
pub const CEADEX_ENROLLMENTS_QUERY: &str = include_str!("../../sql/ceadex_enrollments.sql");

/// 抽出クエリを取得する
///
/// # Arguments
///
/// * `path` - クエリファイルのパス。`None` の場合は埋め込みクエリ
///
/// # Errors
///
/// ファイルが読めない、または空の場合に `EtlError::Configuration`
pub fn load_query(path: Option<&str>) -> Result<String, EtlError> {
    let Some(path) = path else {
        return Ok(CEADEX_ENROLLMENTS_QUERY.to_string());
    };

    let expanded = shellexpand::tilde(path);
    let content = fs::read_to_string(expanded.as_ref()).map_err(|e| {
        EtlError::Configuration(format!("failed to read query file {}: {}", expanded, e))
    })?;

    let query = content.trim().trim_end_matches(';').trim_end().to_string();
    if query.is_empty() {
        return Err(EtlError::Configuration(format!(
            "query file {} is empty",
            expanded
        )));
    }

    info!("Loaded extraction query from {}", expanded);
    Ok(query)
}
