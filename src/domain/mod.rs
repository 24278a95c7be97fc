//! # Domain Layer
//!
//! このモジュールはビジネスの核心的なルールとエンティティを定義します。
//!
//! ## 特徴
//!
//! - データベースドライバに依存しない
//! - 抽出クエリそのもの（集計ロジック）は SQL リソースとして扱い、ここでは解釈しない
//! - 純粋なビジネスロジック
//!
//! ## 構成要素
//!
//! - **entities**: ExtractionResult, SqlValue, TableRef, Dialect
//! - **errors**: ジョブ全体のエラー分類
//! - **repositories**: Repository trait（インターフェース定義のみ）
//! - **services**: INSERT 文の組み立て、列の互換性チェック

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod services;
