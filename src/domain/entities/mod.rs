//! # Domain Entities
//!
//! ビジネスエンティティとバリューオブジェクトを定義するモジュール
//!
//! ## エンティティ
//!
//! - **ExtractionResult**: 抽出クエリの列名と全行
//! - **SqlValue**: 型付きの列値
//! - **TableRef**: 出力先テーブルの参照
//! - **Dialect**: データベースの種類と SQL 方言

pub mod dialect;
pub mod extraction;
pub mod sql_value;
pub mod table_ref;
