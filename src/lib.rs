//! # ceadex-etl
//!
//! Moodle（PostgreSQL）から CEADEX の履修状況を抽出し、
//! 出力先データベースのテーブルを全件入れ替えるジョブ
//!
//! クリーンアーキテクチャを採用しており、以下の4層で構成されています：
//!
//! - **Domain層**: 値・エンティティ・リポジトリ trait（ドライバ非依存）
//! - **Application層**: 抽出とロードのユースケース
//! - **Adapter層**: sqlx による接続、設定、抽出クエリ
//! - **Driver層**: CLI、依存性注入

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
// カバレッジ計測時にデータベースサーバー依存コードを除外するために使用
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// Domain層（純粋なビジネスロジック）
pub mod domain;

// Application層（ユースケース）
pub mod application;

// Adapter層（Infrastructure）
pub mod adapter;

// Driver層（Presentation）
pub mod driver;
