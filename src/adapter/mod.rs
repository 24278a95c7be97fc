//! Adapter Layer
//!
//! 外部システム（データベース、設定、SQL リソース）との統合

pub mod config;
pub mod database;
pub mod query;
