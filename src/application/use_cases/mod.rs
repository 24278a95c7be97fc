//! # Use Cases
//!
//! アプリケーションのビジネスフロー（ユースケース）
//!
//! ## ユースケース
//!
//! - **ExtractRowsUseCase**: 抽出クエリの実行と全件取得
//! - **LoadTableUseCase**: 出力先テーブルの全件入れ替え

pub mod extract_rows;
pub mod load_table;
