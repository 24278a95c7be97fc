//! # Domain Services
//!
//! エンティティに属さないビジネスルール

pub mod column_compatibility;
pub mod insert_statement;
