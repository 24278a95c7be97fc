//! # TableRef
//!
//! 出力先テーブルの参照

use serde::{Deserialize, Serialize};
use std::fmt;

use super::dialect::Dialect;

/// スキーマ修飾付きのテーブル名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: Option<String>, name: impl Into<String>) -> Self {
        let schema = schema.filter(|s| !s.trim().is_empty());
        Self {
            schema,
            name: name.into(),
        }
    }

    /// 方言に合わせてクオートした完全修飾名
    pub fn qualified(&self, dialect: Dialect) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_ident(schema),
                dialect.quote_ident(&self.name)
            ),
            None => dialect.quote_ident(&self.name),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}
