//! # Dialect
//!
//! 接続先データベースの種類と SQL 方言の差異

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// サポートするデータベースの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// 識別子をクオートする
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// 1始まりの通し番号に対応するプレースホルダ
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", position),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// 1文あたりのバインドパラメータ上限
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Postgres | Dialect::MySql => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }

    /// クオートした識別子でも大文字小文字を区別しないか
    pub fn case_insensitive_idents(&self) -> bool {
        matches!(self, Dialect::MySql | Dialect::Sqlite)
    }

    /// サーバーに接続するタイプか（SQLite はファイル）
    pub fn is_server(&self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(format!(
                "unknown database kind '{}' (expected postgres, mysql or sqlite)",
                other
            )),
        }
    }
}
