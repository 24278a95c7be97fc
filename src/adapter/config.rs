//! # Configuration
//!
//! 接続設定の解決（環境変数または JSON ファイル）
//!
//! 設定は起動時に1回だけ解決し、以降はこの構造体を引き回す。
//! 下位の層が環境変数を直接読むことはない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

use crate::domain::entities::dialect::Dialect;
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;

/// 抽出元の環境変数プレフィックス
pub const SOURCE_PREFIX: &str = "SOURCE_DB";
/// 出力先の環境変数プレフィックス
pub const TARGET_PREFIX: &str = "TARGET_DB";
pub const TARGET_TABLE_KEY: &str = "TARGET_TABLE";
pub const TARGET_SCHEMA_KEY: &str = "TARGET_SCHEMA";

/// データベース1つ分の接続設定
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub kind: Dialect,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    /// データベース名／サービス名（SQLite ではファイルパス）
    pub database: String,
}

impl DatabaseSettings {
    /// SQLite ファイルの設定
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            kind: Dialect::Sqlite,
            username: String::new(),
            password: String::new(),
            host: String::new(),
            port: 0,
            database: path.into(),
        }
    }

    /// `<prefix>_KIND` などの環境変数から設定を読む
    ///
    /// 足りないキーは `missing` に追加する（まとめて報告するため）。
    fn from_lookup<F>(prefix: &str, lookup: &F, missing: &mut Vec<String>) -> Result<Self, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |suffix: &str| format!("{}_{}", prefix, suffix);
        let mut required = |suffix: &str| -> String {
            let name = key(suffix);
            match lookup(&name).filter(|v| !v.trim().is_empty()) {
                Some(value) => value,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let kind_raw = required("KIND");
        let database = required("NAME").trim().to_string();

        let kind = if kind_raw.is_empty() {
            // 種類が不明な場合はサーバー接続とみなして全キーを要求する
            None
        } else {
            Some(
                kind_raw
                    .parse::<Dialect>()
                    .map_err(|e| EtlError::Configuration(format!("{}: {}", key("KIND"), e)))?,
            )
        };

        if matches!(kind, Some(Dialect::Sqlite)) {
            return Ok(Self::sqlite(database));
        }

        let username = required("USER").trim().to_string();
        // 空のパスワード（trust 認証など）を許す
        let password = lookup(&key("PASSWORD")).unwrap_or_default();
        let host = required("HOST").trim().to_string();
        let port_raw = required("PORT");

        let port = if port_raw.is_empty() {
            0
        } else {
            port_raw.trim().parse::<u16>().map_err(|_| {
                EtlError::Configuration(format!(
                    "{} must be a port number, got '{}'",
                    key("PORT"),
                    port_raw.trim()
                ))
            })?
        };

        Ok(Self {
            kind: kind.unwrap_or(Dialect::Postgres),
            username,
            password,
            host,
            port,
            database,
        })
    }

    /// 必須項目の検証
    fn validate(&self, label: &str) -> Result<(), EtlError> {
        let mut missing = Vec::new();

        if self.database.trim().is_empty() {
            missing.push("database");
        }
        if self.kind.is_server() {
            if self.host.trim().is_empty() {
                missing.push("host");
            }
            if self.port == 0 {
                missing.push("port");
            }
            if self.username.trim().is_empty() {
                missing.push("username");
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EtlError::Configuration(format!(
                "{} settings are missing: {}",
                label,
                missing.join(", ")
            )))
        }
    }

    /// パスワードを含まない接続先の表記（ログ用）
    pub fn describe(&self) -> String {
        match self.kind {
            Dialect::Sqlite => format!("sqlite:{}", self.database),
            kind => format!(
                "{}://{}@{}:{}/{}",
                kind, self.username, self.host, self.port, self.database
            ),
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &"********")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// ジョブ全体の設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub source: DatabaseSettings,
    pub target: DatabaseSettings,
    pub target_table: TableRef,
}

impl Config {
    /// プロセスの環境変数から設定を解決する
    pub fn from_env() -> Result<Self, EtlError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を解決する
    ///
    /// # Errors
    ///
    /// 必須キーの欠落、ポート番号や種類の不正は `EtlError::Configuration`
    ///
    /// # 例
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use ceadex_etl::adapter::config::Config;
    ///
    /// let env: HashMap<&str, &str> = HashMap::from([
    ///     ("SOURCE_DB_KIND", "sqlite"),
    ///     ("SOURCE_DB_NAME", "/tmp/moodle.db"),
    ///     ("TARGET_DB_KIND", "sqlite"),
    ///     ("TARGET_DB_NAME", "/tmp/selfservice.db"),
    ///     ("TARGET_TABLE", "ceadex_alunos"),
    /// ]);
    ///
    /// let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.target_table.name, "ceadex_alunos");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();

        let source = DatabaseSettings::from_lookup(SOURCE_PREFIX, &lookup, &mut missing)?;
        let target = DatabaseSettings::from_lookup(TARGET_PREFIX, &lookup, &mut missing)?;

        let table = lookup(TARGET_TABLE_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if table.is_none() {
            missing.push(TARGET_TABLE_KEY.to_string());
        }

        if !missing.is_empty() {
            return Err(EtlError::Configuration(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let schema = lookup(TARGET_SCHEMA_KEY).map(|v| v.trim().to_string());
        let config = Self {
            source,
            target,
            target_table: TableRef::new(schema, table.unwrap_or_default()),
        };
        config.validate()?;

        Ok(config)
    }

    /// JSON ファイルから設定を読み込む
    pub fn load(path: &str) -> Result<Self, EtlError> {
        let expanded = shellexpand::tilde(path);
        let content = fs::read_to_string(expanded.as_ref()).map_err(|e| {
            EtlError::Configuration(format!("failed to read config file {}: {}", expanded, e))
        })?;
        let mut config: Config = serde_json::from_str(&content).map_err(|e| {
            EtlError::Configuration(format!("invalid config file {}: {}", expanded, e))
        })?;
        let name = config.target_table.name.trim().to_string();
        config.target_table = TableRef::new(config.target_table.schema.take(), name);
        config.validate()?;

        Ok(config)
    }

    /// 設定全体の検証
    pub fn validate(&self) -> Result<(), EtlError> {
        self.source.validate("source database")?;
        self.target.validate("target database")?;

        if self.target_table.name.trim().is_empty() {
            return Err(EtlError::Configuration(
                "target table name is empty".to_string(),
            ));
        }

        Ok(())
    }
}
