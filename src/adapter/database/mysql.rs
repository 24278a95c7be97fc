//! # MySQL
//!
//! MySQL / MariaDB への接続

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info, warn, LevelFilter};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo};

use super::errors::{
    close_error, closed_error, connect_error, encoding_error, extract_error, load_error,
};
use super::{check_row_widths, ExtractedColumn};
use crate::adapter::config::DatabaseSettings;
use crate::domain::entities::dialect::Dialect;
use crate::domain::entities::extraction::{ExtractionResult, Row as ValueRow};
use crate::domain::entities::sql_value::{SqlValue, ValueKind};
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::services::insert_statement::InsertStatement;

const CHARSET: &str = "utf8mb4";

const SIGNED_INTS: [&str; 5] = ["TINYINT", "SMALLINT", "MEDIUMINT", "INT", "BIGINT"];
const UNSIGNED_INTS: [&str; 5] = [
    "TINYINT UNSIGNED",
    "SMALLINT UNSIGNED",
    "MEDIUMINT UNSIGNED",
    "INT UNSIGNED",
    "BIGINT UNSIGNED",
];
const TEXT_TYPES: [&str; 10] = [
    "CHAR",
    "VARCHAR",
    "TINYTEXT",
    "TEXT",
    "MEDIUMTEXT",
    "LONGTEXT",
    "ENUM",
    "SET",
    "JSON",
    // SELECT NULL のような型の無い列
    "NULL",
];
const BINARY_TYPES: [&str; 6] = [
    "BINARY",
    "VARBINARY",
    "TINYBLOB",
    "BLOB",
    "MEDIUMBLOB",
    "LONGBLOB",
];

/// 型名から値の種類を決める
pub(crate) fn column_kind(type_name: &str) -> Option<ValueKind> {
    let kind = match type_name {
        "BOOLEAN" => ValueKind::Bool,
        t if SIGNED_INTS.contains(&t) || UNSIGNED_INTS.contains(&t) => ValueKind::Int,
        "FLOAT" | "DOUBLE" => ValueKind::Float,
        "DECIMAL" => ValueKind::Decimal,
        t if TEXT_TYPES.contains(&t) => ValueKind::Text,
        t if BINARY_TYPES.contains(&t) => ValueKind::Bytes,
        "DATE" => ValueKind::Date,
        "TIME" => ValueKind::Time,
        "DATETIME" => ValueKind::Timestamp,
        "TIMESTAMP" => ValueKind::TimestampTz,
        _ => return None,
    };
    Some(kind)
}

/// `@@character_set_client` が UTF-8 系か
pub(crate) fn is_utf8_charset(reported: &str) -> bool {
    reported.trim().to_ascii_lowercase().starts_with("utf8")
}

/// 符号なし整数を `SqlValue` にする（i64 に収まらなければ Decimal）
pub(crate) fn unsigned_value(value: u64) -> SqlValue {
    match i64::try_from(value) {
        Ok(v) => SqlValue::Int(v),
        Err(_) => SqlValue::Decimal(Decimal::from(value)),
    }
}

fn decode_value(
    row: &MySqlRow,
    index: usize,
    column: &ExtractedColumn,
) -> Result<SqlValue, sqlx::Error> {
    let type_name = column.type_name.as_str();
    let value = match column.kind {
        ValueKind::Bool => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
        ValueKind::Int if UNSIGNED_INTS.contains(&type_name) => {
            row.try_get::<Option<u64>, _>(index)?.map(unsigned_value)
        }
        ValueKind::Int => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int),
        ValueKind::Float if type_name == "FLOAT" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| SqlValue::Float(v.into())),
        ValueKind::Float => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        ValueKind::Decimal => row
            .try_get::<Option<Decimal>, _>(index)?
            .map(SqlValue::Decimal),
        ValueKind::Text => row
            .try_get_unchecked::<Option<String>, _>(index)?
            .map(SqlValue::Text),
        ValueKind::Bytes => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)?
            .map(SqlValue::Bytes),
        ValueKind::Date => row.try_get::<Option<NaiveDate>, _>(index)?.map(SqlValue::Date),
        ValueKind::Time => row.try_get::<Option<NaiveTime>, _>(index)?.map(SqlValue::Time),
        ValueKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(SqlValue::Timestamp),
        ValueKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(SqlValue::TimestampTz),
    };

    Ok(value.unwrap_or(SqlValue::Null(column.kind)))
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null(kind) => match kind {
            ValueKind::Bool => query.bind(None::<bool>),
            ValueKind::Int => query.bind(None::<i64>),
            ValueKind::Float => query.bind(None::<f64>),
            ValueKind::Decimal => query.bind(None::<Decimal>),
            ValueKind::Text => query.bind(None::<String>),
            ValueKind::Bytes => query.bind(None::<Vec<u8>>),
            ValueKind::Date => query.bind(None::<NaiveDate>),
            ValueKind::Time => query.bind(None::<NaiveTime>),
            ValueKind::Timestamp => query.bind(None::<NaiveDateTime>),
            ValueKind::TimestampTz => query.bind(None::<DateTime<Utc>>),
        },
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::TimestampTz(v) => query.bind(*v),
    }
}

async fn force_utf8(conn: &mut MySqlConnection, label: &str) -> Result<(), EtlError> {
    (&mut *conn)
        .execute("SET NAMES utf8mb4")
        .await
        .map_err(|e| encoding_error(e, label))?;

    let reported: String = sqlx::query_scalar("SELECT CAST(@@character_set_client AS CHAR)")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| encoding_error(e, label))?;

    if !is_utf8_charset(&reported) {
        return Err(EtlError::Connection(format!(
            "{} reports character_set_client '{}' after SET NAMES {}",
            label, reported, CHARSET
        )));
    }

    debug!("character_set_client on {} is {}", label, reported);
    Ok(())
}

async fn insert_chunks(
    conn: &mut MySqlConnection,
    statement: &InsertStatement,
    rows: &[ValueRow],
) -> Result<u64, EtlError> {
    let mut inserted = 0;

    for chunk in rows.chunks(statement.rows_per_statement()) {
        let sql = statement.sql(chunk.len());
        let mut query = sqlx::query(&sql);
        for value in chunk.iter().flatten() {
            query = bind_value(query, value);
        }

        let result = query.execute(&mut *conn).await.map_err(load_error)?;
        inserted += result.rows_affected();
        debug!("Inserted chunk of {} rows into {}", chunk.len(), statement.table());
    }

    Ok(inserted)
}

/// MySQL の接続1本
pub struct MySqlDatabase {
    conn: Option<MySqlConnection>,
    label: String,
}

impl MySqlDatabase {
    /// utf8mb4 で接続する
    ///
    /// # Errors
    ///
    /// 接続・認証・文字セット設定の失敗はすべて `EtlError::Connection`
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, EtlError> {
        let label = settings.describe();
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.username)
            .password(&settings.password)
            .database(&settings.database)
            .charset(CHARSET)
            .log_statements(LevelFilter::Debug);

        info!("Connecting to {}", label);
        let mut conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| connect_error(e, &label))?;

        if let Err(e) = force_utf8(&mut conn, &label).await {
            if let Err(close) = conn.close().await {
                warn!("Failed to close {}: {}", label, close);
            }
            return Err(e);
        }

        Ok(Self {
            conn: Some(conn),
            label,
        })
    }

    fn connection(&mut self) -> Result<&mut MySqlConnection, EtlError> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(closed_error(&self.label)),
        }
    }

    async fn close_connection(&mut self) -> Result<(), EtlError> {
        match self.conn.take() {
            Some(conn) => {
                conn.close().await.map_err(|e| close_error(e, &self.label))?;
                info!("Closed connection to {}", self.label);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl SourceRepository for MySqlDatabase {
    async fn fetch_all(&mut self, query: &str) -> Result<ExtractionResult, EtlError> {
        let conn = self.connection()?;

        let statement = (&mut *conn).prepare(query).await.map_err(extract_error)?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| ExtractedColumn::new(c.name(), c.type_info().name(), column_kind))
            .collect::<Result<Vec<_>, _>>()?;

        let mysql_rows = statement
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(extract_error)?;

        let mut rows = Vec::with_capacity(mysql_rows.len());
        for mysql_row in &mysql_rows {
            let row = columns
                .iter()
                .enumerate()
                .map(|(index, column)| decode_value(mysql_row, index, column))
                .collect::<Result<Vec<_>, _>>()
                .map_err(extract_error)?;
            rows.push(row);
        }

        ExtractionResult::new(ExtractedColumn::names(&columns), rows)
    }

    async fn close(&mut self) -> Result<(), EtlError> {
        self.close_connection().await
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[async_trait]
impl TargetRepository for MySqlDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<String>, EtlError> {
        let conn = self.connection()?;
        let sql = format!("SELECT * FROM {}", table.qualified(Dialect::MySql));
        let statement = (&mut *conn).prepare(&sql).await.map_err(load_error)?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    async fn clear_table(&mut self, table: &TableRef) -> Result<(), EtlError> {
        let conn = self.connection()?;
        let sql = format!("TRUNCATE TABLE {}", table.qualified(Dialect::MySql));
        (&mut *conn)
            .execute(sql.as_str())
            .await
            .map_err(load_error)?;
        Ok(())
    }

    async fn insert_all(
        &mut self,
        statement: &InsertStatement,
        rows: &[ValueRow],
    ) -> Result<u64, EtlError> {
        check_row_widths(statement, rows)?;

        let conn = self.connection()?;
        let mut tx = conn.begin().await.map_err(load_error)?;

        match insert_chunks(&mut tx, statement, rows).await {
            Ok(inserted) => {
                tx.commit().await.map_err(load_error)?;
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback on {} failed: {}", self.label, rollback);
                }
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<(), EtlError> {
        self.close_connection().await
    }
}
