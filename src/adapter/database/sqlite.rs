//! # SQLite
//!
//! SQLite ファイルへの接続
//!
//! SQLite は値ごとに型を持つため、列の宣言型は NULL の種類を決めるためだけに使い、
//! 値そのものは実際のストレージクラスでデコードする。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info, warn, LevelFilter};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo, ValueRef,
};

use super::errors::{
    close_error, closed_error, connect_error, encoding_error, extract_error, load_error,
};
use super::{check_row_widths, settle_null_kinds, ExtractedColumn};
use crate::adapter::config::DatabaseSettings;
use crate::domain::entities::dialect::Dialect;
use crate::domain::entities::extraction::{ExtractionResult, Row as ValueRow};
use crate::domain::entities::sql_value::{SqlValue, ValueKind};
use crate::domain::entities::table_ref::TableRef;
use crate::domain::errors::EtlError;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::services::insert_statement::InsertStatement;

/// 宣言型から NULL の種類を決める（SQLite ではどの型も受け付ける）
pub(crate) fn column_kind(declared: &str) -> Option<ValueKind> {
    let kind = match declared {
        "BOOLEAN" => ValueKind::Bool,
        "INTEGER" => ValueKind::Int,
        "REAL" | "NUMERIC" => ValueKind::Float,
        "BLOB" => ValueKind::Bytes,
        _ => ValueKind::Text,
    };
    Some(kind)
}

/// `PRAGMA encoding` の値が UTF 系か
pub(crate) fn is_utf_encoding(reported: &str) -> bool {
    reported.trim().to_ascii_uppercase().starts_with("UTF")
}

fn decode_value(
    row: &SqliteRow,
    index: usize,
    column: &ExtractedColumn,
) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null(column.kind));
    }
    let storage = raw.type_info().name().to_string();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" if column.kind == ValueKind::Bool => {
            SqlValue::Bool(row.try_get_unchecked::<i64, _>(index)? != 0)
        }
        "INTEGER" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(value)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null(kind) => match kind {
            ValueKind::Bool => query.bind(None::<bool>),
            ValueKind::Int => query.bind(None::<i64>),
            ValueKind::Float => query.bind(None::<f64>),
            ValueKind::Decimal | ValueKind::Text => query.bind(None::<String>),
            ValueKind::Bytes => query.bind(None::<Vec<u8>>),
            ValueKind::Date => query.bind(None::<NaiveDate>),
            ValueKind::Time => query.bind(None::<NaiveTime>),
            ValueKind::Timestamp => query.bind(None::<NaiveDateTime>),
            ValueKind::TimestampTz => query.bind(None::<DateTime<Utc>>),
        },
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        // SQLite には10進数型が無いので文字列で渡す（列の型アフィニティで変換される）
        SqlValue::Decimal(v) => query.bind(v.to_string()),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::TimestampTz(v) => query.bind(*v),
    }
}

async fn verify_utf8(conn: &mut SqliteConnection, label: &str) -> Result<(), EtlError> {
    let reported: String = sqlx::query_scalar("PRAGMA encoding")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| encoding_error(e, label))?;

    if !is_utf_encoding(&reported) {
        return Err(EtlError::Connection(format!(
            "{} uses encoding '{}'",
            label, reported
        )));
    }

    debug!("encoding of {} is {}", label, reported);
    Ok(())
}

async fn insert_chunks(
    conn: &mut SqliteConnection,
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

/// SQLite ファイルへの接続1本
pub struct SqliteDatabase {
    conn: Option<SqliteConnection>,
    label: String,
}

impl SqliteDatabase {
    /// 既存のデータベースファイルを開く（無ければ作らずにエラー）
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, EtlError> {
        let label = settings.describe();
        let path = shellexpand::tilde(&settings.database).to_string();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(false)
            .log_statements(LevelFilter::Debug);

        info!("Opening {}", label);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| connect_error(e, &label))?;

        if let Err(e) = verify_utf8(&mut conn, &label).await {
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

    fn connection(&mut self) -> Result<&mut SqliteConnection, EtlError> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(closed_error(&self.label)),
        }
    }

    async fn close_connection(&mut self) -> Result<(), EtlError> {
        match self.conn.take() {
            Some(conn) => {
                conn.close().await.map_err(|e| close_error(e, &self.label))?;
                info!("Closed {}", self.label);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceRepository for SqliteDatabase {
    async fn fetch_all(&mut self, query: &str) -> Result<ExtractionResult, EtlError> {
        let conn = self.connection()?;

        let statement = (&mut *conn).prepare(query).await.map_err(extract_error)?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| ExtractedColumn::new(c.name(), c.type_info().name(), column_kind))
            .collect::<Result<Vec<_>, _>>()?;

        let sqlite_rows = statement
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(extract_error)?;

        let mut rows = Vec::with_capacity(sqlite_rows.len());
        for sqlite_row in &sqlite_rows {
            let row = columns
                .iter()
                .enumerate()
                .map(|(index, column)| decode_value(sqlite_row, index, column))
                .collect::<Result<Vec<_>, _>>()
                .map_err(extract_error)?;
            rows.push(row);
        }

        // 式の列は宣言型が無く、NULL の種類を値から決める
        for (index, column) in columns.iter().enumerate() {
            if column.type_name == "NULL" {
                settle_null_kinds(&mut rows, index);
            }
        }

        ExtractionResult::new(ExtractedColumn::names(&columns), rows)
    }

    async fn close(&mut self) -> Result<(), EtlError> {
        self.close_connection().await
    }
}

#[async_trait]
impl TargetRepository for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<String>, EtlError> {
        let conn = self.connection()?;
        let sql = format!("SELECT * FROM {}", table.qualified(Dialect::Sqlite));
        let statement = (&mut *conn).prepare(&sql).await.map_err(load_error)?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    async fn clear_table(&mut self, table: &TableRef) -> Result<(), EtlError> {
        let conn = self.connection()?;
        // WHERE 無しの DELETE は SQLite の truncate 最適化で処理される
        let sql = format!("DELETE FROM {}", table.qualified(Dialect::Sqlite));
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
