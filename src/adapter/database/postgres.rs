//! # PostgreSQL
//!
//! PostgreSQL への接続（抽出元・出力先の両方に使える）

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info, warn, LevelFilter};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Either, Executor, Row, Statement, TypeInfo};

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

/// 型名から値の種類を決める
///
/// 対応していない型は `None`
pub(crate) fn column_kind(type_name: &str) -> Option<ValueKind> {
    let kind = match type_name {
        "BOOL" => ValueKind::Bool,
        "INT2" | "INT4" | "INT8" => ValueKind::Int,
        "FLOAT4" | "FLOAT8" => ValueKind::Float,
        "NUMERIC" => ValueKind::Decimal,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => ValueKind::Text,
        "BYTEA" => ValueKind::Bytes,
        "DATE" => ValueKind::Date,
        "TIME" => ValueKind::Time,
        "TIMESTAMP" => ValueKind::Timestamp,
        "TIMESTAMPTZ" => ValueKind::TimestampTz,
        _ => return None,
    };
    Some(kind)
}

/// client_encoding の報告値が UTF-8 か
pub(crate) fn is_utf8_encoding(reported: &str) -> bool {
    let reported = reported.trim();
    reported.eq_ignore_ascii_case("UTF8") || reported.eq_ignore_ascii_case("UTF-8")
}

fn decode_value(row: &PgRow, index: usize, column: &ExtractedColumn) -> Result<SqlValue, sqlx::Error> {
    let value = match column.type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| SqlValue::Int(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| SqlValue::Int(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| SqlValue::Float(v.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(index)?
            .map(SqlValue::Decimal),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(SqlValue::Bytes),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.map(SqlValue::Date),
        "TIME" => row.try_get::<Option<NaiveTime>, _>(index)?.map(SqlValue::Time),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(SqlValue::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(SqlValue::TimestampTz),
        _ => row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text),
    };

    Ok(value.unwrap_or(SqlValue::Null(column.kind)))
}

/// NULL は出力先の列型が分かればその型で、分からなければ抽出時の型でバインドする
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
    destination: Option<ValueKind>,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null(kind) => match destination.unwrap_or(*kind) {
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

async fn force_utf8(conn: &mut PgConnection, label: &str) -> Result<(), EtlError> {
    (&mut *conn)
        .execute("SET client_encoding TO 'UTF8'")
        .await
        .map_err(|e| encoding_error(e, label))?;

    let reported: String = sqlx::query_scalar("SHOW client_encoding")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| encoding_error(e, label))?;

    if !is_utf8_encoding(&reported) {
        return Err(EtlError::Connection(format!(
            "{} reports client_encoding '{}' after requesting UTF8",
            label, reported
        )));
    }

    debug!("client_encoding on {} is {}", label, reported);
    Ok(())
}

/// 1行分の INSERT をプリペアし、サーバーが推定したパラメータ型を列順に返す
async fn parameter_kinds(
    conn: &mut PgConnection,
    statement: &InsertStatement,
) -> Result<Vec<Option<ValueKind>>, EtlError> {
    let sql = statement.sql(1);
    let prepared = (&mut *conn).prepare(&sql).await.map_err(load_error)?;

    let kinds = match prepared.parameters() {
        Some(Either::Left(types)) => types.iter().map(|t| column_kind(t.name())).collect(),
        _ => Vec::new(),
    };
    Ok(kinds)
}

async fn insert_chunks(
    conn: &mut PgConnection,
    statement: &InsertStatement,
    rows: &[ValueRow],
) -> Result<u64, EtlError> {
    let kinds = parameter_kinds(conn, statement).await?;
    let mut inserted = 0;

    for chunk in rows.chunks(statement.rows_per_statement()) {
        let sql = statement.sql(chunk.len());
        let mut query = sqlx::query(&sql);
        for row in chunk {
            for (index, value) in row.iter().enumerate() {
                query = bind_value(query, value, kinds.get(index).copied().flatten());
            }
        }

        let result = query.execute(&mut *conn).await.map_err(load_error)?;
        inserted += result.rows_affected();
        debug!("Inserted chunk of {} rows into {}", chunk.len(), statement.table());
    }

    Ok(inserted)
}

/// PostgreSQL の接続1本
pub struct PostgresDatabase {
    conn: Option<PgConnection>,
    label: String,
}

impl PostgresDatabase {
    /// 接続してセッションを UTF-8 に固定する
    ///
    /// # Errors
    ///
    /// 接続・認証・エンコーディング設定の失敗はすべて `EtlError::Connection`
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, EtlError> {
        let label = settings.describe();
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.username)
            .password(&settings.password)
            .database(&settings.database)
            .log_statements(LevelFilter::Debug);

        info!("Connecting to {}", label);
        let mut conn = PgConnection::connect_with(&options)
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

    fn connection(&mut self) -> Result<&mut PgConnection, EtlError> {
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
impl SourceRepository for PostgresDatabase {
    async fn fetch_all(&mut self, query: &str) -> Result<ExtractionResult, EtlError> {
        let conn = self.connection()?;

        let statement = (&mut *conn).prepare(query).await.map_err(extract_error)?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| ExtractedColumn::new(c.name(), c.type_info().name(), column_kind))
            .collect::<Result<Vec<_>, _>>()?;

        let pg_rows = statement
            .query()
            .fetch_all(&mut *conn)
            .await
            .map_err(extract_error)?;

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let row = columns
                .iter()
                .enumerate()
                .map(|(index, column)| decode_value(pg_row, index, column))
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
impl TargetRepository for PostgresDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn table_columns(&mut self, table: &TableRef) -> Result<Vec<String>, EtlError> {
        let conn = self.connection()?;
        let sql = format!("SELECT * FROM {}", table.qualified(Dialect::Postgres));
        let statement = (&mut *conn).prepare(&sql).await.map_err(load_error)?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    async fn clear_table(&mut self, table: &TableRef) -> Result<(), EtlError> {
        let conn = self.connection()?;
        let sql = format!("TRUNCATE TABLE {}", table.qualified(Dialect::Postgres));
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
