//! # SqlValue
//!
//! 抽出した列値の型付き表現

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

/// 列値の型の種類
///
/// NULL を出力先へバインドする際に型を決めるためにも使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

/// 1セル分の値
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// 元の列の型を保持した NULL
    Null(ValueKind),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl SqlValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// 値の型の種類を返す
    pub fn kind(&self) -> ValueKind {
        match self {
            SqlValue::Null(kind) => *kind,
            SqlValue::Bool(_) => ValueKind::Bool,
            SqlValue::Int(_) => ValueKind::Int,
            SqlValue::Float(_) => ValueKind::Float,
            SqlValue::Decimal(_) => ValueKind::Decimal,
            SqlValue::Text(_) => ValueKind::Text,
            SqlValue::Bytes(_) => ValueKind::Bytes,
            SqlValue::Date(_) => ValueKind::Date,
            SqlValue::Time(_) => ValueKind::Time,
            SqlValue::Timestamp(_) => ValueKind::Timestamp,
            SqlValue::TimestampTz(_) => ValueKind::TimestampTz,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_keeps_kind() {
        let value = SqlValue::Null(ValueKind::Float);
        assert!(value.is_null());
        assert_eq!(value.kind(), ValueKind::Float);
    }

    #[test]
    fn test_kind_of_values() {
        assert_eq!(SqlValue::from("José").kind(), ValueKind::Text);
        assert_eq!(SqlValue::from(7.5).kind(), ValueKind::Float);
        assert_eq!(SqlValue::from(3_i64).kind(), ValueKind::Int);
        assert_eq!(
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).kind(),
            ValueKind::Date
        );
    }
}
