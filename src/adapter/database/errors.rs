//! Driver error classification
//!
//! `sqlx::Error` をフェーズごとに `EtlError` へ分類する

use sqlx::error::{DatabaseError, ErrorKind};

use crate::domain::errors::EtlError;

/// Transport-level failures (the connection itself is gone or unusable)
fn is_transport_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Constraint violations: driver-reported kind, or SQLSTATE class 23
fn is_integrity_violation(err: &dyn DatabaseError) -> bool {
    match err.kind() {
        ErrorKind::UniqueViolation
        | ErrorKind::ForeignKeyViolation
        | ErrorKind::NotNullViolation
        | ErrorKind::CheckViolation => true,
        _ => err
            .code()
            .map(|code| code.len() == 5 && code.starts_with("23"))
            .unwrap_or(false),
    }
}

fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => format!("{} (code {})", db.message(), code),
            None => db.message().to_string(),
        },
        other => other.to_string(),
    }
}

/// Failure while opening a connection or negotiating the session
pub fn connect_error(err: sqlx::Error, target: &str) -> EtlError {
    EtlError::Connection(format!("failed to connect to {}: {}", target, describe(&err)))
}

/// Failure while forcing the session encoding
pub fn encoding_error(err: sqlx::Error, target: &str) -> EtlError {
    EtlError::Connection(format!(
        "failed to set UTF-8 encoding on {}: {}",
        target,
        describe(&err)
    ))
}

/// Failure while running the extraction query
pub fn extract_error(err: sqlx::Error) -> EtlError {
    if is_transport_error(&err) {
        EtlError::Connection(format!("lost connection to source database: {}", describe(&err)))
    } else {
        EtlError::Query(format!("extraction query failed: {}", describe(&err)))
    }
}

/// Failure while reading, clearing or writing the destination table
pub fn load_error(err: sqlx::Error) -> EtlError {
    if is_transport_error(&err) {
        return EtlError::Connection(format!(
            "lost connection to target database: {}",
            describe(&err)
        ));
    }

    if let sqlx::Error::Database(db) = &err {
        if is_integrity_violation(db.as_ref()) {
            return EtlError::Integrity(describe(&err));
        }
    }

    EtlError::SchemaMismatch(format!(
        "target table rejected the extracted rows: {}",
        describe(&err)
    ))
}

/// Operation attempted after `close`
pub fn closed_error(target: &str) -> EtlError {
    EtlError::Connection(format!("connection to {} is already closed", target))
}

/// Failure while closing a connection
pub fn close_error(err: sqlx::Error, target: &str) -> EtlError {
    EtlError::Connection(format!("failed to close connection to {}: {}", target, describe(&err)))
}
