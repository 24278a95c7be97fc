//! Workflow Integration Tests
//!
//! EtlWorkflow を SQLite ファイル同士で実行する統合テスト

use ceadex_etl::adapter::config::{Config, DatabaseSettings};
use ceadex_etl::domain::entities::table_ref::TableRef;
use ceadex_etl::domain::errors::EtlError;
use ceadex_etl::driver::cli::Args;
use ceadex_etl::driver::workflow::EtlWorkflow;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TARGET_TABLE: &str = "CREATE TABLE ceadex_alunos (name TEXT NOT NULL, score REAL);
     INSERT INTO ceadex_alunos VALUES ('stale', 0.0);";

const QUERY: &str = "SELECT name, score FROM alunos ORDER BY rowid;";

/// テスト用の SQLite ファイルを作成
async fn create_database(path: &Path, setup: &str) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    sqlx::raw_sql(setup).execute(&mut conn).await.unwrap();
    conn.close().await.unwrap();
}

/// 出力先テーブルの中身を読む
async fn read_target(path: &Path) -> Vec<(String, Option<f64>)> {
    let options = SqliteConnectOptions::new().filename(path);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    let rows = sqlx::query_as("SELECT name, score FROM ceadex_alunos ORDER BY rowid")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
    rows
}

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    target: PathBuf,
    query_file: String,
}

impl Fixture {
    async fn new(source_setup: &str, target_setup: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("moodle.db");
        let target = dir.path().join("selfservice.db");
        create_database(&source, source_setup).await;
        create_database(&target, target_setup).await;

        let query_path = dir.path().join("query.sql");
        fs::write(&query_path, QUERY).unwrap();

        Self {
            query_file: query_path.to_string_lossy().to_string(),
            _dir: dir,
            source,
            target,
        }
    }

    fn config(&self) -> Config {
        Config {
            source: DatabaseSettings::sqlite(self.source.to_string_lossy()),
            target: DatabaseSettings::sqlite(self.target.to_string_lossy()),
            target_table: TableRef::new(None, "ceadex_alunos"),
        }
    }

    fn args(&self) -> Args {
        Args {
            query_file: Some(self.query_file.clone()),
            ..Args::default()
        }
    }

    async fn run(&self) -> anyhow::Result<ceadex_etl::application::dto::run_report::RunReport> {
        EtlWorkflow::new(self.config()).execute(self.args()).await
    }
}

fn source_with(rows: &str) -> String {
    format!(
        "CREATE TABLE alunos (name TEXT NOT NULL, score REAL);{}",
        rows
    )
}

fn etl_error(err: &anyhow::Error) -> &EtlError {
    err.downcast_ref::<EtlError>()
        .expect("workflow errors should be EtlError")
}

#[tokio::test]
async fn test_workflow_replaces_table_contents() {
    let fixture = Fixture::new(
        &source_with(
            "INSERT INTO alunos VALUES ('Ana', 7.5);
             INSERT INTO alunos VALUES ('José', 4.0);
             INSERT INTO alunos VALUES ('Lia', NULL);",
        ),
        TARGET_TABLE,
    )
    .await;

    let report = fixture.run().await.unwrap();

    assert_eq!(report.extracted_rows, 3);
    assert_eq!(report.inserted_rows(), 3);
    assert_eq!(
        read_target(&fixture.target).await,
        vec![
            ("Ana".to_string(), Some(7.5)),
            ("José".to_string(), Some(4.0)),
            ("Lia".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_workflow_rerun_is_idempotent() {
    let fixture = Fixture::new(
        &source_with(
            "INSERT INTO alunos VALUES ('Ana', 7.5);
             INSERT INTO alunos VALUES ('José', 4.0);",
        ),
        TARGET_TABLE,
    )
    .await;

    fixture.run().await.unwrap();
    let first = read_target(&fixture.target).await;
    fixture.run().await.unwrap();
    let second = read_target(&fixture.target).await;

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_workflow_zero_rows_empties_target() {
    let fixture = Fixture::new(&source_with(""), TARGET_TABLE).await;

    let report = fixture.run().await.unwrap();

    assert_eq!(report.extracted_rows, 0);
    assert_eq!(report.inserted_rows(), 0);
    assert!(read_target(&fixture.target).await.is_empty());
}

#[tokio::test]
async fn test_workflow_insert_failure_after_clear_leaves_target_empty() {
    let fixture = Fixture::new(
        &source_with(
            "INSERT INTO alunos VALUES ('Ana', 7.5);
             INSERT INTO alunos VALUES ('Lia', NULL);",
        ),
        "CREATE TABLE ceadex_alunos (name TEXT NOT NULL, score REAL NOT NULL);
         INSERT INTO ceadex_alunos VALUES ('stale', 0.0);",
    )
    .await;

    let err = fixture.run().await.unwrap_err();

    assert!(matches!(etl_error(&err), EtlError::Integrity(_)));
    assert!(read_target(&fixture.target).await.is_empty());
}

#[tokio::test]
async fn test_workflow_round_trips_accented_text() {
    let names = ["José", "Conceição", "Ângela Müller", "João d'Ávila"];
    let inserts: String = names
        .iter()
        .map(|n| format!("INSERT INTO alunos VALUES ('{}', 5.0);", n.replace('\'', "''")))
        .collect();
    let fixture = Fixture::new(&source_with(&inserts), TARGET_TABLE).await;

    fixture.run().await.unwrap();

    let loaded = read_target(&fixture.target).await;
    let loaded_names: Vec<&str> = loaded.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(loaded_names, names);
    for (loaded, expected) in loaded.iter().zip(names) {
        assert_eq!(loaded.0.as_bytes(), expected.as_bytes());
    }
}

#[tokio::test]
async fn test_workflow_missing_source_leaves_target_untouched() {
    let fixture = Fixture::new(&source_with(""), TARGET_TABLE).await;
    let mut config = fixture.config();
    config.source = DatabaseSettings::sqlite(
        fixture
            .source
            .with_file_name("missing.db")
            .to_string_lossy(),
    );

    let err = EtlWorkflow::new(config)
        .execute(fixture.args())
        .await
        .unwrap_err();

    assert!(matches!(etl_error(&err), EtlError::Connection(_)));
    assert_eq!(
        read_target(&fixture.target).await,
        vec![("stale".to_string(), Some(0.0))]
    );
}

#[tokio::test]
async fn test_workflow_schema_mismatch_leaves_target_untouched() {
    let fixture = Fixture::new(
        &source_with("INSERT INTO alunos VALUES ('Ana', 7.5);"),
        "CREATE TABLE ceadex_alunos (name TEXT NOT NULL, nota REAL);
         INSERT INTO ceadex_alunos VALUES ('stale', 0.0);",
    )
    .await;

    let err = fixture.run().await.unwrap_err();

    assert!(matches!(etl_error(&err), EtlError::SchemaMismatch(_)));
    assert!(err.to_string().contains("score"));

    let options = SqliteConnectOptions::new().filename(&fixture.target);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ceadex_alunos")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_workflow_invalid_query_is_query_error() {
    let fixture = Fixture::new(&source_with(""), TARGET_TABLE).await;
    fs::write(&fixture.query_file, "SELECT name FROM no_such_table").unwrap();

    let err = fixture.run().await.unwrap_err();

    assert!(matches!(etl_error(&err), EtlError::Query(_)));
    assert_eq!(read_target(&fixture.target).await.len(), 1);
}

#[tokio::test]
async fn test_workflow_dry_run_does_not_touch_target() {
    let fixture = Fixture::new(
        &source_with("INSERT INTO alunos VALUES ('Ana', 7.5);"),
        TARGET_TABLE,
    )
    .await;
    let args = Args {
        dry_run: true,
        ..fixture.args()
    };

    let report = EtlWorkflow::new(fixture.config())
        .execute(args)
        .await
        .unwrap();

    assert!(report.is_dry_run());
    assert_eq!(report.extracted_rows, 1);
    assert_eq!(
        read_target(&fixture.target).await,
        vec![("stale".to_string(), Some(0.0))]
    );
}
