//! Workflow Orchestration
//!
//! 抽出からロードまでのオーケストレーション

use anyhow::Result;
use log::{info, warn};

use std::sync::Arc;

use crate::adapter::config::Config;
use crate::adapter::database::factory::{ConnectionFactory, SqlxConnectionFactory};
use crate::adapter::query::load_query;
use crate::application::dto::load_summary::LoadSummary;
use crate::application::dto::run_report::RunReport;
use crate::application::use_cases::extract_rows::ExtractRowsUseCase;
use crate::application::use_cases::load_table::LoadTableUseCase;
use crate::domain::errors::EtlError;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::services::insert_statement::InsertStatement;

use super::cli::Args;

/// Extract-then-load workflow
pub struct EtlWorkflow {
    config: Config,
    factory: Arc<dyn ConnectionFactory>,
}

impl EtlWorkflow {
    /// Create a workflow that connects through sqlx
    pub fn new(config: Config) -> Self {
        Self::with_factory(config, Arc::new(SqlxConnectionFactory))
    }

    /// Create a workflow with an injected connection factory
    pub fn with_factory(config: Config, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { config, factory }
    }

    /// Execute the workflow
    ///
    /// 接続はどの経路でも必ず1回ずつ閉じる。閉じる際の失敗はログに残すだけで、
    /// 実行結果は変えない。
    pub async fn execute(&self, args: Args) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting ETL run {}", run_id);
        info!("Dry run: {}", args.dry_run);

        let query = load_query(args.query_file.as_deref())?;
        let extract_use_case = ExtractRowsUseCase::new(query);

        println!("✓ Using configuration:");
        println!("  Source: {}", self.config.source.describe());
        println!("  Target: {}", self.config.target.describe());
        println!("  Table: {}", self.config.target_table);

        let mut source = self.factory.open_source(&self.config.source).await?;
        println!("✓ Connected to source database");

        if args.dry_run {
            let outcome = self.preview(source.as_mut(), &extract_use_case).await;
            close_source(source.as_mut(), &run_id).await;

            let extracted_rows = outcome?;
            return Ok(RunReport::new(run_id, extracted_rows, None));
        }

        let mut target = match self.factory.open_target(&self.config.target).await {
            Ok(target) => target,
            Err(e) => {
                close_source(source.as_mut(), &run_id).await;
                return Err(e.into());
            }
        };
        println!("✓ Connected to target database");

        let load_use_case = LoadTableUseCase::new(self.config.target_table.clone());
        let outcome = transfer(
            source.as_mut(),
            target.as_mut(),
            &extract_use_case,
            &load_use_case,
        )
        .await;

        close_source(source.as_mut(), &run_id).await;
        close_target(target.as_mut(), &run_id).await;

        let (extracted_rows, summary) = outcome?;
        println!(
            "✓ Load complete! {} rows in {}",
            summary.inserted_rows, summary.table
        );
        info!("ETL run {} finished", run_id);

        Ok(RunReport::new(run_id, extracted_rows, Some(summary)))
    }

    /// 抽出だけを行い、実行される INSERT 文を表示する
    async fn preview(
        &self,
        source: &mut dyn SourceRepository,
        extract_use_case: &ExtractRowsUseCase,
    ) -> Result<usize, EtlError> {
        println!("✓ Extracting rows...");
        let extraction = extract_use_case.execute(source).await?;
        println!("✓ Extracted {} rows", extraction.len());

        let statement = InsertStatement::new(
            self.config.target.kind,
            &self.config.target_table,
            extraction.columns(),
        )?;

        println!("✓ Dry-run mode (target database not opened)");
        println!(
            "  Would replace {} with {} rows using:",
            self.config.target_table,
            extraction.len()
        );
        println!("    {}", statement);

        Ok(extraction.len())
    }
}

async fn transfer(
    source: &mut dyn SourceRepository,
    target: &mut dyn TargetRepository,
    extract_use_case: &ExtractRowsUseCase,
    load_use_case: &LoadTableUseCase,
) -> Result<(usize, LoadSummary), EtlError> {
    println!("✓ Extracting rows...");
    let extraction = extract_use_case.execute(source).await?;
    println!("✓ Extracted {} rows", extraction.len());

    println!("✓ Loading into {}...", load_use_case.table());
    let summary = load_use_case.execute(target, &extraction).await?;

    Ok((extraction.len(), summary))
}

async fn close_source(source: &mut dyn SourceRepository, run_id: &str) {
    if let Err(e) = source.close().await {
        warn!("[{}] Failed to close source connection: {}", run_id, e);
    }
}

async fn close_target(target: &mut dyn TargetRepository, run_id: &str) {
    if let Err(e) = target.close().await {
        warn!("[{}] Failed to close target connection: {}", run_id, e);
    }
}
