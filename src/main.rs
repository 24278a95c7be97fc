//! ceadex-etl - CEADEX enrollment extract-and-reload job
//!
//! 抽出クエリの結果で出力先テーブルを入れ替える

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use anyhow::Result;
use clap::Parser;

use ceadex_etl::adapter::config::Config;
use ceadex_etl::domain::errors::EtlError;
use ceadex_etl::driver::{Args, EtlWorkflow};

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env は無くてもよい（既存の環境変数が優先される）
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    run(args).await.inspect_err(|e| {
        if let Some(etl) = e.downcast_ref::<EtlError>() {
            log::error!("Run failed with {}", etl.kind());
        }
    })
}

#[cfg_attr(coverage_nightly, coverage(off))]
async fn run(args: Args) -> Result<()> {
    // Load configuration (file if given, environment otherwise)
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    // Create workflow with injected dependencies
    let workflow = EtlWorkflow::new(config);

    let report = workflow.execute(args).await?;
    log::info!(
        "Run {}: extracted {} rows, inserted {}",
        report.run_id,
        report.extracted_rows,
        report.inserted_rows()
    );

    Ok(())
}
