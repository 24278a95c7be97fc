//! CLI Argument Parsing
//!
//! CLIの引数解析

use clap::Parser;

/// CEADEX の履修状況を出力先データベースへ入れ替えるCLI
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ceadex-etl")]
#[command(
    about = "Extract CEADEX enrollment status and reload the target table",
    long_about = None
)]
pub struct Args {
    /// Dry run mode - extract only, never open the target database
    #[arg(long)]
    pub dry_run: bool,

    /// Config file path (JSON). Environment variables are used when omitted
    #[arg(short, long)]
    pub config: Option<String>,

    /// Extraction query file, overriding the embedded query
    #[arg(short, long)]
    pub query_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["ceadex-etl"]);
        assert!(!args.dry_run);
        assert_eq!(args.config, None);
        assert_eq!(args.query_file, None);
    }

    #[test]
    fn test_args_dry_run() {
        let args = Args::parse_from(["ceadex-etl", "--dry-run"]);
        assert!(args.dry_run);
    }

    #[test]
    fn test_args_custom_config() {
        let args = Args::parse_from(["ceadex-etl", "-c", "/etc/ceadex/config.json"]);
        assert_eq!(args.config.as_deref(), Some("/etc/ceadex/config.json"));
    }

    #[test]
    fn test_args_query_file() {
        let args = Args::parse_from(["ceadex-etl", "--query-file", "~/sql/ceadex.sql"]);
        assert_eq!(args.query_file.as_deref(), Some("~/sql/ceadex.sql"));
    }

    #[test]
    fn test_args_combined() {
        let args = Args::parse_from(["ceadex-etl", "--dry-run", "-q", "q.sql", "-c", "c.json"]);
        assert!(args.dry_run);
        assert_eq!(args.query_file.as_deref(), Some("q.sql"));
        assert_eq!(args.config.as_deref(), Some("c.json"));
    }
}
