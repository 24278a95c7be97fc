//! # Data Transfer Objects

pub mod load_summary;
pub mod run_report;
