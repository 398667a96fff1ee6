//! loanrisk-classifiers: gradient-boosted loan default and eligibility models.
//!
//! The crate covers the offline half of the pipeline: loading and cleaning
//! tabular credit data, deriving affordability features, learning a feature
//! schema, fitting an XGBoost classifier on ordinal-encoded categoricals,
//! evaluating it with bootstrap confidence intervals and explaining it with
//! XGBoost's exact tree contributions. Reporting helpers render plotly
//! plots into `report_builder` pages and static SVG charts.
pub mod artifacts;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod explain;
pub mod features;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod schema;
pub mod stats;
pub mod task;
