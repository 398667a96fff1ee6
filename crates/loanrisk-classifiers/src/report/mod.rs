//! Reporting and plotting helpers.
//!
//! Plot helpers turn metrics and attributions into `plotly::Plot`s, `report`
//! hands them to the shared `report_builder` page layout and `svg` renders
//! static charts that need no JavaScript.
pub mod plots;
pub mod report;
pub mod svg;
